//! Process-wide registry of live core handlers, keyed by role source and
//! endpoint identity.
//!
//! Multiple services mounted on the same element must share one handler,
//! or each would answer the handshake with only its own init payload. The
//! registry holds weak references only: a handler whose last service is
//! dropped goes away, and its slot is pruned lazily.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock, Weak};

use crate::domain::{EndpointId, Source};
use crate::handler::{CoreHandler, CoreInner};
use crate::transport::Endpoint;

type Key = (Source, EndpointId);

pub(crate) struct HandlerRegistry {
    entries: Mutex<HashMap<Key, Weak<CoreInner>>>,
}

impl HandlerRegistry {
    pub(crate) fn global() -> &'static Self {
        // ---
        static REGISTRY: OnceLock<HandlerRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| Self {
            entries: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, Weak<CoreInner>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Look up the live handler for `source` on `endpoint_id`.
    pub(crate) fn get(&self, source: Source, endpoint_id: EndpointId) -> Option<CoreHandler> {
        // ---
        let mut entries = self.lock();
        match entries.get(&(source, endpoint_id)) {
            Some(weak) => match weak.upgrade() {
                Some(inner) => Some(CoreHandler::from_inner(inner)),
                None => {
                    entries.remove(&(source, endpoint_id));
                    None
                }
            },
            None => None,
        }
    }

    pub(crate) fn insert(
        &self,
        source: Source,
        endpoint_id: EndpointId,
        inner: &std::sync::Arc<CoreInner>,
    ) {
        // ---
        let mut entries = self.lock();
        entries.retain(|_, weak| weak.strong_count() > 0);
        entries.insert((source, endpoint_id), std::sync::Arc::downgrade(inner));
    }
}

/// Forget the handlers registered for `endpoint`, both roles.
///
/// The next service constructed against the endpoint builds a fresh
/// handler and runs the handshake again. Existing service handles keep
/// their (now unregistered) handler alive until dropped.
pub fn unregister(endpoint: &Endpoint) {
    // ---
    let registry = HandlerRegistry::global();
    let mut entries = registry.lock();
    entries.remove(&(Source::Block, endpoint.id()));
    entries.remove(&(Source::Embedder, endpoint.id()));
}
