//! Transport domain abstractions.
//!
//! A [`Transport`] delivers opaque protocol envelopes between the two sides
//! of an embedding boundary. Higher-level semantics such as correlation,
//! callback dispatch, and the handshake are handled by the handler layer.
//!
//! Exactly two bindings exist, mirroring the two physical delivery
//! mechanisms available at an embedding boundary:
//!
//! - **Local** — same-document event propagation: envelopes travel as a
//!   bubbling custom event dispatched on an element-like target.
//! - **Remote** — cross-window messaging: envelopes travel wrapped as
//!   `{ "type": <event name>, "detail": <envelope> }` through a posted
//!   message.
//!
//! The binding is selected once, at handler construction, from the kind of
//! endpoint the handler is bound to, and never changes for the handler's
//! lifetime. Concrete implementations live under `src/transport/`.

use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::Envelope;
use crate::transport::EventTarget;
use crate::Result;

/// Event type name shared by both bindings and both roles.
///
/// The local binding dispatches custom events under this name; the remote
/// binding tags posted messages with it. Receivers ignore anything else on
/// the same channel.
pub const MESSAGE_EVENT_NAME: &str = "blockprotocolmessage";

/// Opaque identity of a transport endpoint.
///
/// Endpoint identity keys the core-handler registry: exactly one core
/// handler exists per role per distinct endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(u64);

impl EndpointId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint-{}", self.0)
    }
}

/// Which delivery mechanism a transport uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Same-document custom events.
    Local,
    /// Cross-window posted messages.
    Remote,
}

/// Raw unit delivered by a transport to a subscribed handler.
///
/// A handler bound to one binding kind silently ignores events of the other
/// kind; shared channels may carry both.
#[derive(Clone)]
pub enum TransportEvent {
    /// A custom event dispatched on an element-like target. `origin` is the
    /// target the event was dispatched from, used by the embedder-side
    /// handshake to re-target its endpoint.
    Custom {
        name: Arc<str>,
        detail: Value,
        origin: Arc<EventTarget>,
    },
    /// A cross-window posted message.
    Message { data: Value },
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::Custom { name, origin, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("origin", &origin.id())
                .finish_non_exhaustive(),
            TransportEvent::Message { .. } => f.debug_struct("Message").finish_non_exhaustive(),
        }
    }
}

/// Handle returned from a successful subscription.
///
/// The subscription remains active until the handle is dropped or the
/// endpoint goes away.
pub struct TransportInbox {
    /// Receiver channel for raw events delivered to this endpoint.
    pub inbox: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Transport abstraction.
///
/// Implementations must ensure that once `subscribe()` returns
/// successfully, envelopes published through the same endpoint afterwards
/// are deliverable to the returned inbox, and that `publish()` never blocks
/// on subscribers. Delivery is best-effort: no ordering guarantee exists
/// across different request ids, and nothing is redelivered.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Which binding this transport implements.
    fn kind(&self) -> TransportKind;

    /// Identity of the endpoint this transport is bound to.
    fn endpoint_id(&self) -> EndpointId;

    /// Write a fully-stamped envelope to the boundary.
    async fn publish(&self, envelope: &Envelope) -> Result<()>;

    /// Register for raw events arriving at this endpoint.
    async fn subscribe(&self) -> Result<TransportInbox>;
}

/// Shared transport pointer.
///
/// `Arc<dyn Transport>` so a handler can swap its binding target during the
/// handshake without re-wiring subscribers.
pub type TransportPtr = Arc<dyn Transport>;
