//! The `core` service handshake.
//!
//! A block announces itself with an `init` message under the reserved
//! `core` service, expecting `initResponse`. The embedder answers with an
//! object aggregating the init payloads of every service registered on the
//! endpoint, keyed by service name.
//!
//! When the block's announcement arrives over a same-document binding, the
//! embedder also re-targets its endpoint at the element the `init` event
//! originated from, so later traffic follows the block's actual mount
//! point. The most recent `init` wins a rebind race. Window-isolated
//! endpoints never re-target.

use serde_json::{Map, Value};

use crate::domain::{PartialEnvelope, TransportEvent, MSG_INIT_RESPONSE};
use crate::handler::lock_ignore_poison;
use crate::handler::CoreHandler;
use crate::macros::log_debug;
use crate::Result;

impl CoreHandler {
    /// Answer an `init` announcement (responder role only).
    pub(super) async fn process_init(
        &self,
        event: &TransportEvent,
        envelope: &crate::domain::Envelope,
    ) -> Result<()> {
        // ---
        if !self.is_isolated() {
            if let TransportEvent::Custom { origin, .. } = event {
                self.rebind(origin.clone());
            }
        }

        let aggregate: Map<String, Value> = {
            let services = lock_ignore_poison(&self.inner().services);
            services
                .iter()
                .map(|(name, record)| (name.clone(), record.init_payload.clone()))
                .collect()
        };
        log_debug!(
            "answering init {} with {} service payload(s)",
            envelope.request_id,
            aggregate.len()
        );

        self.send_handshake_reply(
            PartialEnvelope::with_payload(MSG_INIT_RESPONSE, Value::Object(aggregate)),
            envelope.request_id.clone(),
        )
        .await
    }
}
