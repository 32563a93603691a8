//! Per-service façade over a shared core handler.
//!
//! Several services can mount on the same endpoint; they all route through
//! the one core handler registered for that endpoint and role, so the
//! handshake answers for all of them at once. Constructing a service
//! handler finds or creates that core handler through the process-wide
//! registry.

use serde_json::Value;

use crate::config::{CallbackMap, CoreConfig, MessageCallbacks, ServiceConfig};
use crate::domain::{Envelope, MessageContents, PartialEnvelope, Source};
use crate::handler::{CoreHandler, MessageCallback, PendingResponse, Role};
use crate::registry::HandlerRegistry;
use crate::{Error, Result};

/// Handle through which one named service sends and receives messages.
///
/// Cheap to clone; clones share the underlying core handler.
#[derive(Clone)]
pub struct ServiceHandler {
    service_name: String,
    core: CoreHandler,
}

impl ServiceHandler {
    // ---
    /// Mount a block-side service on the configured endpoint.
    pub async fn block(config: ServiceConfig) -> Result<Self> {
        Self::new(Role::block(), config).await
    }

    /// Mount an embedder-side service on the configured endpoint.
    pub async fn embedder(config: ServiceConfig) -> Result<Self> {
        Self::new(Role::embedder(), config).await
    }

    async fn new(role: Role, config: ServiceConfig) -> Result<Self> {
        // ---
        let ServiceConfig {
            endpoint,
            service_name,
            init_payload,
            callbacks,
        } = config;

        if service_name.is_empty() {
            return Err(Error::MissingServiceName);
        }
        let endpoint = endpoint.ok_or(Error::MissingEndpoint)?;
        let init_payload = init_payload.unwrap_or_else(|| Value::Object(Default::default()));

        // One core handler per role per endpoint; later services reuse it.
        let core = match HandlerRegistry::global().get(role.source, endpoint.id()) {
            Some(existing) => {
                // ---
                existing.add_service(&service_name);
                existing.set_init_payload(&service_name, init_payload);
                for (message, callback) in callbacks.into_entries() {
                    existing.register_callback(&service_name, &message, callback);
                }
                existing
            }
            None => {
                // Everything is seeded through the config so the handler's
                // receive loop never observes a half-registered service,
                // even when the peer's `init` is already waiting.
                let mut seeded = CallbackMap::new();
                for (message, callback) in callbacks.into_entries() {
                    seeded.insert(&service_name, &message, callback);
                }
                CoreHandler::new(
                    role,
                    CoreConfig::new()
                        .endpoint(endpoint)
                        .service(&service_name, init_payload)
                        .callbacks(seeded),
                )
                .await?
            }
        };

        Ok(Self { service_name, core })
    }

    /// This service's name, as stamped on outgoing envelopes.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The core handler this service routes through.
    pub fn core(&self) -> &CoreHandler {
        &self.core
    }

    /// Which side of the boundary this service sits on.
    pub fn source(&self) -> Source {
        self.core.role().source
    }

    /// Install (or replace) the callback for `message_name` under this
    /// service's namespace.
    pub fn register_callback(&self, message_name: &str, callback: MessageCallback) {
        // ---
        self.core
            .register_callback(&self.service_name, message_name, callback);
    }

    /// Install a batch of callbacks under this service's namespace.
    /// Existing registrations for the same message names are replaced.
    pub fn register_callbacks(&self, callbacks: MessageCallbacks) {
        // ---
        for (message, callback) in callbacks.into_entries() {
            self.core
                .register_callback(&self.service_name, &message, callback);
        }
    }

    /// Replace the payload this service contributes to the handshake's
    /// aggregate `initResponse`.
    pub fn set_init_payload(&self, payload: Value) {
        self.core.set_init_payload(&self.service_name, payload);
    }

    /// Send a fire-and-forget message. Returns the stamped envelope as it
    /// went out on the wire.
    pub async fn send_message(&self, partial: PartialEnvelope) -> Result<Envelope> {
        // ---
        self.core
            .send_message(partial, None, &self.service_name)
            .await
    }

    /// Send a message expecting a response named `responded_to_by`.
    ///
    /// The returned [`PendingResponse`] resolves with the correlated
    /// response's contents once the peer answers.
    pub async fn request(
        &self,
        partial: PartialEnvelope,
        responded_to_by: &str,
    ) -> Result<PendingResponse> {
        // ---
        self.core
            .send_request(partial, &self.service_name, responded_to_by)
            .await
    }

    /// Send an explicit response to a previously received request.
    ///
    /// Use this when the answer is produced outside the callback that
    /// received the request; the envelope reuses the original request id
    /// so the peer's pending entry correlates.
    pub async fn respond(
        &self,
        request: &Envelope,
        contents: MessageContents,
    ) -> Result<Envelope> {
        // ---
        let response_name = request
            .responded_to_by
            .as_deref()
            .ok_or_else(|| Error::NoResponseExpected(request.name.clone()))?;
        self.core
            .send_message(
                PartialEnvelope::from_contents(response_name, contents),
                Some(request.request_id.clone()),
                &self.service_name,
            )
            .await
    }
}

impl std::fmt::Debug for ServiceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandler")
            .field("service_name", &self.service_name)
            .field("source", &self.core.role().source)
            .finish()
    }
}
