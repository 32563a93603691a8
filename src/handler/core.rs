//! Core handler: per-endpoint routing and correlation engine.
//!
//! One core handler exists per role per distinct endpoint. It owns the
//! transport binding, the registry of services sharing the endpoint, the
//! two-level callback dispatch table, and the table of requests awaiting a
//! response.
//!
//! # Architecture
//!
//! Sending stamps a partial envelope with a fresh request id, the sender's
//! service name, and this side's source, then writes it to the transport.
//! A spawned receive loop reads raw transport events and feeds them to
//! [`CoreHandler::receive`], which validates the envelope, dispatches it to
//! the registered callback, answers it if it demanded a response, and —
//! independently — settles any pending request its id correlates to.
//!
//! # Concurrency
//!
//! Multiple requests can be in flight simultaneously; each is tracked by
//! its own request id and settled through its own oneshot channel. Every
//! received event is processed in its own task, so a slow callback never
//! stalls the inbox and a callback may itself issue requests through the
//! handler it runs under. The maps are behind mutexes with minimal hold
//! times (plain insert/remove); no lock is held across an `await`.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::config::CoreConfig;
use crate::correlation::RequestId;
use crate::domain::{
    //
    Envelope,
    PartialEnvelope,
    TransportEvent,
    TransportKind,
    TransportPtr,
    MESSAGE_EVENT_NAME,
    MSG_INIT,
    MSG_INIT_RESPONSE,
    SERVICE_CORE,
};
use crate::handler::pending::PendingRequests;
use crate::handler::{
    //
    lock_ignore_poison,
    HandshakeRole,
    MessageCallback,
    PendingResponse,
    Role,
};
use crate::macros::{log_debug, log_error};
use crate::registry::HandlerRegistry;
use crate::transport::{EventTarget, LocalTransport};
use crate::{Error, Result};

/// Per-service state kept by the core handler.
pub(crate) struct ServiceRecord {
    /// Payload contributed to the handshake's aggregate `initResponse`.
    pub(crate) init_payload: Value,
}

/// Per-endpoint protocol engine.
///
/// Cheap to clone (internally `Arc`-backed); clones share all state.
#[derive(Clone)]
pub struct CoreHandler {
    inner: Arc<CoreInner>,
}

pub(crate) struct CoreInner {
    role: Role,
    /// True when the bound endpoint is an isolated window; such handlers
    /// never re-target during the handshake.
    isolated: bool,
    /// Swappable so the embedder can re-target mid-handshake. Reads clone
    /// the `Arc` out and drop the guard before any `await`.
    transport: RwLock<TransportPtr>,
    pub(super) services: Mutex<HashMap<String, ServiceRecord>>,
    callbacks: Mutex<HashMap<(String, String), MessageCallback>>,
    default_callback: Option<MessageCallback>,
    pending: Arc<Mutex<PendingRequests>>,
    response_timeout: Option<Duration>,
    /// Deferred `initResponse` retained from the construction-time `init`
    /// send (initiator role only), until someone claims it.
    init_handle: Mutex<Option<PendingResponse>>,
}

impl CoreHandler {
    // ---
    /// Construct a block-side handler: sends `init` immediately, expecting
    /// `initResponse`.
    pub async fn block(config: CoreConfig) -> Result<Self> {
        Self::new(Role::block(), config).await
    }

    /// Construct an embedder-side handler: answers `init` from blocks.
    pub async fn embedder(config: CoreConfig) -> Result<Self> {
        Self::new(Role::embedder(), config).await
    }

    /// Construct a handler for an arbitrary role description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEndpoint`] if the config names no endpoint,
    /// or [`Error::TransportClosed`] if the endpoint cannot be subscribed.
    pub async fn new(role: Role, config: CoreConfig) -> Result<Self> {
        // ---
        let CoreConfig {
            endpoint,
            services,
            callbacks,
            default_callback,
            response_timeout,
        } = config;

        let endpoint = endpoint.ok_or(Error::MissingEndpoint)?;
        let transport = endpoint.transport();
        let mut subscription = transport.subscribe().await?;

        let services = services
            .into_iter()
            .map(|(name, init_payload)| (name, ServiceRecord { init_payload }))
            .collect();

        let inner = Arc::new(CoreInner {
            role,
            isolated: endpoint.is_window(),
            transport: RwLock::new(transport),
            services: Mutex::new(services),
            callbacks: Mutex::new(callbacks.into_entries()),
            default_callback,
            pending: Arc::new(Mutex::new(PendingRequests::new())),
            response_timeout,
            init_handle: Mutex::new(None),
        });

        // Receive loop: feeds raw transport events into `receive()`. Errors
        // there are protocol violations by the peer; they are logged and do
        // not kill the loop. The loop holds only a weak reference, so it
        // never keeps the handler alive by itself.
        let weak = Arc::downgrade(&inner);
        tokio::spawn(async move {
            // ---
            while let Some(event) = subscription.inbox.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                // Each event is processed in its own task so a callback
                // that issues a request through this same handler can
                // await the response without holding up the inbox.
                let handler = CoreHandler { inner };
                tokio::spawn(async move {
                    if let Err(err) = handler.receive(event).await {
                        log_error!("dropping message after receive error: {err}");
                    }
                });
            }
            log_debug!("transport inbox closed, receive loop exiting");
        });

        let handler = Self { inner };
        HandlerRegistry::global().insert(role.source, endpoint.id(), &handler.inner);

        if role.handshake == HandshakeRole::Initiator {
            let response = handler
                .send_request(
                    PartialEnvelope::named(MSG_INIT),
                    SERVICE_CORE,
                    MSG_INIT_RESPONSE,
                )
                .await?;
            *lock_ignore_poison(&handler.inner.init_handle) = Some(response);
        }

        Ok(handler)
    }

    pub(crate) fn from_inner(inner: Arc<CoreInner>) -> Self {
        Self { inner }
    }

    /// This handler's role description.
    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// Take the deferred `initResponse` from the construction-time
    /// handshake. `None` for responder-role handlers, or once claimed.
    pub fn handshake_complete(&self) -> Option<PendingResponse> {
        // ---
        lock_ignore_poison(&self.inner.init_handle).take()
    }

    /// Install (or replace) the callback for `message_name` under
    /// `service_name`'s namespace. Last write wins, silently.
    pub fn register_callback(
        &self,
        service_name: &str,
        message_name: &str,
        callback: MessageCallback,
    ) {
        // ---
        let mut callbacks = lock_ignore_poison(&self.inner.callbacks);
        callbacks.insert(
            (service_name.to_string(), message_name.to_string()),
            callback,
        );
    }

    /// Record `service_name` as sharing this endpoint. Idempotent.
    pub(crate) fn add_service(&self, service_name: &str) {
        // ---
        let mut services = lock_ignore_poison(&self.inner.services);
        services
            .entry(service_name.to_string())
            .or_insert(ServiceRecord {
                init_payload: Value::Object(Default::default()),
            });
    }

    /// Replace the init payload `service_name` contributes to the
    /// handshake's aggregate response.
    pub(crate) fn set_init_payload(&self, service_name: &str, payload: Value) {
        // ---
        let mut services = lock_ignore_poison(&self.inner.services);
        if let Some(record) = services.get_mut(service_name) {
            record.init_payload = payload;
        }
    }

    /// Send a fire-and-forget message on behalf of `sender_service`.
    ///
    /// Stamps the envelope (fresh request id unless `request_id` carries
    /// the id of the request being answered) and writes it to the
    /// transport. Returns the fully-stamped envelope.
    pub(crate) async fn send_message(
        &self,
        partial: PartialEnvelope,
        request_id: Option<RequestId>,
        sender_service: &str,
    ) -> Result<Envelope> {
        // ---
        let envelope = self.stamp(partial, request_id, sender_service, None)?;
        self.transport().publish(&envelope).await?;
        Ok(envelope)
    }

    /// Send a message expecting a response named `responded_to_by` on
    /// behalf of `sender_service`.
    ///
    /// Returns a deferred result that settles with the correlated
    /// response's `{payload, errors}`.
    pub(crate) async fn send_request(
        &self,
        partial: PartialEnvelope,
        sender_service: &str,
        responded_to_by: &str,
    ) -> Result<PendingResponse> {
        // ---
        let envelope = self.stamp(partial, None, sender_service, Some(responded_to_by))?;

        // Register before publishing: the peer may answer on another
        // worker before this task would otherwise get back to the table.
        let rx = lock_ignore_poison(&self.inner.pending)
            .register(envelope.request_id.clone(), responded_to_by);

        if let Err(err) = self.transport().publish(&envelope).await {
            lock_ignore_poison(&self.inner.pending).remove(&envelope.request_id);
            return Err(err);
        }

        Ok(PendingResponse::new(
            envelope.request_id,
            rx,
            self.inner.response_timeout,
            Arc::clone(&self.inner.pending),
        ))
    }

    fn stamp(
        &self,
        partial: PartialEnvelope,
        request_id: Option<RequestId>,
        sender_service: &str,
        responded_to_by: Option<&str>,
    ) -> Result<Envelope> {
        // ---
        if sender_service.is_empty() {
            return Err(Error::MissingServiceName);
        }

        Ok(Envelope {
            request_id: request_id.unwrap_or_else(RequestId::generate),
            service: sender_service.to_string(),
            source: self.inner.role.source,
            name: partial.name,
            payload: partial.payload,
            errors: partial.errors,
            responded_to_by: responded_to_by.map(str::to_string),
        })
    }

    fn transport(&self) -> TransportPtr {
        let guard = match self.inner.transport.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone()
    }

    /// Process one raw transport event.
    ///
    /// Normally invoked by the spawned receive loop; exposed so custom
    /// delivery loops can drive a handler directly. Foreign traffic,
    /// wrong-binding events, and echoes of this side's own messages are
    /// ignored silently; errors are protocol violations raised at the
    /// point of detection.
    pub async fn receive(&self, event: TransportEvent) -> Result<()> {
        // ---
        let Some(envelope) = self.extract(&event) else {
            return Ok(());
        };

        // One shared channel carries both directions; drop our own echoes.
        if envelope.source == self.inner.role.source {
            return Ok(());
        }

        if self.inner.role.handshake == HandshakeRole::Responder
            && envelope.service == SERVICE_CORE
            && envelope.name == MSG_INIT
        {
            return self.process_init(&event, &envelope).await;
        }

        self.dispatch(&envelope).await?;
        self.settle_pending(&envelope)
    }

    /// Pull a protocol envelope out of a raw event, or `None` if the event
    /// is not for this handler.
    fn extract(&self, event: &TransportEvent) -> Option<Envelope> {
        // ---
        let kind = self.transport().kind();

        let detail = match (kind, event) {
            (TransportKind::Local, TransportEvent::Custom { name, detail, .. })
                if name.as_ref() == MESSAGE_EVENT_NAME =>
            {
                detail
            }
            (TransportKind::Remote, TransportEvent::Message { data }) => {
                if data.get("type").and_then(Value::as_str) != Some(MESSAGE_EVENT_NAME) {
                    return None;
                }
                data.get("detail")?
            }
            // Wrong binding kind for this handler.
            _ => return None,
        };

        crate::domain::parse_envelope(detail)
    }

    /// Route an envelope to its callback and answer it if it demands a
    /// response.
    async fn dispatch(&self, envelope: &Envelope) -> Result<()> {
        // ---
        let callback = {
            let callbacks = lock_ignore_poison(&self.inner.callbacks);
            callbacks
                .get(&(envelope.service.clone(), envelope.name.clone()))
                .cloned()
        }
        .or_else(|| self.inner.default_callback.clone());

        match (envelope.responded_to_by.as_deref(), callback) {
            (Some(response_name), Some(callback)) => {
                // The reply must be authored by the service it belongs to.
                {
                    let services = lock_ignore_poison(&self.inner.services);
                    if !services.contains_key(&envelope.service) {
                        return Err(Error::ServiceNotRegistered(envelope.service.clone()));
                    }
                }

                let contents = callback.call(envelope.contents()).await.unwrap_or_default();
                self.send_message(
                    PartialEnvelope::from_contents(response_name, contents),
                    Some(envelope.request_id.clone()),
                    &envelope.service,
                )
                .await?;
                Ok(())
            }
            (Some(_), None) if self.inner.role.requires_response_callback() => {
                Err(Error::NoCallbackForRequest(envelope.name.clone()))
            }
            (Some(_), None) => Ok(()),
            (None, Some(callback)) => {
                let _ = callback.call(envelope.contents()).await;
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    /// Settle any pending request this envelope's id correlates to.
    fn settle_pending(&self, envelope: &Envelope) -> Result<()> {
        // ---
        lock_ignore_poison(&self.inner.pending)
            .settle(&envelope.request_id, &envelope.name, envelope.contents())
            .map(|_| ())
    }

    /// Re-target the active endpoint at a different element. Same-kind
    /// rebind only; callers guarantee the current binding is local.
    pub(super) fn rebind(&self, target: Arc<EventTarget>) {
        // ---
        log_debug!("re-targeting endpoint at {}", target.id());
        let mut transport = match self.inner.transport.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *transport = Arc::new(LocalTransport::new(target));
    }

    pub(super) fn is_isolated(&self) -> bool {
        self.inner.isolated
    }

    pub(super) async fn send_handshake_reply(
        &self,
        partial: PartialEnvelope,
        request_id: RequestId,
    ) -> Result<()> {
        // ---
        self.send_message(partial, Some(request_id), SERVICE_CORE)
            .await?;
        Ok(())
    }

    pub(crate) fn inner(&self) -> &Arc<CoreInner> {
        &self.inner
    }
}
