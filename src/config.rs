//! Construction-time configuration for core and service handlers.
//!
//! These types intentionally contain no transport-specific concepts beyond
//! the [`Endpoint`] to bind to; binding selection and all routing state
//! live in the handler layer.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::domain::MessageContents;
use crate::handler::MessageCallback;
use crate::transport::Endpoint;

/// Callbacks seeded at core-handler construction, keyed by
/// `(service, message name)`.
#[derive(Debug, Default)]
pub struct CallbackMap {
    entries: HashMap<(String, String), MessageCallback>,
}

impl CallbackMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a callback for `message` under `service`'s namespace.
    /// Last write wins.
    pub fn on<F, Fut>(mut self, service: &str, message: &str, callback: F) -> Self
    where
        F: Fn(MessageContents) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<MessageContents>> + Send + 'static,
    {
        self.entries.insert(
            (service.to_string(), message.to_string()),
            MessageCallback::new(callback),
        );
        self
    }

    pub(crate) fn insert(&mut self, service: &str, message: &str, callback: MessageCallback) {
        self.entries
            .insert((service.to_string(), message.to_string()), callback);
    }

    pub(crate) fn into_entries(self) -> HashMap<(String, String), MessageCallback> {
        self.entries
    }
}

/// Callbacks for one service, keyed by message name.
#[derive(Debug, Default)]
pub struct MessageCallbacks {
    entries: HashMap<String, MessageCallback>,
}

impl MessageCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a callback for `message`. Last write wins.
    pub fn on<F, Fut>(mut self, message: &str, callback: F) -> Self
    where
        F: Fn(MessageContents) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<MessageContents>> + Send + 'static,
    {
        self.entries
            .insert(message.to_string(), MessageCallback::new(callback));
        self
    }

    pub(crate) fn into_entries(self) -> HashMap<String, MessageCallback> {
        self.entries
    }
}

/// Configuration for constructing a [`CoreHandler`](crate::CoreHandler).
#[derive(Debug, Default)]
pub struct CoreConfig {
    pub(crate) endpoint: Option<Endpoint>,
    pub(crate) services: HashMap<String, Value>,
    pub(crate) callbacks: CallbackMap,
    pub(crate) default_callback: Option<MessageCallback>,
    pub(crate) response_timeout: Option<Duration>,
}

impl CoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint to bind to. Constructing a handler without one fails.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Register `name` as a service sharing the endpoint, with the payload
    /// it contributes to the handshake's aggregate response.
    ///
    /// Services seeded here are visible to the handshake from the first
    /// moment the handler can receive; services attached later may arrive
    /// after the handshake has already been answered.
    pub fn service(mut self, name: &str, init_payload: Value) -> Self {
        self.services.insert(name.to_string(), init_payload);
        self
    }

    /// Seed the dispatch table with per-service callbacks.
    pub fn callbacks(mut self, callbacks: CallbackMap) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Handler-wide fallback invoked for messages no specific callback
    /// claims.
    pub fn default_callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(MessageContents) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<MessageContents>> + Send + 'static,
    {
        self.default_callback = Some(MessageCallback::new(callback));
        self
    }

    /// Deadline for requests expecting a response.
    ///
    /// Unset by default: a request whose response is lost stays pending
    /// indefinitely, and abandoning it is the caller's choice via
    /// [`PendingResponse::cancel`](crate::PendingResponse::cancel).
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }
}

/// Configuration for constructing a
/// [`ServiceHandler`](crate::ServiceHandler).
#[derive(Debug)]
pub struct ServiceConfig {
    pub(crate) endpoint: Option<Endpoint>,
    pub(crate) service_name: String,
    pub(crate) init_payload: Option<Value>,
    pub(crate) callbacks: MessageCallbacks,
}

impl ServiceConfig {
    /// Configuration for a service named `service_name`.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            service_name: service_name.into(),
            init_payload: None,
            callbacks: MessageCallbacks::new(),
        }
    }

    /// Payload this service contributes to the handshake's aggregate
    /// `initResponse`. Defaults to an empty object.
    pub fn init_payload(mut self, payload: Value) -> Self {
        self.init_payload = Some(payload);
        self
    }

    /// Endpoint the service's core handler binds to.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Install a callback for `message` under this service's namespace.
    pub fn on<F, Fut>(mut self, message: &str, callback: F) -> Self
    where
        F: Fn(MessageContents) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<MessageContents>> + Send + 'static,
    {
        self.callbacks = self.callbacks.on(message, callback);
        self
    }
}
