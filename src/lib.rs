//! # blockbus
//!
//! Request/response message correlation between an embeddable block and
//! its embedder host, over pluggable transports.
//!
//! Both sides of the boundary exchange JSON envelopes over one shared
//! channel. Every envelope carries a unique request id; a message that
//! expects an answer names the response message up front, and the reply
//! reuses the request's id so the two correlate. Handlers on each side
//! route incoming messages to per-service callbacks and settle the
//! pending requests their ids match.
//!
//! ## Quick start
//!
//! ```no_run
//! use blockbus::{
//!     //
//!     Endpoint,
//!     EventTarget,
//!     MessageContents,
//!     Page,
//!     PartialEnvelope,
//!     ServiceConfig,
//!     ServiceHandler,
//! };
//! use serde_json::json;
//!
//! # async fn run() -> blockbus::Result<()> {
//! let page = Page::new();
//! let element = EventTarget::new(&page);
//!
//! let embedder = ServiceHandler::embedder(
//!     ServiceConfig::new("dummy")
//!         .endpoint(Endpoint::Element(element.clone()))
//!         .on("getRandomNumber", |_contents| async {
//!             Some(MessageContents::from_payload(json!(4)))
//!         }),
//! )
//! .await?;
//!
//! let block = ServiceHandler::block(
//!     ServiceConfig::new("dummy").endpoint(Endpoint::Element(element)),
//! )
//! .await?;
//!
//! let contents = block
//!     .request(PartialEnvelope::named("getRandomNumber"), "randomNumber")
//!     .await?
//!     .await?;
//! assert_eq!(contents.payload, Some(json!(4)));
//! # let _ = embedder;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`ServiceHandler`] — per-service façade; stamps outgoing envelopes
//!   with its service name.
//! - [`CoreHandler`] — per-endpoint engine shared by every service on the
//!   endpoint; owns dispatch, correlation, and the `core` handshake.
//! - [`Transport`] — the seam between routing logic and delivery;
//!   [`LocalTransport`] for same-document endpoints, [`RemoteTransport`]
//!   for isolated windows.
//!
//! ## Feature flags
//!
//! - `logging` (default) — route internal diagnostics through `tracing`.

mod config;
mod correlation;
mod domain;
mod error;
mod handler;
mod macros;
mod registry;
mod transport;

// --- Public API surface ---

pub use config::{CallbackMap, CoreConfig, MessageCallbacks, ServiceConfig};
pub use correlation::RequestId;
pub use domain::{
    //
    is_protocol_message,
    EndpointId,
    Envelope,
    MessageContents,
    MessageError,
    PartialEnvelope,
    Source,
    Transport,
    TransportEvent,
    TransportInbox,
    TransportKind,
    TransportPtr,
    MESSAGE_EVENT_NAME,
    MSG_INIT,
    MSG_INIT_RESPONSE,
    SERVICE_CORE,
};
pub use error::{Error, Result};
pub use handler::{
    //
    CoreHandler,
    HandshakeRole,
    MessageCallback,
    PendingResponse,
    Role,
    ServiceHandler,
};
pub use registry::unregister;
pub use transport::{
    //
    Endpoint,
    EventTarget,
    LocalTransport,
    Page,
    RemoteTransport,
    WindowHandle,
};
