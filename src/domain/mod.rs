//! Domain layer public interface.
//!
//! This module defines the wire-level data model and the transport
//! abstraction used by the handler layer. Concrete delivery
//! implementations live under `src/transport/`; the raw event type here
//! does name the element-like origin a local event carries, because the
//! handshake needs that identity to re-target an endpoint.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod envelope;
mod transport;

// --- Envelope domain re-exports ---

pub use envelope::{
    //
    is_protocol_message,
    Envelope,
    MessageContents,
    MessageError,
    PartialEnvelope,
    Source,
    MSG_INIT,
    MSG_INIT_RESPONSE,
    SERVICE_CORE,
};

pub(crate) use envelope::parse_envelope;

// --- Transport domain re-exports ---

pub use transport::{
    //
    EndpointId,
    Transport,
    TransportEvent,
    TransportInbox,
    TransportKind,
    TransportPtr,
    MESSAGE_EVENT_NAME,
};
