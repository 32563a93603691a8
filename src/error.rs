use thiserror::Error;

use crate::correlation::RequestId;

/// Errors that can occur while sending, receiving, or routing protocol
/// messages.
///
/// The variants up to [`Error::MissingEndpoint`] are protocol violations:
/// one side broke the message contract and the error is raised at the point
/// of detection. The remaining variants come from the ambient machinery
/// (serialization, closed channels, optional deadlines).
#[derive(Error, Debug)]
pub enum Error {
    /// A message was sent through a service handler with an empty service name.
    #[error("message sender has no service name set")]
    MissingServiceName,

    /// A response must be authored by the service it belongs to, but no
    /// handler for that service is registered here.
    #[error("handler for service '{0}' not registered")]
    ServiceNotRegistered(String),

    /// A response arrived under a known request id but with the wrong name.
    #[error(
        "message with requestId '{request_id}' expected response from message \
         named '{expected}', received response from '{received}' instead"
    )]
    UnexpectedResponseName {
        request_id: RequestId,
        expected: String,
        received: String,
    },

    /// A message demanded a response but no callback is registered for it.
    /// Raised on the embedder side only; the block side ignores this case.
    #[error("message '{0}' expected a response, but no callback for '{0}' provided")]
    NoCallbackForRequest(String),

    /// An explicit response was attempted for a message that never asked
    /// for one.
    #[error("message '{0}' does not expect a response")]
    NoResponseExpected(String),

    /// A handler was constructed without an endpoint to bind to.
    #[error("an endpoint is required to construct a handler")]
    MissingEndpoint,

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport endpoint is gone (peer window closed, inbox already
    /// taken, or channel dropped).
    #[error("transport closed")]
    TransportClosed,

    /// The response channel closed before the request was settled.
    #[error("response channel closed before the request was settled")]
    ResponseDropped,

    /// A pending request exceeded its configured deadline.
    #[error("request timed out")]
    Timeout,
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;
