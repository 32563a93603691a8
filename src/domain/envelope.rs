//! Protocol envelope data model.
//!
//! An [`Envelope`] is the only unit ever placed on a transport. Services
//! author a [`PartialEnvelope`]; the core handler stamps the request id,
//! service name, and source before the message leaves the process boundary.
//!
//! Field names on the wire are camelCase (`requestId`, `respondedToBy`) so
//! both sides of the boundary agree on the shape regardless of language.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::correlation::RequestId;

/// Reserved service name carrying the bootstrap handshake.
pub const SERVICE_CORE: &str = "core";

/// Handshake announcement, sent by a block when it mounts.
pub const MSG_INIT: &str = "init";

/// Handshake answer, aggregating per-service init payloads.
pub const MSG_INIT_RESPONSE: &str = "initResponse";

/// Which role authored a message.
///
/// A received envelope whose source equals the receiver's own role is an
/// echo of the receiver's own traffic over a shared channel and is
/// discarded without dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The embeddable participant; initiates the handshake.
    Block,
    /// The hosting participant; responds to the handshake.
    Embedder,
}

impl Source {
    /// The role on the other side of the boundary.
    pub fn opposite(self) -> Self {
        match self {
            Source::Block => Source::Embedder,
            Source::Embedder => Source::Block,
        }
    }

    /// Wire representation of this source.
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Block => "block",
            Source::Embedder => "embedder",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single application-defined failure reported inside an envelope.
///
/// Errors ride alongside (or instead of) the payload and never trigger
/// protocol-level fatal handling by themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageError {
    /// Human-readable description of the failure.
    pub message: String,
    /// Application-defined error code.
    pub code: String,
}

impl MessageError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }
}

/// The application-visible half of a message: its payload and errors.
///
/// Callbacks receive a `MessageContents` and may return one; a callback
/// that returns nothing is treated as returning the empty contents. A
/// settled request resolves to the `MessageContents` of its response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageContents {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<MessageError>>,
}

impl MessageContents {
    /// Contents carrying only a payload.
    pub fn from_payload(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            errors: None,
        }
    }

    /// Contents carrying only errors.
    pub fn from_errors(errors: Vec<MessageError>) -> Self {
        Self {
            payload: None,
            errors: Some(errors),
        }
    }
}

/// A fully-stamped protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Correlation key tying a request to its eventual response.
    pub request_id: RequestId,

    /// Name of the originating service (`"core"` for handshake traffic).
    pub service: String,

    /// Which role produced this envelope.
    pub source: Source,

    /// Message type name, unique within its service's namespace.
    pub name: String,

    /// Arbitrary structured data, optional.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Failures to report instead of (or alongside) the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<MessageError>>,

    /// Present only on messages that expect a reply; names the message
    /// type the reply must use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_to_by: Option<String>,
}

impl Envelope {
    /// The application-visible half of this envelope.
    pub fn contents(&self) -> MessageContents {
        MessageContents {
            payload: self.payload.clone(),
            errors: self.errors.clone(),
        }
    }
}

/// A message as authored by a service, before the core handler stamps the
/// request id, service name, and source.
#[derive(Debug, Clone, Default)]
pub struct PartialEnvelope {
    /// Message type name.
    pub name: String,
    /// Arbitrary structured data, optional.
    pub payload: Option<Value>,
    /// Failures to report, optional.
    pub errors: Option<Vec<MessageError>>,
}

impl PartialEnvelope {
    /// A message with a name and no payload.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
            errors: None,
        }
    }

    /// A message with a name and a payload.
    pub fn with_payload(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload: Some(payload),
            errors: None,
        }
    }

    /// A message carrying the given contents under the given name.
    pub fn from_contents(name: impl Into<String>, contents: MessageContents) -> Self {
        Self {
            name: name.into(),
            payload: contents.payload,
            errors: contents.errors,
        }
    }
}

/// Returns true iff `value` is a non-null, non-array structured record
/// containing at minimum `requestId`, `service`, `source`, and `name`.
///
/// Anything failing this predicate is assumed to be unrelated traffic
/// sharing the same transport and is silently ignored by receivers.
pub fn is_protocol_message(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    ["requestId", "service", "source", "name"]
        .iter()
        .all(|key| map.contains_key(*key))
}

/// Parse a transport-delivered value into an envelope, or `None` if it is
/// not a protocol message.
pub(crate) fn parse_envelope(value: &Value) -> Option<Envelope> {
    if !is_protocol_message(value) {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_records() {
        // ---
        assert!(!is_protocol_message(&Value::Null));
        assert!(!is_protocol_message(&json!([1, 2, 3])));
        assert!(!is_protocol_message(&json!("requestId")));
        assert!(!is_protocol_message(&json!(42)));
    }

    #[test]
    fn requires_minimum_fields() {
        // ---
        assert!(!is_protocol_message(&json!({})));
        assert!(!is_protocol_message(&json!({
            "requestId": "r-1", "service": "dummy", "source": "block"
        })));
        assert!(is_protocol_message(&json!({
            "requestId": "r-1",
            "service": "dummy",
            "source": "block",
            "name": "getRandomNumber"
        })));
    }

    #[test]
    fn wire_shape_is_camel_case() {
        // ---
        let envelope = Envelope {
            request_id: RequestId::from("r-7"),
            service: "dummy".to_string(),
            source: Source::Embedder,
            name: "getRandomNumberResponse".to_string(),
            payload: Some(json!(42)),
            errors: None,
            responded_to_by: None,
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["requestId"], json!("r-7"));
        assert_eq!(value["source"], json!("embedder"));
        // Optional fields are omitted entirely, not serialized as null.
        assert!(value.get("errors").is_none());
        assert!(value.get("respondedToBy").is_none());
    }

    #[test]
    fn parse_rejects_unknown_source() {
        // ---
        let value = json!({
            "requestId": "r-1",
            "service": "dummy",
            "source": "gremlin",
            "name": "hello"
        });
        assert!(is_protocol_message(&value));
        assert!(parse_envelope(&value).is_none());
    }
}
