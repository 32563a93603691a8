use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique request identifier used to match responses back to their requests.
///
/// Request ids are carried *in-band* inside protocol envelopes. They are
/// opaque to the transport layer and unique among all envelopes currently
/// awaiting a response at a given core handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new unique request id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the request id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn generate_unique() {
        // ---
        let id1 = RequestId::generate();
        let id2 = RequestId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn format() {
        // ---
        let id = RequestId::generate();
        let s = id.to_string();
        assert_eq!(s.len(), 36); // Standard UUID format
    }
}
