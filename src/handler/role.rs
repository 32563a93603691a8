//! Role description for a core handler.
//!
//! The block and embedder sides run the same routing and correlation logic;
//! the differences between them — who initiates the handshake, which
//! source value marks their own traffic, and how strictly unanswerable
//! requests are treated — are captured in this small value object instead
//! of two parallel handler types.

use crate::domain::Source;

/// Which part a handler plays in the bootstrap handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole {
    /// Sends `init` on construction and waits for `initResponse`.
    Initiator,
    /// Answers `init` with the aggregate of registered services' init
    /// payloads, re-targeting its endpoint if needed.
    Responder,
}

/// Everything that distinguishes a block-side handler from an
/// embedder-side one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    /// Source value stamped on outgoing envelopes; received envelopes
    /// carrying it are discarded as echoes.
    pub source: Source,
    /// This side's part in the bootstrap handshake.
    pub handshake: HandshakeRole,
}

impl Role {
    /// The embeddable participant.
    pub fn block() -> Self {
        Self {
            source: Source::Block,
            handshake: HandshakeRole::Initiator,
        }
    }

    /// The hosting participant.
    pub fn embedder() -> Self {
        Self {
            source: Source::Embedder,
            handshake: HandshakeRole::Responder,
        }
    }

    /// Source value expected on the peer's envelopes.
    pub fn peer_source(&self) -> Source {
        self.source.opposite()
    }

    /// The responder promised to answer anything that demands a response;
    /// a missing callback is a fatal error for it. The initiator ignores
    /// the same situation.
    pub(crate) fn requires_response_callback(&self) -> bool {
        matches!(self.handshake, HandshakeRole::Responder)
    }
}
