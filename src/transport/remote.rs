//! Remote (cross-window) transport binding.
//!
//! Models the boundary between a block living in an isolated frame (or an
//! externally opened window) and its embedder. [`WindowHandle::pair`]
//! yields two connected handles; each side holds its own and posts
//! structured data to the peer's inbox.
//!
//! The inbox is a single-consumer channel created when the pair is
//! connected, so messages posted before the receiving side subscribes are
//! buffered rather than lost.
//!
//! On the wire, envelopes are wrapped as
//! `{ "type": "blockprotocolmessage", "detail": <envelope> }`.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tokio::sync::mpsc;

use crate::domain::{
    //
    EndpointId,
    Envelope,
    Transport,
    TransportEvent,
    TransportInbox,
    TransportKind,
    MESSAGE_EVENT_NAME,
};
use crate::{Error, Result};

/// One side of a connected cross-window pair.
pub struct WindowHandle {
    id: EndpointId,
    peer: OnceLock<Weak<WindowHandle>>,
    inbox_tx: mpsc::UnboundedSender<TransportEvent>,
    inbox_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl WindowHandle {
    /// Create two connected window handles.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        // ---
        let left = Arc::new(Self::unconnected());
        let right = Arc::new(Self::unconnected());

        let _ = left.peer.set(Arc::downgrade(&right));
        let _ = right.peer.set(Arc::downgrade(&left));

        (left, right)
    }

    fn unconnected() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            id: EndpointId::next(),
            peer: OnceLock::new(),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
        }
    }

    /// Identity of this window.
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Post structured data to the connected peer window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportClosed`] if the peer window is gone.
    pub fn post_message(&self, data: Value) -> Result<()> {
        // ---
        let peer = self
            .peer
            .get()
            .and_then(Weak::upgrade)
            .ok_or(Error::TransportClosed)?;

        peer.inbox_tx
            .send(TransportEvent::Message { data })
            .map_err(|_| Error::TransportClosed)
    }

    /// Take the message listener for this window. Single consumer: the
    /// second call returns `None`.
    pub fn listen(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        // ---
        let mut guard = match self.inbox_rx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take()
    }
}

/// Remote transport: envelopes travel as posted messages between a
/// connected [`WindowHandle`] pair.
pub struct RemoteTransport {
    window: Arc<WindowHandle>,
}

impl RemoteTransport {
    pub fn new(window: Arc<WindowHandle>) -> Self {
        Self { window }
    }
}

#[async_trait::async_trait]
impl Transport for RemoteTransport {
    // ---
    fn kind(&self) -> TransportKind {
        TransportKind::Remote
    }

    fn endpoint_id(&self) -> EndpointId {
        self.window.id()
    }

    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        // ---
        let detail = serde_json::to_value(envelope)?;
        self.window.post_message(json!({
            "type": MESSAGE_EVENT_NAME,
            "detail": detail,
        }))
    }

    async fn subscribe(&self) -> Result<TransportInbox> {
        // ---
        let inbox = self.window.listen().ok_or(Error::TransportClosed)?;
        Ok(TransportInbox { inbox })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn post_is_buffered_until_listen() {
        // ---
        let (ours, theirs) = WindowHandle::pair();

        ours.post_message(json!({"hello": 1})).unwrap();
        ours.post_message(json!({"hello": 2})).unwrap();

        // Subscribing after the fact still sees both messages.
        let mut inbox = theirs.listen().unwrap();
        for expected in 1..=2 {
            match inbox.recv().await.unwrap() {
                TransportEvent::Message { data } => {
                    assert_eq!(data["hello"], json!(expected));
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn second_listen_is_refused() {
        // ---
        let (ours, _theirs) = WindowHandle::pair();
        assert!(ours.listen().is_some());
        assert!(ours.listen().is_none());
    }

    #[tokio::test]
    async fn post_to_closed_peer_fails() {
        // ---
        let (ours, theirs) = WindowHandle::pair();
        drop(theirs);
        assert!(matches!(
            ours.post_message(json!({})),
            Err(Error::TransportClosed)
        ));
    }
}
