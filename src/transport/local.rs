//! Local (same-document) transport binding.
//!
//! Models an embedder and a block mounted in the same document. A [`Page`]
//! is the shared event plane; [`EventTarget`]s belong to a page and stand
//! in for the elements the two sides are mounted on. Dispatching a protocol
//! event on any target delivers it to every subscriber on the page, the way
//! a bubbling, composed custom event reaches listeners on ancestor
//! elements.
//!
//! The page retains handshake announcements that have not been answered
//! yet and replays them to late subscribers, so the mount order of block
//! and embedder does not matter: a block that announces itself before its
//! embedder exists still gets its handshake answered. Once the matching
//! answer is dispatched the announcement is dropped, so the retained set
//! is bounded by the number of unanswered handshakes and ordinary traffic
//! is only ever delivered live.
//!
//! This binding defines the reference delivery semantics: deterministic
//! in-process delivery, nothing dropped due to timing.

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
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
    MSG_INIT,
    MSG_INIT_RESPONSE,
    SERVICE_CORE,
};
use crate::Result;

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The protected state is a listener list plus an event backlog; there are
/// no invariants spanning multiple fields, and the worst outcome of
/// continuing after a panic elsewhere is a dropped event.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Shared event plane for one document.
///
/// All [`EventTarget`]s created against the same page see each other's
/// dispatched events, exactly as elements in one document would through
/// event bubbling.
pub struct Page {
    inner: Mutex<PageInner>,
}

struct PageInner {
    listeners: Vec<mpsc::UnboundedSender<TransportEvent>>,
    /// Handshake announcements not yet answered, replayed to late
    /// subscribers. Everything else is delivered live only.
    backlog: Vec<TransportEvent>,
}

/// How a dispatched event affects the retained backlog.
enum Retention {
    /// An unanswered handshake announcement; kept for late subscribers.
    Announcement,
    /// A handshake answer; drops the announcement it settles.
    Answer(String),
    /// Ordinary traffic; delivered live only.
    Transient,
}

fn classify(event: &TransportEvent) -> Retention {
    // ---
    let TransportEvent::Custom { name, detail, .. } = event else {
        return Retention::Transient;
    };
    if name.as_ref() != MESSAGE_EVENT_NAME
        || detail.get("service").and_then(Value::as_str) != Some(SERVICE_CORE)
    {
        return Retention::Transient;
    }

    match detail.get("name").and_then(Value::as_str) {
        Some(MSG_INIT) => Retention::Announcement,
        Some(MSG_INIT_RESPONSE) => match detail.get("requestId").and_then(Value::as_str) {
            Some(request_id) => Retention::Answer(request_id.to_string()),
            None => Retention::Transient,
        },
        _ => Retention::Transient,
    }
}

impl Page {
    /// Create a new, empty page.
    pub fn new() -> Arc<Self> {
        // ---
        Arc::new(Self {
            inner: Mutex::new(PageInner {
                listeners: Vec::new(),
                backlog: Vec::new(),
            }),
        })
    }

    fn dispatch(&self, event: TransportEvent) {
        let retention = classify(&event);

        let mut inner = lock_ignore_poison(&self.inner);
        // A closed channel indicates a dropped subscriber.
        inner
            .listeners
            .retain(|listener| listener.send(event.clone()).is_ok());

        match retention {
            Retention::Announcement => inner.backlog.push(event),
            Retention::Answer(request_id) => {
                inner.backlog.retain(|retained| match retained {
                    TransportEvent::Custom { detail, .. } => {
                        detail.get("requestId").and_then(Value::as_str)
                            != Some(request_id.as_str())
                    }
                    _ => true,
                });
            }
            Retention::Transient => {}
        }
    }

    fn attach(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = lock_ignore_poison(&self.inner);
        for event in &inner.backlog {
            // Replay unanswered announcements the subscriber missed; echo
            // filtering happens at the receiving handler.
            let _ = tx.send(event.clone());
        }
        inner.listeners.push(tx);
        rx
    }
}

/// An element-like target inside a [`Page`].
///
/// Stands in for the concrete element a block or embedder is mounted on.
/// Events dispatched here reach every subscriber on the page.
pub struct EventTarget {
    id: EndpointId,
    page: Arc<Page>,
}

impl EventTarget {
    /// Create a new target belonging to `page`.
    pub fn new(page: &Arc<Page>) -> Arc<Self> {
        // ---
        Arc::new(Self {
            id: EndpointId::next(),
            page: page.clone(),
        })
    }

    /// Identity of this target.
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// The page this target belongs to.
    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    /// Dispatch a bubbling custom event from this target across the page.
    pub fn dispatch(self: &Arc<Self>, name: &str, detail: serde_json::Value) {
        // ---
        self.page.dispatch(TransportEvent::Custom {
            name: Arc::from(name),
            detail,
            origin: self.clone(),
        });
    }

    /// Start receiving every event dispatched on this target's page,
    /// beginning with the backlog of events dispatched before now.
    pub fn listen(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        self.page.attach()
    }
}

/// Local transport: envelopes travel as custom events on an
/// [`EventTarget`].
pub struct LocalTransport {
    target: Arc<EventTarget>,
}

impl LocalTransport {
    pub fn new(target: Arc<EventTarget>) -> Self {
        Self { target }
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    // ---
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    fn endpoint_id(&self) -> EndpointId {
        self.target.id()
    }

    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        // ---
        let detail = serde_json::to_value(envelope)?;
        self.target.dispatch(MESSAGE_EVENT_NAME, detail);
        Ok(())
    }

    async fn subscribe(&self) -> Result<TransportInbox> {
        // ---
        Ok(TransportInbox {
            inbox: self.target.listen(),
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn dispatch_reaches_every_target_on_the_page() {
        // ---
        let page = Page::new();
        let a = EventTarget::new(&page);
        let b = EventTarget::new(&page);

        let mut inbox = b.listen();
        a.dispatch("ping", json!({"n": 1}));

        match inbox.recv().await.unwrap() {
            TransportEvent::Custom { name, detail, origin } => {
                assert_eq!(name.as_ref(), "ping");
                assert_eq!(detail, json!({"n": 1}));
                assert_eq!(origin.id(), a.id());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    fn handshake_envelope(request_id: &str, name: &str) -> serde_json::Value {
        // ---
        json!({
            "requestId": request_id,
            "service": SERVICE_CORE,
            "source": if name == MSG_INIT { "block" } else { "embedder" },
            "name": name,
        })
    }

    #[tokio::test]
    async fn late_subscriber_sees_only_pending_announcements() {
        // ---
        let page = Page::new();
        let a = EventTarget::new(&page);

        a.dispatch(MESSAGE_EVENT_NAME, handshake_envelope("r-1", MSG_INIT));
        // Ordinary traffic, protocol or not, is never replayed.
        a.dispatch("click", json!({"x": 1}));
        a.dispatch(
            MESSAGE_EVENT_NAME,
            json!({
                "requestId": "r-2",
                "service": "dummy",
                "source": "block",
                "name": "notify",
            }),
        );

        let b = EventTarget::new(&page);
        let mut inbox = b.listen();
        match inbox.try_recv().unwrap() {
            TransportEvent::Custom { detail, .. } => {
                assert_eq!(detail["name"], json!(MSG_INIT));
                assert_eq!(detail["requestId"], json!("r-1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn answered_announcement_is_dropped_from_replay() {
        // ---
        let page = Page::new();
        let a = EventTarget::new(&page);

        a.dispatch(MESSAGE_EVENT_NAME, handshake_envelope("r-1", MSG_INIT));
        a.dispatch(MESSAGE_EVENT_NAME, handshake_envelope("r-9", MSG_INIT));
        a.dispatch(
            MESSAGE_EVENT_NAME,
            handshake_envelope("r-1", MSG_INIT_RESPONSE),
        );

        // Only the unanswered announcement survives; the answer itself is
        // not retained either.
        let b = EventTarget::new(&page);
        let mut inbox = b.listen();
        match inbox.try_recv().unwrap() {
            TransportEvent::Custom { detail, .. } => {
                assert_eq!(detail["requestId"], json!("r-9"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(inbox.try_recv().is_err());
    }
}
