//! Table of requests awaiting a response.
//!
//! An entry is created exactly when a message is sent expecting a reply,
//! and removed exactly when a response with the *matching* name settles it.
//! A response arriving under a known request id but the wrong name is a
//! protocol violation; the entry stays in place so a later, correct
//! response can still settle the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::correlation::RequestId;
use crate::domain::MessageContents;
use crate::handler::lock_ignore_poison;
use crate::{Error, Result};

struct PendingEntry {
    expected_response_name: String,
    tx: oneshot::Sender<MessageContents>,
}

/// Map of in-flight requests, keyed by request id.
pub(crate) struct PendingRequests {
    requests: HashMap<RequestId, PendingEntry>,
}

impl PendingRequests {
    // ---
    pub fn new() -> Self {
        // ---
        Self {
            requests: HashMap::new(),
        }
    }

    /// Register a request awaiting a response named `expected_response_name`.
    ///
    /// Returns the receiver that will be notified when a matching response
    /// arrives.
    pub fn register(
        &mut self,
        request_id: RequestId,
        expected_response_name: impl Into<String>,
    ) -> oneshot::Receiver<MessageContents> {
        // ---
        let (tx, rx) = oneshot::channel();
        self.requests.insert(
            request_id,
            PendingEntry {
                expected_response_name: expected_response_name.into(),
                tx,
            },
        );
        rx
    }

    /// Try to settle the entry for `request_id` with a response named
    /// `name`.
    ///
    /// Returns `Ok(true)` if an entry was settled and removed, `Ok(false)`
    /// if no entry exists for this id, and
    /// [`Error::UnexpectedResponseName`] — leaving the entry in place — if
    /// the name does not match what the request was promised.
    pub fn settle(
        &mut self,
        request_id: &RequestId,
        name: &str,
        contents: MessageContents,
    ) -> Result<bool> {
        // ---
        let Some(entry) = self.requests.get(request_id) else {
            return Ok(false);
        };

        if entry.expected_response_name != name {
            return Err(Error::UnexpectedResponseName {
                request_id: request_id.clone(),
                expected: entry.expected_response_name.clone(),
                received: name.to_string(),
            });
        }

        if let Some(entry) = self.requests.remove(request_id) {
            // Receiver may be gone if the caller abandoned the request.
            let _ = entry.tx.send(contents);
        }
        Ok(true)
    }

    /// Remove an entry without settling it (timeout or cancellation).
    pub fn remove(&mut self, request_id: &RequestId) -> bool {
        // ---
        self.requests.remove(request_id).is_some()
    }

    /// Number of requests currently awaiting a response.
    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

/// Deferred result of a request expecting a response.
///
/// Awaiting it yields the `{payload, errors}` of the correlated response.
/// With no deadline configured, a lost response leaves the future pending
/// indefinitely; [`PendingResponse::cancel`] abandons the request instead.
pub struct PendingResponse {
    request_id: RequestId,
    rx: oneshot::Receiver<MessageContents>,
    deadline: Option<Duration>,
    table: Arc<Mutex<PendingRequests>>,
}

impl PendingResponse {
    pub(crate) fn new(
        request_id: RequestId,
        rx: oneshot::Receiver<MessageContents>,
        deadline: Option<Duration>,
        table: Arc<Mutex<PendingRequests>>,
    ) -> Self {
        Self {
            request_id,
            rx,
            deadline,
            table,
        }
    }

    /// Id of the request this response will settle.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Abandon the request, removing its pending entry without settling it.
    pub fn cancel(self) {
        // ---
        lock_ignore_poison(&self.table).remove(&self.request_id);
    }
}

impl std::future::IntoFuture for PendingResponse {
    type Output = Result<MessageContents>;
    type IntoFuture = crate::handler::callback::BoxFuture<'static, Result<MessageContents>>;

    fn into_future(self) -> Self::IntoFuture {
        // ---
        Box::pin(async move {
            let Self {
                request_id,
                rx,
                deadline,
                table,
            } = self;

            let settled = async move { rx.await.map_err(|_| Error::ResponseDropped) };

            match deadline {
                None => settled.await,
                Some(limit) => match tokio::time::timeout(limit, settled).await {
                    Ok(result) => result,
                    Err(_) => {
                        lock_ignore_poison(&table).remove(&request_id);
                        Err(Error::Timeout)
                    }
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn register_and_settle() {
        // ---
        let mut pending = PendingRequests::new();
        let request_id = RequestId::generate();

        let rx = pending.register(request_id.clone(), "pongResponse");
        assert_eq!(pending.len(), 1);

        let contents = MessageContents::from_payload(json!(7));
        assert!(pending
            .settle(&request_id, "pongResponse", contents.clone())
            .unwrap());

        // Removed after settlement.
        assert_eq!(pending.len(), 0);
        assert_eq!(rx.blocking_recv().unwrap(), contents);
    }

    #[test]
    fn settle_unknown_id() {
        // ---
        let mut pending = PendingRequests::new();
        let settled = pending
            .settle(&RequestId::generate(), "anything", MessageContents::default())
            .unwrap();
        assert!(!settled);
    }

    #[test]
    fn wrong_name_errors_and_keeps_entry() {
        // ---
        let mut pending = PendingRequests::new();
        let request_id = RequestId::generate();
        let rx = pending.register(request_id.clone(), "pongResponse");

        let result = pending.settle(&request_id, "somethingElse", MessageContents::default());
        assert!(matches!(
            result,
            Err(Error::UnexpectedResponseName { .. })
        ));
        assert_eq!(pending.len(), 1);

        // A later, correct response still settles the caller.
        assert!(pending
            .settle(&request_id, "pongResponse", MessageContents::default())
            .unwrap());
        assert!(rx.blocking_recv().is_ok());
    }

    #[test]
    fn remove_without_settling() {
        // ---
        let mut pending = PendingRequests::new();
        let request_id = RequestId::generate();
        let _rx = pending.register(request_id.clone(), "pongResponse");

        assert!(pending.remove(&request_id));
        assert!(!pending.remove(&request_id));
    }
}
