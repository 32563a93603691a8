//! Type-erased async message callbacks.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::domain::MessageContents;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered reaction to one message name within one service.
///
/// Callbacks receive the message's `{payload, errors}` and may return a
/// `{payload, errors}` of their own; returning `None` is treated as
/// returning the empty contents. When the triggering message demanded a
/// response, the returned contents become that response's body.
///
/// Cheap to clone (internally `Arc`-backed), so the dispatch table can hand
/// out copies without holding its lock across an `await`.
#[derive(Clone)]
pub struct MessageCallback(
    Arc<dyn Fn(MessageContents) -> BoxFuture<'static, Option<MessageContents>> + Send + Sync>,
);

impl MessageCallback {
    /// Wrap an async closure as a registerable callback.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(MessageContents) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<MessageContents>> + Send + 'static,
    {
        Self(Arc::new(move |contents| Box::pin(func(contents))))
    }

    pub(crate) fn call(&self, contents: MessageContents) -> BoxFuture<'static, Option<MessageContents>> {
        (self.0)(contents)
    }
}

impl fmt::Debug for MessageCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MessageCallback(..)")
    }
}
