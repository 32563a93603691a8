//! Handler layer: routing, correlation, and the handshake.
//!
//! A [`CoreHandler`] is the per-endpoint protocol engine; a
//! [`ServiceHandler`] is the per-capability façade services talk through.
//! Role differences between the block and embedder sides are captured in a
//! single [`Role`] value rather than two parallel handler types.

mod callback;
mod core;
pub(crate) mod handshake;
mod pending;
mod role;
mod service;

pub use self::callback::MessageCallback;
pub use self::core::CoreHandler;
pub use self::pending::PendingResponse;
pub use self::role::{HandshakeRole, Role};
pub use self::service::ServiceHandler;

pub(crate) use self::core::CoreInner;

use std::sync::{Mutex, MutexGuard};

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The maps protected here (services, callbacks, pending requests) have no
/// invariants spanning multiple fields; the worst outcome of continuing
/// after a panic elsewhere is a dropped or unmatched message. Ignoring
/// poisoning also avoids propagating non-`Send` poison errors across async
/// boundaries.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
