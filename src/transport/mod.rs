//! Concrete transport implementations.
//!
//! This module provides the two bindings of the domain-level
//! [`Transport`](crate::Transport) trait:
//!
//! - [`LocalTransport`] — same-document custom events on a shared
//!   [`Page`] event plane (the reference implementation).
//! - [`RemoteTransport`] — cross-window posted messages between a
//!   connected [`WindowHandle`] pair.
//!
//! Handler code selects a binding once, via [`Endpoint`], and never
//! branches on endpoint type afterwards.

mod local;
mod remote;

pub use local::{EventTarget, LocalTransport, Page};
pub use remote::{RemoteTransport, WindowHandle};

use std::fmt;
use std::sync::Arc;

use crate::domain::{EndpointId, TransportPtr};

/// A concrete endpoint a handler can bind to.
///
/// The endpoint kind determines the transport binding for the handler's
/// whole lifetime: elements get the local binding, windows (isolated
/// frames or externally-opened windows) get the remote binding.
#[derive(Clone)]
pub enum Endpoint {
    /// An element-like target inside a shared document.
    Element(Arc<EventTarget>),
    /// This side's window handle of a connected cross-window pair.
    Window(Arc<WindowHandle>),
}

impl Endpoint {
    /// Identity of the underlying endpoint object.
    pub fn id(&self) -> EndpointId {
        match self {
            Endpoint::Element(target) => target.id(),
            Endpoint::Window(window) => window.id(),
        }
    }

    /// True when the endpoint is an isolated window rather than an element
    /// in a shared document.
    pub fn is_window(&self) -> bool {
        matches!(self, Endpoint::Window(_))
    }

    /// Construct the transport binding for this endpoint.
    pub(crate) fn transport(&self) -> TransportPtr {
        match self {
            Endpoint::Element(target) => Arc::new(LocalTransport::new(target.clone())),
            Endpoint::Window(window) => Arc::new(RemoteTransport::new(window.clone())),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Element(target) => write!(f, "Endpoint::Element({})", target.id()),
            Endpoint::Window(window) => write!(f, "Endpoint::Window({})", window.id()),
        }
    }
}
