//! Request-scoped coordination between the container layer and the router.
//!
//! Both layers observe the same request, and both would like to name the
//! server span and record errors on it. Neither holds a reference to the
//! other. Instead the container layer attaches a [`RequestBridge`] to the
//! request's [`Context`] when it first sees the request, and every later
//! decision is a lookup on that context:
//!
//! ```text
//! Trace::call                          Router::call
//!   cx = attach_with(cx, record)  ──▶    should_update_span_name(cx)?
//!                                          rename span
//!                                          mark_span_name_updated(cx, true)
//!   should_record_exception(cx)?  ◀──    !should_record_exception(cx)?
//! ```
//!
//! Every query is total. When no bridge is attached the answer is the one a
//! single, uncoordinated layer should act on: do not rename, do record.

use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};

use opentelemetry::Context;
use tracing::trace;

/// Coordination flags for one in-flight request.
///
/// Only reachable through the [`Context`] it was attached to. The context
/// owns it; dropping the last clone of the context drops the bridge.
#[derive(Debug)]
pub struct RequestBridge {
    name_updated: AtomicBool,
    record_exception_here: AtomicBool,
}

impl RequestBridge {
    fn new(record_exception_here: bool) -> Self {
        Self {
            name_updated: AtomicBool::new(false),
            record_exception_here: AtomicBool::new(record_exception_here),
        }
    }

    /// Attaches a bridge that leaves error recording to the container layer.
    ///
    /// Shorthand for [`attach_with(cx, true)`](RequestBridge::attach_with).
    pub fn attach(cx: &Context) -> Context {
        Self::attach_with(cx, true)
    }

    /// Returns a new context carrying a fresh bridge.
    ///
    /// `cx` itself is left untouched and stays bridge-free.
    ///
    /// `record_exception_here` decides which layer records an error returned
    /// while processing the request: `true` for the container layer, `false`
    /// for the router. Pass `false` when errors propagate to the point where
    /// the router can see them and the container layer would only duplicate
    /// the record.
    pub fn attach_with(cx: &Context, record_exception_here: bool) -> Context {
        trace!(record_exception_here, "request bridge attached");
        cx.with_value(Self::new(record_exception_here))
    }

    /// The bridge attached to `cx`, if any.
    pub fn from_context(cx: &Context) -> Option<&Self> {
        cx.get::<Self>()
    }

    /// `true` if a bridge is attached and nobody has renamed the span yet.
    ///
    /// Returns `false` when no bridge is attached.
    pub fn should_update_span_name(cx: &Context) -> bool {
        Self::from_context(cx).is_some_and(|bridge| !bridge.name_updated())
    }

    /// Records whether the span has been renamed for this request.
    ///
    /// Called right after renaming, with `true`, so that nested dispatch does
    /// not rename a second time. Passing `false` re-opens the latch. Does
    /// nothing when no bridge is attached.
    pub fn mark_span_name_updated(cx: &Context, value: bool) {
        if let Some(bridge) = Self::from_context(cx) {
            bridge.name_updated.store(value, Ordering::Release);
        }
    }

    /// Whether the container layer should record request errors on the span.
    ///
    /// Returns `true` when no bridge is attached: a lone layer owns its
    /// errors.
    pub fn should_record_exception(cx: &Context) -> bool {
        Self::from_context(cx).is_none_or(RequestBridge::record_exception_here)
    }

    pub fn name_updated(&self) -> bool {
        self.name_updated.load(Ordering::Acquire)
    }

    pub fn record_exception_here(&self) -> bool {
        self.record_exception_here.load(Ordering::Acquire)
    }
}

/// Key for [`CallDepth`](crate::CallDepth) shared by every copy of the
/// container layer in this build of the crate.
///
/// The returned id is the same on every call. A type declared the same way
/// in another crate, or in a second version of this one linked into the same
/// binary, has a different id, so stacked copies of the layer never share a
/// counter by accident.
pub fn call_depth_key() -> TypeId {
    struct Key;

    TypeId::of::<Key>()
}
