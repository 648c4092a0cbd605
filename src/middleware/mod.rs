//! Middleware layer.
//!
//! Middleware wraps a service and is the right place for cross-cutting
//! concerns. The one built in here is tracing:
//!
//! - [`Trace`]: per-request server span with method, path, status and
//!   errors. It attaches the [`RequestBridge`](crate::RequestBridge) the
//!   [`Router`](crate::Router) uses to finish naming the span.

mod trace;

pub use trace::Trace;
