//! # span-bridge
//!
//! Two tracing layers, one request, one server span.
//!
//! ## The problem
//!
//! A request passes through a generic container layer ([`middleware::Trace`],
//! wraps any hyper service) and then a route-aware layer ([`Router`]). Both
//! want to name the server span, and both see errors returned while the
//! request is processed. Left alone they rename the span twice and record
//! each error twice (or not at all).
//!
//! ## The contract
//!
//! The container layer attaches a [`RequestBridge`] to the request's
//! [`opentelemetry::Context`]. From then on, any code running under that
//! context can ask:
//!
//! - [`RequestBridge::should_update_span_name`]: has anyone named the span
//!   yet? Whoever renames calls [`RequestBridge::mark_span_name_updated`].
//! - [`RequestBridge::should_record_exception`]: does the container layer
//!   record errors, or the router?
//!
//! With no bridge attached every query still answers: don't rename, do
//! record. That is what a single layer on its own should do.
//!
//! ## Quick start
//!
//! ```rust
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use span_bridge::{Error, Params, Response, Router, middleware::Trace};
//!
//! async fn get_user(req: http::Request<()>) -> Result<Response, Error> {
//!     let id = Params::of(&req, "id").unwrap_or("unknown");
//!     Ok(Response::new(Full::new(Bytes::from(format!(r#"{{"id":"{id}"}}"#)))))
//! }
//!
//! let app = Router::new().get("/users/{id}", get_user);
//!
//! // The router records handler errors; `Trace` only names and closes the span.
//! let service = Trace::new(app).record_exceptions(false);
//! # let _ = service;
//! ```
//!
//! Serve `service` with hyper (see `demos/basic.rs`). Span names end up as
//! `GET /users/{id}` in the `otel.name` field, which `tracing-opentelemetry`
//! exports as the span name.

mod bridge;
mod call_depth;
mod error;
mod handler;
mod router;
mod span;

pub mod middleware;

pub use bridge::{RequestBridge, call_depth_key};
pub use call_depth::CallDepth;
pub use error::Error;
pub use handler::{Handler, Response};
pub use router::{Params, Router};
pub use span::{
    EXCEPTION_MESSAGE, HTTP_RESPONSE_STATUS_CODE, HTTP_ROUTE, OTEL_NAME, OTEL_STATUS_CODE,
    ServerSpan,
};
