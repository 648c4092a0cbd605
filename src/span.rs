//! The per-request server span, reachable from the request [`Context`].

use std::fmt;

use http::{Method, StatusCode};
use opentelemetry::Context;
use tracing::{Span, error, field, info_span, trace};

/// Field `tracing-opentelemetry` reads the exported span name from.
pub const OTEL_NAME: &str = "otel.name";
pub const OTEL_STATUS_CODE: &str = "otel.status_code";
pub const HTTP_ROUTE: &str = "http.route";
pub const HTTP_RESPONSE_STATUS_CODE: &str = "http.response.status_code";
pub const EXCEPTION_MESSAGE: &str = "exception.message";

/// Top-level span of one inbound request.
///
/// A `tracing` span cannot change its name once created, so the exported
/// name lives in the [`OTEL_NAME`] field instead, and every field a layer
/// may fill in later is declared empty up front.
#[derive(Clone, Debug)]
pub struct ServerSpan(Span);

impl ServerSpan {
    /// Opens the span, named after the method until a route is known.
    pub fn new(method: &Method, path: &str) -> Self {
        let span = info_span!(
            "HTTP request",
            otel.name = %method,
            otel.kind = "server",
            http.request.method = %method,
            url.path = path,
            http.route = field::Empty,
            http.response.status_code = field::Empty,
            otel.status_code = field::Empty,
            exception.message = field::Empty,
        );
        Self(span)
    }

    /// Returns a context derived from `cx` that carries this span.
    pub fn attach_to(&self, cx: &Context) -> Context {
        cx.with_value(self.clone())
    }

    pub fn from_context(cx: &Context) -> Option<&Self> {
        cx.get::<Self>()
    }

    pub fn span(&self) -> &Span {
        &self.0
    }

    pub fn update_name(&self, name: &str) {
        trace!(parent: &self.0, name, "server span renamed");
        self.0.record(OTEL_NAME, name);
    }

    pub fn record_route(&self, route: &str) {
        self.0.record(HTTP_ROUTE, route);
    }

    /// Records the response status. 5xx marks the span as failed.
    pub fn record_status(&self, status: StatusCode) {
        self.0.record(HTTP_RESPONSE_STATUS_CODE, status.as_u16());
        if status.is_server_error() {
            self.0.record(OTEL_STATUS_CODE, "ERROR");
        }
    }

    /// Records a request failure on the span and logs it inside the span.
    pub fn record_exception(&self, err: &dyn fmt::Display) {
        self.0.record(EXCEPTION_MESSAGE, field::display(err));
        self.0.record(OTEL_STATUS_CODE, "ERROR");
        error!(parent: &self.0, exception.message = %err, "request failed");
    }
}
