//! Container-level tracing layer.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use hyper::service::Service;
use opentelemetry::Context;
use opentelemetry::context::FutureExt as _;
use tracing::{Instrument as _, debug};

use crate::bridge::{RequestBridge, call_depth_key};
use crate::call_depth::CallDepth;
use crate::span::ServerSpan;

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

/// Wraps any hyper service with a server span and a [`RequestBridge`].
///
/// `Trace` knows nothing about routing: it names the span after the method
/// and leaves the final name to whichever inner layer claims it first
/// through the bridge. Stacking `Trace` twice around the same service opens
/// one span: the inner copy steps aside when it sees a non-zero
/// [`CallDepth`] or a bridge already attached to the current context.
///
/// ```rust
/// use span_bridge::{Router, middleware::Trace};
///
/// let router: Router<()> = Router::new();
/// let service = Trace::new(router).record_exceptions(false);
/// ```
#[derive(Clone, Debug)]
pub struct Trace<S> {
    inner: S,
    record_exceptions: bool,
}

impl<S> Trace<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, record_exceptions: true }
    }

    /// Whether this layer records errors returned by the inner service.
    ///
    /// Defaults to `true`. Set `false` when the inner service records its
    /// own errors on the span (the [`Router`](crate::Router) does when told
    /// to through the bridge), so each error is recorded exactly once.
    pub fn record_exceptions(mut self, enabled: bool) -> Self {
        self.record_exceptions = enabled;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S, B, R> Service<http::Request<B>> for Trace<S>
where
    S: Service<http::Request<B>, Response = http::Response<R>>,
    S::Error: fmt::Display + Send + 'static,
    S::Future: Send + 'static,
    R: Send + 'static,
{
    type Response = http::Response<R>;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        // Already traced: either a copy of this layer is still inside its
        // own `call` on this thread, or one further out attached a bridge
        // and the request reached us from inside a future.
        let depth = CallDepth::enter(call_depth_key());
        if !depth.is_outermost() || RequestBridge::from_context(&Context::current()).is_some() {
            return Box::pin(self.inner.call(req));
        }

        let span = ServerSpan::new(req.method(), req.uri().path());
        let cx = RequestBridge::attach_with(
            &span.attach_to(&Context::current()),
            self.record_exceptions,
        );
        debug!(parent: span.span(), record_exceptions = self.record_exceptions, "request observed");

        // The inner service reads the context synchronously in `call`, then
        // again from inside its future on whichever thread polls it.
        let fut = {
            let _attached = cx.clone().attach();
            let _entered = span.span().enter();
            self.inner.call(req)
        };

        let instrumented = span.span().clone();
        Box::pin(
            finish(fut, span, cx.clone())
                .instrument(instrumented)
                .with_context(cx),
        )
    }
}

async fn finish<F, T, E>(fut: F, span: ServerSpan, cx: Context) -> Result<http::Response<T>, E>
where
    F: Future<Output = Result<http::Response<T>, E>>,
    E: fmt::Display,
{
    let result = fut.await;
    match &result {
        Ok(res) => span.record_status(res.status()),
        Err(err) if RequestBridge::should_record_exception(&cx) => span.record_exception(err),
        Err(_) => {}
    }
    result
}
