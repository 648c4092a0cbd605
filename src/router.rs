//! Radix-tree request router, and the route-aware half of the tracing.
//!
//! One tree per HTTP method, O(path-length) lookup via [`matchit`]. The
//! router is the only layer that knows the route *template* a request
//! matched, so it is the one that gives the server span its final,
//! low-cardinality name (`GET /users/{id}`), provided the
//! [`RequestBridge`] says nobody has done so yet.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use hyper::service::Service;
use matchit::Router as MatchitRouter;
use opentelemetry::Context;
use tracing::debug;

use crate::bridge::RequestBridge;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, Response};
use crate::span::ServerSpan;

/// Path parameters of the matched route, stored in the request extensions.
///
/// For a route `/users/{id}`, a request to `/users/42` carries
/// `Params` with `id = "42"`.
#[derive(Clone, Debug, Default)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Looks up a path parameter on a routed request.
    pub fn of<'r, B>(req: &'r http::Request<B>, key: &str) -> Option<&'r str> {
        req.extensions().get::<Params>()?.get(key)
    }
}

struct Route<B> {
    template: Arc<str>,
    handler: BoxedHandler<B>,
}

/// The application router.
///
/// Build it once at startup and serve it, usually wrapped in
/// [`Trace`](crate::middleware::Trace). Registrations chain:
///
/// ```rust
/// use bytes::Bytes;
/// use http_body_util::Full;
/// use span_bridge::{Error, Params, Response, Router};
///
/// async fn get_user(req: http::Request<()>) -> Result<Response, Error> {
///     let id = Params::of(&req, "id").unwrap_or("unknown");
///     Ok(Response::new(Full::new(Bytes::from(format!(r#"{{"id":"{id}"}}"#)))))
/// }
///
/// let app = Router::new().get("/users/{id}", get_user);
/// assert_eq!(app.route_name(&http::Method::GET, "/users/42"), Some("/users/{id}"));
/// ```
pub struct Router<B> {
    routes: HashMap<Method, MatchitRouter<Route<B>>>,
}

impl<B: Send + 'static> Router<B> {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax, catch-alls `{*rest}`.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler<B>) -> Self {
        let route = Route { template: Arc::from(path), handler: handler.into_boxed_handler() };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler<B>) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler<B>) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler<B>) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler<B>) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// The route template `path` matches for `method`, if any.
    pub fn route_name(&self, method: &Method, path: &str) -> Option<&str> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        Some(&*matched.value.template)
    }

    /// Turns this router into a handler, so it can be mounted under a
    /// catch-all route of another router.
    ///
    /// The outer router names the span; the mounted one finds the name
    /// already taken and leaves it alone.
    pub fn into_handler(self) -> impl Handler<B> {
        let router = Arc::new(self);
        move |req: http::Request<B>| router.dispatch(req)
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<str>, BoxedHandler<B>, Params)> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((
            Arc::clone(&matched.value.template),
            Arc::clone(&matched.value.handler),
            Params(params),
        ))
    }

    fn dispatch(&self, mut req: http::Request<B>) -> BoxFuture {
        let Some((template, handler, params)) = self.lookup(req.method(), req.uri().path()) else {
            debug!(method = %req.method(), path = req.uri().path(), "no route matched");
            return Box::pin(async { Ok::<_, Error>(not_found()) });
        };

        // Only the router that names the span records errors for it, so a
        // mounted router and its parent never both record the same one.
        let cx = Context::current();
        let claimed = RequestBridge::should_update_span_name(&cx);
        if claimed {
            if let Some(span) = ServerSpan::from_context(&cx) {
                span.update_name(&format!("{} {template}", req.method()));
                span.record_route(&template);
            }
            RequestBridge::mark_span_name_updated(&cx, true);
        }

        req.extensions_mut().insert(params);
        let fut = ErasedHandler::call(&*handler, req);

        Box::pin(async move {
            let result = fut.await;
            if let Err(err) = &result {
                if claimed && !RequestBridge::should_record_exception(&cx) {
                    if let Some(span) = ServerSpan::from_context(&cx) {
                        span.record_exception(err);
                    }
                }
            }
            result
        })
    }
}

impl<B: Send + 'static> Default for Router<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Send + 'static> Service<http::Request<B>> for Router<B> {
    type Response = Response;
    type Error = Error;
    type Future = BoxFuture;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        self.dispatch(req)
    }
}

fn not_found() -> Response {
    let mut res = Response::default();
    *res.status_mut() = StatusCode::NOT_FOUND;
    res
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::Full;

    use super::*;

    async fn echo_id(req: http::Request<()>) -> Result<Response, Error> {
        let id = Params::of(&req, "id").unwrap_or_default().to_owned();
        Ok(Response::new(Full::new(Bytes::from(id))))
    }

    async fn fail(_req: http::Request<()>) -> Result<Response, Error> {
        Err(Error::msg("handler failed"))
    }

    fn request(method: Method, path: &str) -> http::Request<()> {
        http::Request::builder().method(method).uri(path).body(()).unwrap()
    }

    #[test]
    fn route_name_returns_template() {
        let app = Router::new()
            .get("/users/{id}", echo_id)
            .post("/users", echo_id);

        assert_eq!(app.route_name(&Method::GET, "/users/7"), Some("/users/{id}"));
        assert_eq!(app.route_name(&Method::POST, "/users"), Some("/users"));
        assert_eq!(app.route_name(&Method::POST, "/users/7"), None);
        assert_eq!(app.route_name(&Method::DELETE, "/users/7"), None);
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_route_panics() {
        let _ = Router::new()
            .get("/users/{id}", echo_id)
            .get("/users/{name}", echo_id);
    }

    #[tokio::test]
    async fn unmatched_is_404() {
        let app = Router::new().get("/users/{id}", echo_id);

        let res = app.call(request(Method::GET, "/nope")).await.unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn params_reach_handler() {
        use http_body_util::BodyExt;

        let app = Router::new().get("/users/{id}", echo_id);

        let res = app.call(request(Method::GET, "/users/42")).await.unwrap();
        let body = res.into_body().collect().await.unwrap().to_bytes();

        assert_eq!(body, Bytes::from_static(b"42"));
    }

    #[tokio::test]
    async fn claims_span_name_through_bridge() {
        let app = Router::new().get("/users/{id}", echo_id);
        let cx = RequestBridge::attach(&Context::new());

        let fut = {
            let _attached = cx.clone().attach();
            app.call(request(Method::GET, "/users/1"))
        };
        fut.await.unwrap();

        assert!(!RequestBridge::should_update_span_name(&cx));
    }

    #[tokio::test]
    async fn unmatched_leaves_span_name_open() {
        let app = Router::new().get("/users/{id}", echo_id);
        let cx = RequestBridge::attach(&Context::new());

        let fut = {
            let _attached = cx.clone().attach();
            app.call(request(Method::GET, "/elsewhere"))
        };
        fut.await.unwrap();

        assert!(RequestBridge::should_update_span_name(&cx));
    }

    #[tokio::test]
    async fn works_without_bridge() {
        let app = Router::new().get("/fail", fail);

        let err = app.call(request(Method::GET, "/fail")).await.unwrap_err();

        assert_eq!(err.to_string(), "handler failed");
    }
}
