//! Handler trait and type erasure.
//!
//! The router stores handlers of different concrete types side by side, so
//! each one is boxed behind [`ErasedHandler`]:
//!
//! ```text
//! async fn get_user(req) -> Result<Response, Error>  ← user writes this
//!        ↓ router.get("/users/{id}", get_user)
//! Arc::new(FnHandler(get_user))                       ← BoxedHandler<B>
//!        ↓ at request time
//! handler.call(req)                                   ← one vtable dispatch
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;

use crate::error::Error;

/// The response every handler produces.
pub type Response = http::Response<Full<Bytes>>;

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<Response, Error>> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler<B> {
    fn call(&self, req: http::Request<B>) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler<B> = Arc<dyn ErasedHandler<B> + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Satisfied by any `async fn` (or closure) of the shape
///
/// ```text
/// async fn name(req: http::Request<B>) -> Result<Response, Error>
/// ```
///
/// Returning `Err` is how a handler reports a failure the tracing layers
/// should record on the server span. The trait is sealed.
pub trait Handler<B>: private::Sealed<B> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler<B>;
}

mod private {
    pub trait Sealed<B> {}
}

impl<F, Fut, B> private::Sealed<B> for F
where
    F: Fn(http::Request<B>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
}

impl<F, Fut, B> Handler<B> for F
where
    F: Fn(http::Request<B>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
    B: 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler<B> {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, B> ErasedHandler<B> for FnHandler<F>
where
    F: Fn(http::Request<B>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    fn call(&self, req: http::Request<B>) -> BoxFuture {
        Box::pin((self.0)(req))
    }
}
