//! Minimal span-bridge example: a traced router served with hyper.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42       → span `GET /users/{id}`
//!   curl -X POST http://localhost:3000/users  → span `POST /users`, 201
//!   curl http://localhost:3000/api/ping       → span `GET /api/{*rest}`, named once
//!   curl http://localhost:3000/fail           → error recorded once, by the router

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::{Service, service_fn};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use span_bridge::{Error, Params, Response, Router, middleware::Trace};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let api = Router::new().get("/api/ping", ping);

    let app = Router::new()
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .get("/fail", fail)
        .get("/api/{*rest}", api.into_handler());

    // The router sees handler errors first, so it records them.
    let service = Arc::new(Trace::new(app).record_exceptions(false));

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    info!("listening on 0.0.0.0:3000");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                error!("accept error: {e}");
                continue;
            }
        };

        let service = Arc::clone(&service);
        tokio::spawn(async move {
            // Errors were already recorded on the span; hyper only ever sees
            // a response.
            let svc = service_fn(move |req: http::Request<Incoming>| {
                let fut = service.call(req);
                async move { Ok::<_, Infallible>(fut.await.unwrap_or_else(|_| internal_error())) }
            });

            if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), svc)
                .await
            {
                error!(peer = %peer, "connection error: {e}");
            }
        });
    }
}

// GET /users/{id}
async fn get_user(req: http::Request<Incoming>) -> Result<Response, Error> {
    let id = Params::of(&req, "id").unwrap_or("unknown");
    Ok(Response::new(Full::new(Bytes::from(format!(r#"{{"id":"{id}","name":"alice"}}"#)))))
}

// POST /users → 201 Created
async fn create_user(_req: http::Request<Incoming>) -> Result<Response, Error> {
    let res = http::Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .body(Full::new(Bytes::from_static(br#"{"id":"99","name":"new_user"}"#)))?;
    Ok(res)
}

// GET /api/ping, reached through the mounted router
async fn ping(_req: http::Request<Incoming>) -> Result<Response, Error> {
    Ok(Response::new(Full::new(Bytes::from_static(b"pong"))))
}

// GET /fail
async fn fail(_req: http::Request<Incoming>) -> Result<Response, Error> {
    Err(Error::msg("database unavailable"))
}

fn internal_error() -> Response {
    let mut res = Response::default();
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res
}
