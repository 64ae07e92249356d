//! HTTP listeners: the public API server and the admin server for health
//! checks and metrics. Both stop accepting connections when `shutdown` fires.

use super::{api, AppState};
use crate::access;
use crate::metrics;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

/// Serve the public API on `addr` until `shutdown` is cancelled.
pub async fn serve_api(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                let state = state.clone();
                async move { api::handle_api(req, &state).await }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    tracing::info!("API server listening on {}", addr);
    server
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Start the admin HTTP server serving /healthz, /readyz, and /metrics.
pub async fn serve_admin(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                let state = state.clone();
                async move { handle_admin(req, &state).await }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    tracing::info!("Admin HTTP server listening on {}", addr);
    server
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn plain(body: impl Into<Body>, status: StatusCode) -> Response<Body> {
    let mut res = Response::new(body.into());
    *res.status_mut() = status;
    res
}

/// Readiness: the key-value store answers a read and the document
/// collection answers a ping.
async fn readiness(state: &AppState) -> Result<(), String> {
    if let Err(e) = state.kv.ping() {
        access::dependency_unready("kv", &e.to_string());
        return Err(e.to_string());
    }
    let collection = state.engine.collection();
    if let Err(e) = collection.ping().await {
        access::dependency_unready(collection.backend_name(), &e);
        return Err(e);
    }
    Ok(())
}

pub async fn handle_admin(
    req: Request<Body>,
    state: &AppState,
) -> Result<Response<Body>, hyper::Error> {
    let path = req.uri().path().to_string();
    let response = match path.as_str() {
        "/healthz" => plain("ok\n", StatusCode::OK),

        "/readyz" => match readiness(state).await {
            Ok(()) => plain("ready\n", StatusCode::OK),
            Err(_) => plain("not ready\n", StatusCode::SERVICE_UNAVAILABLE),
        },

        "/metrics" => {
            let mut res = plain(metrics::encode_metrics(), StatusCode::OK);
            res.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            res
        }

        _ => plain("not found\n", StatusCode::NOT_FOUND),
    };

    access::http_request(req.method().as_str(), &path, response.status().as_u16());
    Ok(response)
}
