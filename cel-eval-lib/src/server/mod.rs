//! HTTP front end
//!
//! A single endpoint, `/eval`, accepts `POST` requests carrying an expression and its
//! variables as JSON or YAML and answers with `{"result": "<text>"}`. Every response
//! carries permissive CORS headers so browser clients can call the server directly.
//!
//! Status codes:
//!
//! - `200` with the result on success
//! - `204` for `OPTIONS` preflight requests
//! - `400` when the body cannot be read or decoded, or evaluation fails
//! - `405` for any other method
//! - `415` when the `Content-Type` is not JSON or YAML

mod config;
mod handler;

pub use config::{DEFAULT_CONFIG_FILE, ServerConfig};
pub use handler::{EvalRequest, EvalResponse, RequestError};

use crate::Result;
use crate::eval::Environment;
use axum::Router;
use axum::http::{HeaderValue, header};
use axum::middleware;
use axum::response::Response;
use axum::routing::any;
use ohno::IntoAppError;
use std::sync::Arc;
use tokio::net::TcpListener;

const LOG_TARGET: &str = "    server";

/// State shared by all requests.
#[derive(Debug)]
pub struct ServerState {
    env: Arc<Environment>,
    max_body_bytes: usize,
}

/// Builds the router serving `/eval`.
pub fn router(env: Arc<Environment>, max_body_bytes: usize) -> Router {
    let state = Arc::new(ServerState { env, max_body_bytes });

    Router::new()
        .route("/eval", any(handler::handle_eval))
        .with_state(state)
        .layer(middleware::map_response(add_cors_headers))
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    let _ = headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    let _ = headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST, OPTIONS"));
    let _ = headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Accept, Content-Type"));
    response
}

/// Binds the configured address and serves requests until the server fails.
pub async fn serve(config: &ServerConfig, env: Environment) -> Result<()> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await.into_app_err_with(|| format!("binding to {addr}"))?;
    serve_on(listener, env, config.max_body_bytes).await
}

/// Serves requests on an already bound listener until the server fails.
pub async fn serve_on(listener: TcpListener, env: Environment, max_body_bytes: usize) -> Result<()> {
    let addr = listener.local_addr().into_app_err("reading the bound address")?;
    log::info!(target: LOG_TARGET, "Listening on http://{addr}/eval");

    axum::serve(listener, router(Arc::new(env), max_body_bytes))
        .await
        .into_app_err("serving HTTP requests")
}
