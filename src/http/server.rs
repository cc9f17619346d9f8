//! HTTP server setup and the JSON API handler.
//!
//! # Responsibilities
//! - Create the Axum router (`/health`, `/api/{service}/{*path}`)
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Bridge JSON requests to backend RPCs through the gateway
//! - Record request metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Gateway;
use crate::http::request::{self, make_span};
use crate::observability::metrics;
use crate::schema::json_to_message;

/// HTTP server for the JSON API.
pub struct HttpServer {
    gateway: Arc<Gateway>,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let config = &self.gateway.config().http;

        Router::new()
            .route("/health", get(health_handler))
            .route("/api/{service}/{*path}", any(api_handler))
            .with_state(self.gateway.clone())
            .layer(DefaultBodyLimit::max(config.max_body_bytes))
            .layer(request::propagate_request_id_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(request::set_request_id_layer())
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn api_handler(
    State(gateway): State<Arc<Gateway>>,
    Path((service, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();

    let response = match call_backend(&gateway, &service, &path, &body).await {
        Ok(json) => (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], json).into_response(),
        Err(e) => {
            tracing::warn!(
                request_id = %request::request_id(&headers),
                service = %service,
                method = %path,
                error = %e,
                "API request failed"
            );
            e.into_response()
        }
    };

    metrics::record_http_request(&service, response.status().as_u16(), start);
    response
}

/// discover/select/acquire → resolve → convert → dispatch → marshal.
async fn call_backend(gateway: &Gateway, service: &str, path: &str, body: &[u8]) -> GatewayResult<Vec<u8>> {
    let lease = gateway.acquire(service).await?;
    let method = gateway.resolve(service, path)?;

    let mut request = method.new_request();
    json_to_message(body, &mut request)?;

    let cancel = gateway.shutdown_token();
    let response = gateway.dispatch(&cancel, &lease, &method, request).await?;
    serde_json::to_vec(&response).map_err(GatewayError::Marshal)
}
