//! Gateway error taxonomy.
//!
//! Every failure on the request path maps to one variant. The HTTP surface
//! turns them into status codes; the WebSocket session logs them and keeps
//! serving subsequent frames.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::registry::RegistryError;
use crate::websocket::frame::FrameError;

/// Errors that can occur while bridging a client call to a backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The registry could not answer a discovery query.
    #[error("discovery failed for {service}: {source}")]
    Discovery {
        service: String,
        #[source]
        source: RegistryError,
    },

    /// Discovery succeeded but returned no usable instance.
    #[error("no instances available for {0}")]
    NoInstances(String),

    /// The pool could not establish a backend connection.
    #[error("failed to dial {address}: {reason}")]
    Dial { address: String, reason: String },

    /// No method is registered under `service.method`.
    #[error("unknown method {0}")]
    UnknownMethod(String),

    /// The JSON body could not be converted into the request message.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// A binary payload did not decode as the resolved message type.
    #[error("invalid payload: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The backend answered with a non-OK status.
    #[error("{}", .0.message())]
    Dispatch(tonic::Status),

    /// The typed response could not be rendered as JSON.
    #[error("failed to marshal response: {0}")]
    Marshal(#[source] serde_json::Error),

    /// The circuit breaker rejected the call.
    #[error("circuit open for {0}")]
    CircuitOpen(String),

    /// The caller went away before the backend answered.
    #[error("request cancelled")]
    Cancelled,

    /// The configured RPC deadline elapsed.
    #[error("rpc timed out after {0:?}")]
    Timeout(Duration),

    /// A WebSocket frame failed validation.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The descriptor set could not be loaded.
    #[error("schema error: {0}")]
    Schema(String),
}

impl GatewayError {
    /// HTTP status surfaced to API callers.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Discovery { .. } | GatewayError::NoInstances(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
