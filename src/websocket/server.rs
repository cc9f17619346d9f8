//! WebSocket listener: `GET /ws` upgrades into a session.

use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;
use crate::websocket::session;

pub struct WebSocketServer {
    gateway: Arc<Gateway>,
}

impl WebSocketServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(upgrade_handler))
            .with_state(self.gateway.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Accept upgrades until `shutdown` is cancelled. Sessions already
    /// upgraded are closed by `Gateway::shutdown`.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "WebSocket server starting");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!("WebSocket server stopped");
        Ok(())
    }
}

async fn upgrade_handler(ws: WebSocketUpgrade, State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    let max_frame = gateway.config().websocket.max_frame_bytes;
    ws.max_message_size(max_frame)
        .max_frame_size(max_frame)
        .on_upgrade(move |socket| session::serve(socket, gateway))
}
