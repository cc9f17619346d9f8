//! Per-connection session state machine.
//!
//! # States
//! ```text
//! Open → Processing (frame in flight) → Open
//! Open | Processing → Closing → Closed (terminal)
//! ```
//!
//! # Tasks
//! - Reader: validates frames, feeds the bounded queue, reports read errors
//!   on a capacity-1 channel, then exits
//! - Writer/dispatcher (this task): serves queued frames in order, sends
//!   heartbeats, executes broadcast/close commands
//!
//! Only a read error, a failed write or a close command ends the session.
//! Every other failure drops the frame and the session keeps serving.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::observability::metrics;
use crate::websocket::clients::{ConnectionId, Outbound};
use crate::websocket::frame;

const HEARTBEAT_PAYLOAD: &[u8] = b"heartbeat";

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open = 0,
    Processing = 1,
    Closing = 2,
    Closed = 3,
}

/// Why the reader stopped.
#[derive(Debug)]
enum ReadEnd {
    /// Close frame or end of stream; carries the peer's close code if any.
    Closed(Option<u16>),
    Failed(axum::Error),
}

impl ReadEnd {
    fn is_normal(&self) -> bool {
        match self {
            ReadEnd::Closed(None) => true,
            ReadEnd::Closed(Some(code)) => {
                matches!(*code, close_code::NORMAL | close_code::AWAY | close_code::STATUS)
            }
            ReadEnd::Failed(_) => false,
        }
    }
}

struct Session {
    id: ConnectionId,
    gateway: Arc<Gateway>,
    sink: SplitSink<WebSocket, Message>,
    state: SessionState,
    cancel: CancellationToken,
    write_deadline: Duration,
    close_deadline: Duration,
    send_error_frames: bool,
}

/// Drive one upgraded connection until it closes.
pub async fn serve(socket: WebSocket, gateway: Arc<Gateway>) {
    let id = ConnectionId::new();
    let config = gateway.config().websocket.clone();

    let (outbound_tx, mut outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
    let registration = gateway.clients().register(id, outbound_tx);
    metrics::set_ws_sessions(gateway.clients().len());
    tracing::info!(connection_id = %id, "WebSocket session opened");

    let cancel = gateway.shutdown_token();
    let (sink, stream) = socket.split();
    let (queue_tx, mut queue_rx) = mpsc::channel::<Bytes>(config.queue_capacity.max(1));
    let (error_tx, mut error_rx) = mpsc::channel::<ReadEnd>(1);
    let reader = tokio::spawn(read_frames(id, stream, queue_tx, error_tx));

    let mut session = Session {
        id,
        gateway: gateway.clone(),
        sink,
        state: SessionState::Open,
        cancel: cancel.clone(),
        write_deadline: config.write_deadline(),
        close_deadline: config.close_deadline(),
        send_error_frames: config.send_error_frames,
    };

    let period = config.heartbeat_interval();
    let mut heartbeat = time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            Some(raw) = queue_rx.recv() => {
                if session.handle_frame(raw).await.is_err() {
                    break;
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = session.write(Message::Ping(Bytes::from_static(HEARTBEAT_PAYLOAD))).await {
                    tracing::warn!(connection_id = %id, error = %e, "Heartbeat failed");
                    break;
                }
            }

            Some(end) = error_rx.recv() => {
                match &end {
                    end if end.is_normal() => {
                        tracing::debug!(connection_id = %id, reason = ?end, "Client closed connection");
                    }
                    ReadEnd::Failed(e) => {
                        tracing::warn!(connection_id = %id, error = %e, "WebSocket read failed");
                    }
                    ReadEnd::Closed(code) => {
                        tracing::warn!(connection_id = %id, code = ?code, "Client closed connection abnormally");
                    }
                }
                break;
            }

            Some(command) = outbound_rx.recv() => match command {
                Outbound::Frame(bytes) => {
                    if let Err(e) = session.write(Message::Binary(bytes)).await {
                        tracing::debug!(connection_id = %id, error = %e, "Broadcast write failed");
                        break;
                    }
                }
                Outbound::Close => {
                    session.send_close().await;
                    break;
                }
            },
        }
    }

    session.transition(SessionState::Closing);
    reader.abort();
    session.close().await;
    drop(registration);
    metrics::set_ws_sessions(gateway.clients().len());
    tracing::info!(connection_id = %id, "WebSocket session closed");
}

/// Read raw frames until the client goes away.
async fn read_frames(
    id: ConnectionId,
    mut stream: SplitStream<WebSocket>,
    queue: mpsc::Sender<Bytes>,
    errors: mpsc::Sender<ReadEnd>,
) {
    let end = loop {
        let Some(message) = stream.next().await else {
            break ReadEnd::Closed(None);
        };

        match message {
            Ok(Message::Binary(data)) => {
                if let Err(e) = frame::validate(&data) {
                    tracing::warn!(connection_id = %id, error = %e, "Discarding invalid frame");
                    metrics::record_ws_frame("rejected");
                    continue;
                }
                if queue.send(data).await.is_err() {
                    return;
                }
            }
            Ok(Message::Text(_)) => {
                tracing::warn!(connection_id = %id, "Discarding text message");
                metrics::record_ws_frame("rejected");
            }
            Ok(Message::Close(close)) => break ReadEnd::Closed(close.map(|c| c.code)),
            // Pings are answered by the transport.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => break ReadEnd::Failed(e),
        }
    };

    let _ = errors.send(end).await;
}

impl Session {
    fn transition(&mut self, next: SessionState) {
        if self.state != next && self.state != SessionState::Closed {
            tracing::trace!(connection_id = %self.id, from = ?self.state, to = ?next, "Session state");
            self.state = next;
        }
    }

    /// Dispatch one queued frame. Errors are only returned for failed writes.
    async fn handle_frame(&mut self, raw: Bytes) -> Result<(), axum::Error> {
        self.transition(SessionState::Processing);

        let envelope = match frame::decode(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(connection_id = %self.id, error = %e, "Dropping malformed frame");
                metrics::record_ws_frame("rejected");
                self.transition(SessionState::Open);
                return Ok(());
            }
        };

        let reply = match self.gateway.call_envelope(&self.cancel, &envelope).await {
            Ok(reply) => {
                metrics::record_ws_frame("ok");
                Some(reply)
            }
            Err(GatewayError::Cancelled) => None,
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.id,
                    service = %envelope.service,
                    method = %envelope.method,
                    error = %e,
                    "Dropping frame"
                );
                metrics::record_ws_frame("failed");
                self.send_error_frames.then(|| envelope.error_reply(e.to_string()))
            }
        };

        let result = match reply.map(|message| frame::encode(&message)) {
            Some(Ok(bytes)) => self.write(Message::Binary(bytes)).await,
            Some(Err(e)) => {
                tracing::warn!(connection_id = %self.id, error = %e, "Failed to encode reply");
                Ok(())
            }
            None => Ok(()),
        };

        self.transition(SessionState::Open);
        result
    }

    async fn write(&mut self, message: Message) -> Result<(), axum::Error> {
        match time::timeout(self.write_deadline, self.sink.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(axum::Error::new(format!(
                "write deadline of {:?} exceeded",
                self.write_deadline
            ))),
        }
    }

    /// Normal-closure frame, bounded by the close deadline.
    async fn send_close(&mut self) {
        self.transition(SessionState::Closing);
        let close = Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: Utf8Bytes::from_static("server shutdown"),
        }));
        if time::timeout(self.close_deadline, self.sink.send(close)).await.is_err() {
            tracing::debug!(connection_id = %self.id, "Close frame not delivered before deadline");
        }
    }

    async fn close(&mut self) {
        let _ = time::timeout(self.close_deadline, self.sink.close()).await;
        self.transition(SessionState::Closed);
    }
}
