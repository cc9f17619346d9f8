//! WebSocket subsystem.
//!
//! # Data Flow
//! ```text
//! GET /ws upgrade (server.rs)
//!     → session.rs: register in clients.rs, spawn reader
//!     → reader: frame.rs validate → bounded queue (backpressure)
//!     → dispatcher: frame.rs decode → Gateway::call_envelope → frame.rs encode
//!     → single binary reply frame
//!
//! Fan-out:
//!     Gateway::broadcast / Gateway::shutdown → clients.rs → session outbound queue
//! ```
//!
//! # Design Decisions
//! - Frames are processed strictly in arrival order, one at a time
//! - Cancellation granularity is the connection, not the message
//! - Error replies are opt-in (`websocket.send_error_frames`)

pub mod clients;
pub mod frame;
pub mod server;
pub mod session;

pub use clients::{ClientRegistry, ConnectionId, Outbound};
pub use frame::{FrameError, WsMessage};
pub use server::WebSocketServer;
pub use session::SessionState;
