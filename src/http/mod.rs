//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (request ID set, span created)
//!     → server.rs api_handler (/api/{service}/{*path})
//!         → Gateway::acquire (discover, select, pooled connection)
//!         → SchemaRegistry::resolve + json_to_message
//!         → Gateway::dispatch
//!     → JSON response (200) or GatewayError status (503 / 500)
//! ```

pub mod request;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
