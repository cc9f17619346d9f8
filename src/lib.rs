//! Game backend protocol gateway.
//!
//! Bridges client traffic (JSON over HTTP, length-prefixed protobuf frames
//! over WebSocket) to backend gRPC services discovered through a registry.
//!
//! ```text
//!   HTTP /api/{service}/{method}          WebSocket /ws
//!            │                                  │
//!            ▼                                  ▼
//!     http::server                      websocket::session
//!   (JSON → message)                  (frame → envelope)
//!            │                                  │
//!            └──────────────┬───────────────────┘
//!                           ▼
//!                    gateway::Gateway
//!   registry (discover) → load_balancer (select) → pool (connection)
//!   schema (resolve)    → rpc (dispatch)         → resilience (breaker)
//!                           │
//!                           ▼
//!                   backend gRPC instance
//! ```

// Core subsystems
pub mod config;
pub mod gateway;
pub mod http;
pub mod websocket;

// Backend access
pub mod load_balancer;
pub mod pool;
pub mod registry;
pub mod rpc;
pub mod schema;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use websocket::WebSocketServer;
