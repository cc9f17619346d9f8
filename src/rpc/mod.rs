//! Backend RPC subsystem.
//!
//! # Data Flow
//! ```text
//! ResolvedMethod + DynamicMessage request
//!     → dispatcher.rs (type check, cancellation, optional deadline)
//!     → RpcConnection::invoke
//!     → grpc.rs (tonic unary call, DynamicCodec)
//!     → DynamicMessage response | tonic::Status
//! ```

pub mod dispatcher;
pub mod grpc;

pub use dispatcher::Dispatcher;
pub use grpc::{DynamicCodec, GrpcConnection, GrpcConnector};
