//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! WebSocket dispatch for service S:
//!     → circuit_breaker.rs (fail fast while S's circuit is open)
//!     → Dispatcher (deadline, cancellation)
//!     → outcome recorded against S's circuit
//! ```
//!
//! # Design Decisions
//! - The breaker is an optional strategy chosen at gateway construction
//! - No retries: a failed call is reported, never replayed

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitState, ConsecutiveFailureBreaker};
