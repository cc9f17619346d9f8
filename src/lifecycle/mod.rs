//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config (already validated) → Metrics → Schemas → Registry → Gateway → Listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Close sessions → Close pools → Deregister
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Background workers hold cancellation tokens derived from one coordinator
//! - Session close is bounded by a deadline; no waiting on client acknowledgment

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
