//! Message schema subsystem.
//!
//! # Data Flow
//! ```text
//! FileDescriptorSet (built with the backend protos)
//!     → resolver.rs SchemaRegistry (index "service.method" → method)
//!     → ResolvedMethod::new_request() (empty DynamicMessage)
//!     → convert.rs json_to_message (strict decode, then field-by-field)
//! ```
//!
//! # Design Decisions
//! - Types are resolved at runtime from descriptors, no generated code
//! - The registry is built once at startup and shared read-only

pub mod convert;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod resolver;

pub use convert::json_to_message;
pub use resolver::{ResolvedMethod, SchemaRegistry};
