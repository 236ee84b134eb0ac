//! Domain layer - Core call-flow rules
//!
//! This layer contains:
//! - The call session aggregate and its phases
//! - Normalized call events
//! - The provider gateway port
//! - The IVR state machine

pub mod call;
pub mod ivr;
pub mod shared;

// Re-export commonly used types
pub use shared::{DomainError, Result};
