//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Webhook envelope decoding
//! - The provider gateway adapter
//! - The in-memory session store
//! - Metric recording helpers

pub mod events;
pub mod provider;
pub mod session_store;
pub mod telemetry;
