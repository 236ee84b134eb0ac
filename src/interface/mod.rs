//! Interface layer - External interfaces
//!
//! This layer handles:
//! - Provider webhook endpoints
//! - Operator REST endpoints
//! - Request/response formatting

pub mod api;
