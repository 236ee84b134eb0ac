//! Application layer - Use cases and application services
//!
//! This layer orchestrates domain objects to fulfill use cases.
//! It's responsible for:
//! - Routing webhook events to the per-call session and IVR machine
//! - Operator actions on pending and active calls
//! - Converting between domain models and DTOs

pub mod call_service;

pub use call_service::{
    CallFlowService, CallFlowSettings, CallSummary, CallbackRoute, DeliveryReport, DownloadSummary,
};
