//! API interface implementations

pub mod dto;
pub mod metrics_handler;
pub mod operator_handler;
pub mod router;
pub mod state;
pub mod webhook_handler;

pub use dto::{ApiError, ApiResponse, ValidationResponse};
pub use metrics_handler::init_metrics;
pub use router::build_router;
pub use state::AppState;
