//! Shared handler state

use crate::application::CallFlowService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CallFlowService>,
}

impl AppState {
    pub fn new(service: Arc<CallFlowService>) -> Self {
        Self { service }
    }
}
