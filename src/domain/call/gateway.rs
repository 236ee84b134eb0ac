//! Provider gateway interface
//!
//! Defined in the domain layer as a trait (port) and implemented by the
//! provider adapter in the infrastructure layer. Every operation is a remote
//! call; handlers only suspend at these boundaries.

use crate::domain::call::value_object::RejectReason;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{
    CallConnectionId, CorrelationId, Identifier, RecordingId, ServerCallId,
};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Handles of a call leg created or answered through the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallConnectionProperties {
    pub call_connection_id: CallConnectionId,
    pub correlation_id: CorrelationId,
    pub server_call_id: Option<ServerCallId>,
}

/// Outbound call request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCallRequest {
    pub target: Identifier,
    pub source_caller_id: Identifier,
    pub callback_uri: String,
}

/// DTMF recognition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeDtmfRequest {
    pub target: Identifier,
    pub prompt_uri: String,
    /// Let the caller barge in over the prompt
    pub interrupt_prompt: bool,
    pub initial_silence_timeout: Duration,
    pub max_tones: u8,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn create_call(&self, request: CreateCallRequest) -> Result<CallConnectionProperties>;

    async fn answer_call(
        &self,
        incoming_call_context: &str,
        callback_uri: &str,
    ) -> Result<CallConnectionProperties>;

    async fn reject_call(&self, incoming_call_context: &str, reason: RejectReason) -> Result<()>;

    async fn redirect_call(&self, incoming_call_context: &str, target: &Identifier) -> Result<()>;

    async fn transfer_call(&self, call: &CallConnectionId, target: &Identifier) -> Result<()>;

    async fn add_participant(
        &self,
        call: &CallConnectionId,
        participant: &Identifier,
        source_caller_id: &Identifier,
    ) -> Result<()>;

    async fn start_recording(&self, server_call_id: &ServerCallId) -> Result<RecordingId>;

    async fn stop_recording(&self, recording_id: &RecordingId) -> Result<()>;

    async fn start_recognizing(
        &self,
        call: &CallConnectionId,
        request: RecognizeDtmfRequest,
    ) -> Result<()>;

    async fn play_to_all(&self, call: &CallConnectionId, prompt_uri: &str) -> Result<()>;

    async fn hang_up(&self, call: &CallConnectionId, for_everyone: bool) -> Result<()>;

    /// Download a recording chunk; returns the number of bytes written
    async fn download_recording(&self, content_location: &str, destination: &Path) -> Result<u64>;
}
