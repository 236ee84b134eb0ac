//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use callflow::application::{CallFlowService, CallFlowSettings};
use callflow::domain::call::gateway::{
    CallConnectionProperties, CreateCallRequest, ProviderGateway, RecognizeDtmfRequest,
};
use callflow::domain::call::value_object::RejectReason;
use callflow::domain::ivr::machine::RecognitionSettings;
use callflow::domain::shared::error::ProviderError;
use callflow::domain::shared::value_objects::{
    CallConnectionId, CorrelationId, Identifier, RecordingId, ServerCallId,
};
use callflow::infrastructure::session_store::SessionStore;
use callflow::interface::api::{build_router, AppState};
use callflow::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const CALLBACK_BASE: &str = "https://ivr.example.com";
pub const SOURCE_NUMBER: &str = "+18005550100";
pub const TARGET_NUMBER: &str = "+14255550199";
pub const PARTICIPANT_NUMBER: &str = "+14255550123";

/// A gateway command as seen by the fake provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateCall {
        target: String,
        callback_uri: String,
    },
    AnswerCall {
        context: String,
        callback_uri: String,
    },
    RejectCall {
        context: String,
        reason: RejectReason,
    },
    RedirectCall {
        context: String,
        target: String,
    },
    TransferCall {
        call: String,
        target: String,
    },
    AddParticipant {
        call: String,
        participant: String,
        source: String,
    },
    StartRecording {
        server_call_id: String,
    },
    StopRecording {
        recording_id: String,
    },
    Recognize {
        call: String,
        target: String,
        prompt_uri: String,
        initial_silence_secs: u64,
        max_tones: u8,
        interrupt_prompt: bool,
    },
    Play {
        call: String,
        prompt_uri: String,
    },
    HangUp {
        call: String,
        for_everyone: bool,
    },
    Download {
        location: String,
        destination: PathBuf,
    },
}

impl Command {
    /// Call connection the command addresses, if any
    pub fn call(&self) -> Option<&str> {
        match self {
            Command::TransferCall { call, .. }
            | Command::AddParticipant { call, .. }
            | Command::Recognize { call, .. }
            | Command::Play { call, .. }
            | Command::HangUp { call, .. } => Some(call.as_str()),
            _ => None,
        }
    }
}

/// Provider fake that records every command and answers with canned handles
#[derive(Default)]
pub struct FakeGateway {
    commands: Mutex<Vec<Command>>,
    /// incoming call context -> (correlation id, call connection id)
    answers: Mutex<HashMap<String, (String, String)>>,
    outbound: Mutex<Option<CallConnectionProperties>>,
    fail_stop_recording: AtomicBool,
    fail_hang_up: AtomicBool,
    /// Yield to the scheduler inside every command
    interleave: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_answer(&self, context: &str, correlation_id: &str, call_connection_id: &str) {
        self.answers.lock().unwrap().insert(
            context.to_string(),
            (correlation_id.to_string(), call_connection_id.to_string()),
        );
    }

    pub fn on_create(&self, correlation_id: &str, call_connection_id: &str) {
        *self.outbound.lock().unwrap() = Some(CallConnectionProperties {
            call_connection_id: CallConnectionId::new(call_connection_id),
            correlation_id: CorrelationId::new(correlation_id),
            server_call_id: None,
        });
    }

    pub fn fail_stop_recording(&self) {
        self.fail_stop_recording.store(true, Ordering::SeqCst);
    }

    pub fn fail_hang_up(&self, fail: bool) {
        self.fail_hang_up.store(fail, Ordering::SeqCst);
    }

    pub fn interleave(&self) {
        self.interleave.store(true, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    /// Commands addressing one call connection or its recording
    pub fn commands_for(&self, call: &str, server_call_id: &str) -> Vec<Command> {
        let recording_id = recording_id_for(server_call_id);
        self.commands()
            .into_iter()
            .filter(|command| match command {
                Command::StartRecording { server_call_id: id } => id == server_call_id,
                Command::StopRecording { recording_id: id } => *id == recording_id,
                other => other.call() == Some(call),
            })
            .collect()
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }

    async fn record(&self, command: Command) {
        if self.interleave.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        self.commands.lock().unwrap().push(command);
    }
}

pub fn recording_id_for(server_call_id: &str) -> String {
    format!("rec-{server_call_id}")
}

#[async_trait]
impl ProviderGateway for FakeGateway {
    async fn create_call(&self, request: CreateCallRequest) -> Result<CallConnectionProperties> {
        self.record(Command::CreateCall {
            target: request.target.raw_id(),
            callback_uri: request.callback_uri,
        })
        .await;
        let outbound = self.outbound.lock().unwrap().clone();
        outbound.ok_or_else(|| {
            ProviderError::Rejected {
                status: 500,
                message: "no outbound call configured".to_string(),
            }
            .into()
        })
    }

    async fn answer_call(
        &self,
        incoming_call_context: &str,
        callback_uri: &str,
    ) -> Result<CallConnectionProperties> {
        self.record(Command::AnswerCall {
            context: incoming_call_context.to_string(),
            callback_uri: callback_uri.to_string(),
        })
        .await;
        let answer = self
            .answers
            .lock()
            .unwrap()
            .get(incoming_call_context)
            .cloned();
        let (correlation_id, call_connection_id) = answer.ok_or_else(|| ProviderError::Rejected {
            status: 400,
            message: "unknown incoming call context".to_string(),
        })?;
        Ok(CallConnectionProperties {
            call_connection_id: CallConnectionId::new(call_connection_id),
            correlation_id: CorrelationId::new(correlation_id),
            server_call_id: None,
        })
    }

    async fn reject_call(&self, incoming_call_context: &str, reason: RejectReason) -> Result<()> {
        self.record(Command::RejectCall {
            context: incoming_call_context.to_string(),
            reason,
        })
        .await;
        Ok(())
    }

    async fn redirect_call(&self, incoming_call_context: &str, target: &Identifier) -> Result<()> {
        self.record(Command::RedirectCall {
            context: incoming_call_context.to_string(),
            target: target.raw_id(),
        })
        .await;
        Ok(())
    }

    async fn transfer_call(&self, call: &CallConnectionId, target: &Identifier) -> Result<()> {
        self.record(Command::TransferCall {
            call: call.to_string(),
            target: target.raw_id(),
        })
        .await;
        Ok(())
    }

    async fn add_participant(
        &self,
        call: &CallConnectionId,
        participant: &Identifier,
        source_caller_id: &Identifier,
    ) -> Result<()> {
        self.record(Command::AddParticipant {
            call: call.to_string(),
            participant: participant.raw_id(),
            source: source_caller_id.raw_id(),
        })
        .await;
        Ok(())
    }

    async fn start_recording(&self, server_call_id: &ServerCallId) -> Result<RecordingId> {
        self.record(Command::StartRecording {
            server_call_id: server_call_id.to_string(),
        })
        .await;
        Ok(RecordingId::new(recording_id_for(server_call_id.as_str())))
    }

    async fn stop_recording(&self, recording_id: &RecordingId) -> Result<()> {
        self.record(Command::StopRecording {
            recording_id: recording_id.to_string(),
        })
        .await;
        if self.fail_stop_recording.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected {
                status: 404,
                message: "recording not found".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn start_recognizing(
        &self,
        call: &CallConnectionId,
        request: RecognizeDtmfRequest,
    ) -> Result<()> {
        self.record(Command::Recognize {
            call: call.to_string(),
            target: request.target.raw_id(),
            prompt_uri: request.prompt_uri,
            initial_silence_secs: request.initial_silence_timeout.as_secs(),
            max_tones: request.max_tones,
            interrupt_prompt: request.interrupt_prompt,
        })
        .await;
        Ok(())
    }

    async fn play_to_all(&self, call: &CallConnectionId, prompt_uri: &str) -> Result<()> {
        self.record(Command::Play {
            call: call.to_string(),
            prompt_uri: prompt_uri.to_string(),
        })
        .await;
        Ok(())
    }

    async fn hang_up(&self, call: &CallConnectionId, for_everyone: bool) -> Result<()> {
        self.record(Command::HangUp {
            call: call.to_string(),
            for_everyone,
        })
        .await;
        if self.fail_hang_up.load(Ordering::SeqCst) {
            return Err(ProviderError::Transport("connection reset".to_string()).into());
        }
        Ok(())
    }

    async fn download_recording(&self, content_location: &str, destination: &Path) -> Result<u64> {
        self.record(Command::Download {
            location: content_location.to_string(),
            destination: destination.to_path_buf(),
        })
        .await;
        Ok(4096)
    }
}

pub fn settings() -> CallFlowSettings {
    CallFlowSettings {
        source: Identifier::phone_number(SOURCE_NUMBER),
        target: Identifier::phone_number(TARGET_NUMBER),
        participant: Some(Identifier::phone_number(PARTICIPANT_NUMBER)),
        callback_base_url: CALLBACK_BASE.to_string(),
        download_path: PathBuf::from("testfile.wav"),
        recognition: RecognitionSettings::default(),
    }
}

pub fn service(gateway: Arc<FakeGateway>) -> Arc<CallFlowService> {
    Arc::new(CallFlowService::new(
        gateway,
        Arc::new(SessionStore::new()),
        settings(),
    ))
}

pub fn router(service: Arc<CallFlowService>, audio_dir: &Path) -> axum::Router {
    build_router(AppState::new(service), None, audio_dir)
}

pub fn prompt_uri(file: &str) -> String {
    format!("{CALLBACK_BASE}/audio/{file}")
}

// Webhook payloads

pub fn validation_event(code: &str) -> Value {
    json!({
        "id": "2d1781af-3a4c-4d7c-bd0c-e34b19da4e66",
        "eventType": "Microsoft.EventGrid.SubscriptionValidationEvent",
        "subject": "",
        "data": { "validationCode": code },
        "eventTime": "2026-10-18T09:30:00Z",
        "dataVersion": "2"
    })
}

pub fn incoming_call_event(correlation_id: &str, context: &str, caller: &str) -> Value {
    json!({
        "id": format!("incoming-{correlation_id}"),
        "eventType": "Microsoft.Communication.IncomingCall",
        "subject": format!("/caller/{caller}/recipient/{SOURCE_NUMBER}"),
        "data": {
            "to": { "kind": "phoneNumber", "rawId": format!("4:{SOURCE_NUMBER}") },
            "from": { "kind": "phoneNumber", "rawId": format!("4:{caller}") },
            "serverCallId": format!("server-{correlation_id}"),
            "callerDisplayName": "",
            "incomingCallContext": context,
            "correlationId": correlation_id
        },
        "eventTime": "2026-10-18T09:30:00Z"
    })
}

pub fn recording_status_event(server_call_id: &str, location: &str) -> Value {
    json!({
        "id": format!("recording-{server_call_id}"),
        "eventType": "Microsoft.Communication.RecordingFileStatusUpdated",
        "subject": format!("/recording/call/call-1/serverCallId/{server_call_id}"),
        "data": {
            "recordingStorageInfo": {
                "recordingChunks": [
                    {
                        "documentId": "doc-1",
                        "index": 0,
                        "endReason": "SessionEnded",
                        "contentLocation": location,
                        "metadataLocation": format!("{location}/metadata")
                    }
                ]
            },
            "recordingStartTime": "2026-10-18T09:30:00Z",
            "recordingDurationMs": 4000
        },
        "eventTime": "2026-10-18T09:31:00Z"
    })
}

/// CloudEvents call-automation event for `call` (correlation id, connection id, server call id)
pub fn call_event(kind: &str, call: (&str, &str, &str), extra: Value) -> Value {
    let (correlation_id, call_connection_id, server_call_id) = call;
    let mut data = json!({
        "callConnectionId": call_connection_id,
        "serverCallId": server_call_id,
        "correlationId": correlation_id
    });
    if let (Some(data), Value::Object(extra)) = (data.as_object_mut(), extra) {
        data.extend(extra);
    }
    json!({
        "id": format!("{kind}-{correlation_id}"),
        "source": format!("calling/callConnections/{call_connection_id}"),
        "type": format!("Microsoft.Communication.{kind}"),
        "data": data,
        "time": "2026-10-18T09:30:00Z",
        "specversion": "1.0",
        "datacontenttype": "application/json",
        "subject": format!("calling/callConnections/{call_connection_id}")
    })
}

pub fn recognize_completed(call: (&str, &str, &str), tones: &[&str]) -> Value {
    call_event(
        "RecognizeCompleted",
        call,
        json!({
            "recognitionType": "dtmf",
            "dtmfResult": { "tones": tones },
            "resultInformation": { "code": 200, "subCode": 8531, "message": "Action completed, max digits received." }
        }),
    )
}

pub fn recognize_failed(call: (&str, &str, &str), sub_code: u32) -> Value {
    call_event(
        "RecognizeFailed",
        call,
        json!({
            "resultInformation": { "code": 400, "subCode": sub_code, "message": "Recognition failed." }
        }),
    )
}

pub fn play_failed(call: (&str, &str, &str)) -> Value {
    call_event(
        "PlayFailed",
        call,
        json!({
            "resultInformation": { "code": 400, "subCode": 8535, "message": "Action failed, file format is invalid." }
        }),
    )
}

pub fn batch(entries: &[Value]) -> Vec<u8> {
    serde_json::to_vec(&Value::Array(entries.to_vec())).unwrap()
}
