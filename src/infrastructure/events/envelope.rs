//! Webhook envelope decoding
//!
//! Two envelope shapes arrive from the provider:
//! - Event Grid notifications (`eventType`) for subscription validation,
//!   incoming calls and recording storage updates;
//! - CloudEvents (`type`) for call-automation progress events.
//!
//! Each entry is decoded on its own so one malformed entry never discards the
//! rest of the delivery.

use crate::domain::call::event::{
    CallEvent, CallIds, IncomingCallOffer, ProgressEvent, ProgressKind, RecordingFileStatus,
};
use crate::domain::call::value_object::RecognizeFailureReason;
use crate::domain::ivr::dtmf::tones_to_string;
use crate::domain::shared::error::DecodeError;
use crate::domain::shared::value_objects::{
    CallConnectionId, CorrelationId, Identifier, ServerCallId,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

const SUBSCRIPTION_VALIDATION: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";
const COMMUNICATION_PREFIX: &str = "Microsoft.Communication.";

/// Events and per-entry errors of one webhook delivery
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub events: Vec<CallEvent>,
    pub errors: Vec<DecodeError>,
}

impl DecodedBatch {
    /// First subscription-validation code in the delivery, if any
    pub fn validation_code(&self) -> Option<&str> {
        self.events.iter().find_map(|event| match event {
            CallEvent::ValidationChallenge { code } => Some(code.as_str()),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.errors.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventGridEnvelope {
    event_type: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct CloudEventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationData {
    validation_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifierData {
    raw_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingCallData {
    from: IdentifierData,
    incoming_call_context: String,
    correlation_id: String,
    #[serde(default)]
    server_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingChunk {
    content_location: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingStorageInfo {
    recording_chunks: Vec<RecordingChunk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingFileStatusData {
    recording_storage_info: RecordingStorageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultInformation {
    #[serde(default)]
    sub_code: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DtmfResult {
    #[serde(default)]
    tones: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallAutomationData {
    call_connection_id: String,
    correlation_id: String,
    #[serde(default)]
    server_call_id: Option<String>,
    #[serde(default)]
    result_information: Option<ResultInformation>,
    #[serde(default)]
    dtmf_result: Option<DtmfResult>,
}

/// Decode an Event Grid delivery (incoming call, recording status, validation)
pub fn decode_event_grid(body: &[u8]) -> DecodedBatch {
    decode_batch(body, decode_event_grid_entry)
}

/// Decode a CloudEvents delivery of call-automation events
pub fn decode_cloud_events(body: &[u8]) -> DecodedBatch {
    decode_batch(body, decode_cloud_event_entry)
}

fn decode_batch(body: &[u8], decode_entry: fn(Value) -> Result<CallEvent, String>) -> DecodedBatch {
    let mut batch = DecodedBatch::default();

    let entries = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(entries)) => entries,
        // Some senders post a single envelope instead of an array
        Ok(entry @ Value::Object(_)) => vec![entry],
        Ok(_) => {
            batch
                .errors
                .push(DecodeError::delivery("expected a JSON array of envelopes"));
            return batch;
        }
        Err(e) => {
            batch
                .errors
                .push(DecodeError::delivery(format!("invalid JSON: {e}")));
            return batch;
        }
    };

    for (index, entry) in entries.into_iter().enumerate() {
        match decode_entry(entry) {
            Ok(event) => batch.events.push(event),
            Err(reason) => batch.errors.push(DecodeError::entry(index, reason)),
        }
    }

    batch
}

fn decode_event_grid_entry(entry: Value) -> Result<CallEvent, String> {
    let envelope: EventGridEnvelope = parse("envelope", entry)?;

    if envelope.event_type == SUBSCRIPTION_VALIDATION {
        let data: ValidationData = parse(&envelope.event_type, envelope.data)?;
        return Ok(CallEvent::ValidationChallenge {
            code: data.validation_code,
        });
    }

    match communication_kind(&envelope.event_type) {
        Some("IncomingCall") => {
            let data: IncomingCallData = parse(&envelope.event_type, envelope.data)?;
            Ok(CallEvent::IncomingCall(IncomingCallOffer {
                correlation_id: CorrelationId::new(data.correlation_id),
                server_call_id: data.server_call_id.map(ServerCallId::new),
                caller: Identifier::from_raw_id(&data.from.raw_id),
                incoming_call_context: data.incoming_call_context,
            }))
        }
        Some("RecordingFileStatusUpdated") => {
            let data: RecordingFileStatusData = parse(&envelope.event_type, envelope.data)?;
            let chunk = data
                .recording_storage_info
                .recording_chunks
                .into_iter()
                .next()
                .ok_or_else(|| "recording status without chunks".to_string())?;
            Ok(CallEvent::RecordingFileStatus(RecordingFileStatus {
                server_call_id: envelope
                    .subject
                    .as_deref()
                    .and_then(server_call_id_from_subject),
                content_location: chunk.content_location,
            }))
        }
        _ => Err(format!("unsupported event type '{}'", envelope.event_type)),
    }
}

fn decode_cloud_event_entry(entry: Value) -> Result<CallEvent, String> {
    let envelope: CloudEventEnvelope = parse("cloud event", entry)?;
    let kind_name = communication_kind(&envelope.event_type)
        .ok_or_else(|| format!("unsupported event type '{}'", envelope.event_type))?
        .to_string();

    let data: CallAutomationData = parse(&envelope.event_type, envelope.data)?;
    let sub_code = data
        .result_information
        .as_ref()
        .and_then(|info| info.sub_code);

    let kind = match kind_name.as_str() {
        "CallConnected" => ProgressKind::CallConnected,
        "CallDisconnected" => ProgressKind::CallDisconnected,
        "RecognizeCompleted" => {
            let tones = data.dtmf_result.map(|result| result.tones).unwrap_or_default();
            ProgressKind::RecognizeCompleted {
                tones: tones_to_string(&tones),
            }
        }
        "RecognizeFailed" => {
            let code = sub_code.ok_or_else(|| "RecognizeFailed without a sub-code".to_string())?;
            ProgressKind::RecognizeFailed {
                reason: RecognizeFailureReason::from_sub_code(code),
            }
        }
        "PlayCompleted" => ProgressKind::PlayCompleted,
        "PlayFailed" => ProgressKind::PlayFailed { sub_code },
        _ => ProgressKind::Other(kind_name),
    };

    Ok(CallEvent::Progress(ProgressEvent {
        ids: CallIds {
            call_connection_id: CallConnectionId::new(data.call_connection_id),
            correlation_id: CorrelationId::new(data.correlation_id),
            server_call_id: data.server_call_id.map(ServerCallId::new),
        },
        kind,
    }))
}

fn communication_kind(event_type: &str) -> Option<&str> {
    event_type
        .strip_prefix(COMMUNICATION_PREFIX)
        .filter(|kind| !kind.is_empty())
}

/// Recording subjects look like `/recording/call/{callId}/serverCallId/{serverCallId}`
fn server_call_id_from_subject(subject: &str) -> Option<ServerCallId> {
    let mut segments = subject.split('/');
    segments
        .by_ref()
        .find(|segment| *segment == "serverCallId")?;
    segments
        .next()
        .filter(|id| !id.is_empty())
        .map(ServerCallId::new)
}

fn parse<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| format!("malformed {what}: {e}"))
}
