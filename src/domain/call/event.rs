//! Normalized call events
//!
//! Webhook envelopes from the provider are decoded into these types before
//! they reach the IVR state machine.

use crate::domain::call::value_object::RecognizeFailureReason;
use crate::domain::shared::value_objects::{
    CallConnectionId, CorrelationId, Identifier, ServerCallId,
};
use serde::{Deserialize, Serialize};

/// Identifiers carried by every mid-call event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallIds {
    pub call_connection_id: CallConnectionId,
    pub correlation_id: CorrelationId,
    pub server_call_id: Option<ServerCallId>,
}

/// An inbound call offered to the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingCallOffer {
    pub correlation_id: CorrelationId,
    pub server_call_id: Option<ServerCallId>,
    pub caller: Identifier,
    pub incoming_call_context: String,
}

/// Storage notification for a finished recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingFileStatus {
    pub server_call_id: Option<ServerCallId>,
    pub content_location: String,
}

/// Mid-call event kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressKind {
    CallConnected,
    CallDisconnected,
    /// Collected tones as keypad characters, e.g. `"1"`
    RecognizeCompleted { tones: String },
    RecognizeFailed { reason: RecognizeFailureReason },
    PlayCompleted,
    PlayFailed { sub_code: Option<u32> },
    /// Event kinds the IVR flow does not act on
    Other(String),
}

impl ProgressKind {
    pub fn name(&self) -> &str {
        match self {
            ProgressKind::CallConnected => "CallConnected",
            ProgressKind::CallDisconnected => "CallDisconnected",
            ProgressKind::RecognizeCompleted { .. } => "RecognizeCompleted",
            ProgressKind::RecognizeFailed { .. } => "RecognizeFailed",
            ProgressKind::PlayCompleted => "PlayCompleted",
            ProgressKind::PlayFailed { .. } => "PlayFailed",
            ProgressKind::Other(kind) => kind,
        }
    }
}

/// A call-automation event for an existing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub ids: CallIds,
    pub kind: ProgressKind,
}

/// Union of all normalized webhook events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallEvent {
    /// Subscription handshake; the code must be echoed back verbatim
    ValidationChallenge { code: String },
    IncomingCall(IncomingCallOffer),
    RecordingFileStatus(RecordingFileStatus),
    Progress(ProgressEvent),
}

impl CallEvent {
    pub fn event_type(&self) -> &str {
        match self {
            CallEvent::ValidationChallenge { .. } => "SubscriptionValidation",
            CallEvent::IncomingCall(_) => "IncomingCall",
            CallEvent::RecordingFileStatus(_) => "RecordingFileStatusUpdated",
            CallEvent::Progress(event) => event.kind.name(),
        }
    }

    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            CallEvent::IncomingCall(offer) => Some(&offer.correlation_id),
            CallEvent::Progress(event) => Some(&event.ids.correlation_id),
            CallEvent::ValidationChallenge { .. } | CallEvent::RecordingFileStatus(_) => None,
        }
    }
}
