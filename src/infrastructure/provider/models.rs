//! Call Automation REST wire models (camelCase JSON)

use crate::domain::shared::value_objects::Identifier;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneNumberModel {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationIdentifierModel {
    pub raw_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<PhoneNumberModel>,
}

impl From<&Identifier> for CommunicationIdentifierModel {
    fn from(identifier: &Identifier) -> Self {
        match identifier.phone() {
            Some(number) => Self {
                raw_id: identifier.raw_id(),
                kind: Some("phoneNumber".to_string()),
                phone_number: Some(PhoneNumberModel {
                    value: number.to_string(),
                }),
            },
            None => Self {
                raw_id: identifier.raw_id(),
                kind: None,
                phone_number: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequestModel {
    pub targets: Vec<CommunicationIdentifierModel>,
    pub source_caller_id_number: PhoneNumberModel,
    pub callback_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCallRequestModel {
    pub incoming_call_context: String,
    pub callback_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectCallRequestModel {
    pub incoming_call_context: String,
    pub call_reject_reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectCallRequestModel {
    pub incoming_call_context: String,
    pub target: CommunicationIdentifierModel,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferToParticipantRequestModel {
    pub target_participant: CommunicationIdentifierModel,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipantRequestModel {
    pub participant_to_add: CommunicationIdentifierModel,
    pub source_caller_id_number: PhoneNumberModel,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLocatorModel {
    pub kind: String,
    pub server_call_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRecordingRequestModel {
    pub call_locator: CallLocatorModel,
}

#[derive(Debug, Serialize)]
pub struct FileSourceModel {
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub struct PlaySourceModel {
    pub kind: String,
    pub file: FileSourceModel,
}

impl PlaySourceModel {
    pub fn file(uri: &str) -> Self {
        Self {
            kind: "file".to_string(),
            file: FileSourceModel {
                uri: uri.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequestModel {
    pub play_sources: Vec<PlaySourceModel>,
    /// Empty means every participant
    pub play_to: Vec<CommunicationIdentifierModel>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DtmfOptionsModel {
    pub max_tones_to_collect: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeOptionsModel {
    pub interrupt_prompt: bool,
    pub initial_silence_timeout_in_seconds: u64,
    pub target_participant: CommunicationIdentifierModel,
    pub dtmf_options: DtmfOptionsModel,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeRequestModel {
    pub recognize_input_type: String,
    pub play_prompt: PlaySourceModel,
    pub interrupt_call_media_operation: bool,
    pub recognize_options: RecognizeOptionsModel,
}

#[derive(Debug, Serialize)]
pub struct EmptyRequestModel {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallConnectionPropertiesModel {
    pub call_connection_id: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub server_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStateResponseModel {
    pub recording_id: String,
}

/// Error body: `{"error":{"code":..,"message":..}}`
#[derive(Debug, Deserialize)]
pub struct ErrorResponseModel {
    pub error: ErrorDetailModel,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetailModel {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
