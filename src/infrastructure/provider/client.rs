//! Call Automation REST client implementing the provider gateway

use super::auth::{ConnectionString, RequestSigner};
use super::models::*;
use crate::config::ProviderConfig;
use crate::domain::call::gateway::{
    CallConnectionProperties, CreateCallRequest, ProviderGateway, RecognizeDtmfRequest,
};
use crate::domain::call::value_object::RejectReason;
use crate::domain::shared::error::{DomainError, ProviderError};
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{
    CallConnectionId, CorrelationId, Identifier, RecordingId, ServerCallId,
};
use crate::infrastructure::telemetry;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

const REPEATABILITY_REQUEST_ID: &str = "repeatability-request-id";
const REPEATABILITY_FIRST_SENT: &str = "repeatability-first-sent";

pub struct AcsGateway {
    client: Client,
    endpoint: Url,
    api_version: String,
    signer: RequestSigner,
}

impl AcsGateway {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let connection = ConnectionString::parse(&config.connection_string)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {e}")))?;

        info!("Provider gateway targeting {}", connection.endpoint);

        Ok(Self {
            client,
            signer: RequestSigner::new(&connection),
            endpoint: connection.endpoint,
            api_version: config.api_version.clone(),
        })
    }

    /// Versioned API url under the resource endpoint
    fn url(&self, segments: &[&str]) -> std::result::Result<Url, ProviderError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Configuration("endpoint cannot be a base url".to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn call_url(&self, call: &CallConnectionId, action: &str) -> std::result::Result<Url, ProviderError> {
        let resource = format!("{}{}", call.as_str(), action);
        self.url(&["calling", "callConnections", &resource])
    }

    async fn execute(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> std::result::Result<Response, ProviderError> {
        let payload = body.as_deref().unwrap_or_default();
        let headers = self.signer.sign(method.as_str(), &url, payload, Utc::now())?;

        let mut request = self.client.request(method.clone(), url.clone());
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .header(REPEATABILITY_REQUEST_ID, uuid::Uuid::new_v4().to_string())
                .header(
                    REPEATABILITY_FIRST_SENT,
                    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
                )
                .body(body);
        }

        debug!("{} {} ({})", method, url.path(), operation);
        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                telemetry::record_provider_request(operation, "transport_error", started.elapsed());
                warn!("Provider {} failed: {}", operation, e);
                return Err(ProviderError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        if status.is_success() {
            telemetry::record_provider_request(operation, "success", started.elapsed());
            return Ok(response);
        }

        telemetry::record_provider_request(operation, "rejected", started.elapsed());
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponseModel>(&text)
            .ok()
            .and_then(|e| match (e.error.code, e.error.message) {
                (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                (None, Some(message)) => Some(message),
                (code, None) => code,
            })
            .unwrap_or(text);
        warn!("Provider {} rejected with {}: {}", operation, status, message);

        Err(ProviderError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn post<B: Serialize>(
        &self,
        operation: &'static str,
        url: Url,
        body: &B,
    ) -> std::result::Result<Response, ProviderError> {
        let body = serde_json::to_vec(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to encode request: {e}")))?;
        self.execute(operation, Method::POST, url, Some(body)).await
    }

    async fn post_for<B: Serialize, R: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
        body: &B,
    ) -> std::result::Result<R, ProviderError> {
        let response = self.post(operation, url, body).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("{operation}: {e}")))
    }
}

fn phone_number(identifier: &Identifier) -> std::result::Result<PhoneNumberModel, ProviderError> {
    identifier
        .phone()
        .map(|number| PhoneNumberModel {
            value: number.to_string(),
        })
        .ok_or_else(|| {
            ProviderError::Configuration(format!(
                "caller id {} is not a phone number",
                identifier.raw_id()
            ))
        })
}

fn connection_properties(
    model: CallConnectionPropertiesModel,
) -> std::result::Result<CallConnectionProperties, ProviderError> {
    let correlation_id = model.correlation_id.ok_or_else(|| {
        ProviderError::InvalidResponse("call connection has no correlationId".to_string())
    })?;

    Ok(CallConnectionProperties {
        call_connection_id: CallConnectionId::new(model.call_connection_id),
        correlation_id: CorrelationId::new(correlation_id),
        server_call_id: model.server_call_id.map(ServerCallId::new),
    })
}

#[async_trait]
impl ProviderGateway for AcsGateway {
    async fn create_call(&self, request: CreateCallRequest) -> Result<CallConnectionProperties> {
        let body = CreateCallRequestModel {
            targets: vec![(&request.target).into()],
            source_caller_id_number: phone_number(&request.source_caller_id)?,
            callback_uri: request.callback_uri,
        };
        let url = self.url(&["calling", "callConnections"])?;
        let model: CallConnectionPropertiesModel = self.post_for("create_call", url, &body).await?;
        Ok(connection_properties(model)?)
    }

    async fn answer_call(
        &self,
        incoming_call_context: &str,
        callback_uri: &str,
    ) -> Result<CallConnectionProperties> {
        let body = AnswerCallRequestModel {
            incoming_call_context: incoming_call_context.to_string(),
            callback_uri: callback_uri.to_string(),
        };
        let url = self.url(&["calling", "callConnections:answer"])?;
        let model: CallConnectionPropertiesModel = self.post_for("answer_call", url, &body).await?;
        Ok(connection_properties(model)?)
    }

    async fn reject_call(&self, incoming_call_context: &str, reason: RejectReason) -> Result<()> {
        let body = RejectCallRequestModel {
            incoming_call_context: incoming_call_context.to_string(),
            call_reject_reason: reason.as_str().to_string(),
        };
        let url = self.url(&["calling", "callConnections:reject"])?;
        self.post("reject_call", url, &body).await?;
        Ok(())
    }

    async fn redirect_call(&self, incoming_call_context: &str, target: &Identifier) -> Result<()> {
        let body = RedirectCallRequestModel {
            incoming_call_context: incoming_call_context.to_string(),
            target: target.into(),
        };
        let url = self.url(&["calling", "callConnections:redirect"])?;
        self.post("redirect_call", url, &body).await?;
        Ok(())
    }

    async fn transfer_call(&self, call: &CallConnectionId, target: &Identifier) -> Result<()> {
        let body = TransferToParticipantRequestModel {
            target_participant: target.into(),
        };
        let url = self.call_url(call, ":transferToParticipant")?;
        self.post("transfer_call", url, &body).await?;
        Ok(())
    }

    async fn add_participant(
        &self,
        call: &CallConnectionId,
        participant: &Identifier,
        source_caller_id: &Identifier,
    ) -> Result<()> {
        let body = AddParticipantRequestModel {
            participant_to_add: participant.into(),
            source_caller_id_number: phone_number(source_caller_id)?,
        };
        let url = self.url(&["calling", "callConnections", call.as_str(), "participants:add"])?;
        self.post("add_participant", url, &body).await?;
        Ok(())
    }

    async fn start_recording(&self, server_call_id: &ServerCallId) -> Result<RecordingId> {
        let body = StartRecordingRequestModel {
            call_locator: CallLocatorModel {
                kind: "serverCallLocator".to_string(),
                server_call_id: server_call_id.as_str().to_string(),
            },
        };
        let url = self.url(&["calling", "recordings"])?;
        let model: RecordingStateResponseModel =
            self.post_for("start_recording", url, &body).await?;
        Ok(RecordingId::new(model.recording_id))
    }

    async fn stop_recording(&self, recording_id: &RecordingId) -> Result<()> {
        let url = self.url(&["calling", "recordings", recording_id.as_str()])?;
        self.execute("stop_recording", Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn start_recognizing(
        &self,
        call: &CallConnectionId,
        request: RecognizeDtmfRequest,
    ) -> Result<()> {
        let body = RecognizeRequestModel {
            recognize_input_type: "dtmf".to_string(),
            play_prompt: PlaySourceModel::file(&request.prompt_uri),
            interrupt_call_media_operation: false,
            recognize_options: RecognizeOptionsModel {
                interrupt_prompt: request.interrupt_prompt,
                initial_silence_timeout_in_seconds: request.initial_silence_timeout.as_secs(),
                target_participant: (&request.target).into(),
                dtmf_options: DtmfOptionsModel {
                    max_tones_to_collect: request.max_tones,
                },
            },
        };
        let url = self.call_url(call, ":recognize")?;
        self.post("start_recognizing", url, &body).await?;
        Ok(())
    }

    async fn play_to_all(&self, call: &CallConnectionId, prompt_uri: &str) -> Result<()> {
        let body = PlayRequestModel {
            play_sources: vec![PlaySourceModel::file(prompt_uri)],
            play_to: Vec::new(),
        };
        let url = self.call_url(call, ":play")?;
        self.post("play_to_all", url, &body).await?;
        Ok(())
    }

    async fn hang_up(&self, call: &CallConnectionId, for_everyone: bool) -> Result<()> {
        if for_everyone {
            let url = self.call_url(call, ":terminate")?;
            self.post("hang_up", url, &EmptyRequestModel {}).await?;
        } else {
            let url = self.url(&["calling", "callConnections", call.as_str()])?;
            self.execute("hang_up", Method::DELETE, url, None).await?;
        }
        Ok(())
    }

    async fn download_recording(&self, content_location: &str, destination: &Path) -> Result<u64> {
        let url = Url::parse(content_location).map_err(|e| {
            DomainError::ValidationError(format!("invalid content location '{content_location}': {e}"))
        })?;
        let mut response = self
            .execute("download_recording", Method::GET, url, None)
            .await?;

        let mut file = tokio::fs::File::create(destination).await.map_err(|e| {
            DomainError::Internal(format!("failed to create {}: {e}", destination.display()))
        })?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?
        {
            file.write_all(&chunk).await.map_err(|e| {
                DomainError::Internal(format!("failed to write {}: {e}", destination.display()))
            })?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| DomainError::Internal(format!("failed to flush recording: {e}")))?;

        info!("Downloaded {} bytes to {}", written, destination.display());
        Ok(written)
    }
}
