//! Call flow service
//!
//! Orchestrates the session store, the IVR state machine and the provider
//! gateway for webhook deliveries and operator actions.

use crate::config::Config;
use crate::domain::call::event::{CallEvent, IncomingCallOffer, ProgressEvent, ProgressKind};
use crate::domain::call::gateway::{CreateCallRequest, ProviderGateway};
use crate::domain::call::session::CallSession;
use crate::domain::call::value_object::{CallDirection, CallPhase, RejectReason};
use crate::domain::ivr::machine::{IvrStateMachine, Outcome, RecognitionSettings};
use crate::domain::ivr::menu::PromptCatalog;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{
    CallConnectionId, CorrelationId, Identifier, ServerCallId,
};
use crate::infrastructure::session_store::{SessionHandle, SessionStore};
use crate::infrastructure::telemetry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};
use url::Url;

/// Which webhook route delivered an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRoute {
    /// `/api/callbacks`, used by outbound calls
    Shared,
    /// `/api/calls/{contextId}?callerId=...`, handed out when answering
    PerCall {
        context_id: String,
        caller_id: Identifier,
    },
}

/// Snapshot of a session returned by operator actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub correlation_id: CorrelationId,
    pub direction: CallDirection,
    pub phase: CallPhase,
    pub call_connection_id: Option<CallConnectionId>,
    pub server_call_id: Option<ServerCallId>,
    pub created_at: DateTime<Utc>,
}

impl CallSummary {
    fn of(session: &CallSession) -> Self {
        Self {
            correlation_id: session.correlation_id().clone(),
            direction: session.direction(),
            phase: session.phase(),
            call_connection_id: session.call_connection_id().cloned(),
            server_call_id: session.server_call_id().cloned(),
            created_at: *session.created_at(),
        }
    }
}

/// Result of a recording download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSummary {
    pub content_location: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Per-delivery processing counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub handled: usize,
    pub failed: usize,
}

/// Settings the service needs from the process configuration
#[derive(Debug, Clone)]
pub struct CallFlowSettings {
    pub source: Identifier,
    pub target: Identifier,
    pub participant: Option<Identifier>,
    pub callback_base_url: String,
    pub download_path: PathBuf,
    pub recognition: RecognitionSettings,
}

impl From<&Config> for CallFlowSettings {
    fn from(config: &Config) -> Self {
        Self {
            source: config.call.source(),
            target: config.call.target(),
            participant: config.call.participant(),
            callback_base_url: config.call.callback_base_url.clone(),
            download_path: config.server.download_path.clone(),
            recognition: RecognitionSettings {
                initial_silence_timeout: config.ivr.initial_silence_timeout(),
                max_tones: config.ivr.max_tones,
                interrupt_prompt: config.ivr.interrupt_prompt,
            },
        }
    }
}

pub struct CallFlowService {
    gateway: Arc<dyn ProviderGateway>,
    store: Arc<SessionStore>,
    machine: IvrStateMachine,
    settings: CallFlowSettings,
}

impl CallFlowService {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        store: Arc<SessionStore>,
        settings: CallFlowSettings,
    ) -> Self {
        let machine = IvrStateMachine::new(
            gateway.clone(),
            PromptCatalog::new(&settings.callback_base_url),
            settings.recognition.clone(),
            settings.target.clone(),
        );

        Self {
            gateway,
            store,
            machine,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Place a call to the configured target
    pub async fn start_outbound_call(&self) -> Result<CallSummary> {
        let request = CreateCallRequest {
            target: self.settings.target.clone(),
            source_caller_id: self.settings.source.clone(),
            callback_uri: self.shared_callback_uri()?,
        };

        info!("Placing outbound call to {}", request.target);
        let properties = self.gateway.create_call(request).await?;

        let Some((handle, inserted)) = self.store.insert(CallSession::outbound(&properties)).await
        else {
            // Connected and disconnected before the create response arrived
            let mut session = CallSession::outbound(&properties);
            session.transition_to(CallPhase::Ended)?;
            info!(
                correlation_id = %properties.correlation_id,
                "Outbound call already ended"
            );
            return Ok(CallSummary::of(&session));
        };
        let mut session = handle.lock().await;
        if inserted {
            telemetry::record_call_started("outbound");
        } else {
            // An event for the call arrived before the create response
            session.bind_connection(&properties);
        }
        let summary = CallSummary::of(&session);
        drop(session);

        self.publish_session_count().await;
        info!(
            correlation_id = %summary.correlation_id,
            call_connection_id = %properties.call_connection_id,
            "Outbound call created"
        );
        Ok(summary)
    }

    /// Process the decoded events of one delivery in order.
    ///
    /// Failures are logged per event and never abort the rest of the batch.
    pub async fn handle_events(&self, events: Vec<CallEvent>, route: &CallbackRoute) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for event in events {
            telemetry::record_webhook_event(event.event_type());
            let event_type = event.event_type().to_string();
            let correlation_id = event.correlation_id().cloned();

            match self.handle_event(event, route).await {
                Ok(()) => report.handled += 1,
                Err(DomainError::UnhandledEventReason { event, reason }) => {
                    telemetry::record_unhandled_event(&event);
                    warn!(
                        correlation_id = ?correlation_id.as_ref().map(|c| c.as_str()),
                        "No action for {} with reason {}",
                        event,
                        reason
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(
                        correlation_id = ?correlation_id.as_ref().map(|c| c.as_str()),
                        "Failed to handle {}: {}",
                        event_type,
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    pub async fn handle_event(&self, event: CallEvent, route: &CallbackRoute) -> Result<()> {
        match event {
            CallEvent::ValidationChallenge { .. } => {
                debug!("Validation challenge reached the call flow; nothing to do");
                Ok(())
            }
            CallEvent::IncomingCall(offer) => self.on_incoming_call(offer).await,
            CallEvent::RecordingFileStatus(status) => {
                info!(
                    server_call_id = ?status.server_call_id.as_ref().map(|s| s.as_str()),
                    "Recording available at {}",
                    status.content_location
                );
                self.store
                    .record_location(status.server_call_id, status.content_location)
                    .await;
                Ok(())
            }
            CallEvent::Progress(event) => self.on_progress(event, route).await,
        }
    }

    async fn on_incoming_call(&self, offer: IncomingCallOffer) -> Result<()> {
        let Some((_, inserted)) = self.store.insert(CallSession::offered(&offer)).await else {
            debug!(correlation_id = %offer.correlation_id, "Offer for an ended call ignored");
            return Ok(());
        };
        if inserted {
            telemetry::record_call_started("inbound");
            self.publish_session_count().await;
            info!(
                correlation_id = %offer.correlation_id,
                caller = %offer.caller,
                "Incoming call offered"
            );
        } else {
            debug!(correlation_id = %offer.correlation_id, "Duplicate incoming call offer");
        }
        Ok(())
    }

    async fn on_progress(&self, event: ProgressEvent, route: &CallbackRoute) -> Result<()> {
        let correlation_id = event.ids.correlation_id.clone();

        let handle = match self.store.get(&correlation_id).await {
            Some(handle) => handle,
            None => match self.adopt(&event, route).await {
                Some(handle) => handle,
                None => {
                    let ended = self.store.has_ended(&correlation_id).await;
                    debug!(
                        correlation_id = %correlation_id,
                        event = event.kind.name(),
                        ended = ended,
                        "Event for unknown call ignored"
                    );
                    return Ok(());
                }
            },
        };

        let mut session = handle.lock().await;
        if let CallbackRoute::PerCall {
            context_id,
            caller_id,
        } = route
        {
            debug!(correlation_id = %correlation_id, context_id = %context_id, "Per-call callback");
            session.set_recognition_target(caller_id.clone());
        }

        let result = self.machine.handle(&mut session, &event).await;
        let ended = session.phase() == CallPhase::Ended;
        drop(session);

        if ended && self.store.evict(&correlation_id).await {
            self.publish_session_count().await;
        }

        match result? {
            Outcome::Transitioned { from, to } => telemetry::record_transition(from.as_str(), to.as_str()),
            Outcome::Ignored { .. } => {}
        }
        Ok(())
    }

    /// Session for an outbound call whose connect event beat the create response
    async fn adopt(&self, event: &ProgressEvent, route: &CallbackRoute) -> Option<SessionHandle> {
        if event.kind != ProgressKind::CallConnected || *route != CallbackRoute::Shared {
            return None;
        }
        let (handle, inserted) = self
            .store
            .insert(CallSession::adopted_outbound(&event.ids))
            .await?;
        if inserted {
            telemetry::record_call_started("outbound");
            info!(correlation_id = %event.ids.correlation_id, "Adopted outbound call from its connect event");
        }
        Some(handle)
    }

    /// Answer the selected (or most recent) pending offer
    pub async fn answer_call(&self, selector: Option<CorrelationId>) -> Result<CallSummary> {
        let handle = self.select_offer(selector).await?;
        let mut session = handle.lock().await;

        let context = session.take_incoming_context()?;
        let caller = session.caller_identity().cloned().ok_or_else(|| {
            DomainError::invalid_state(format!(
                "call {} has no caller identity",
                session.correlation_id()
            ))
        })?;
        let callback_uri = match self.per_call_callback_uri(&caller) {
            Ok(uri) => uri,
            Err(e) => {
                session.restore_incoming_context(context);
                return Err(e);
            }
        };

        match self.gateway.answer_call(&context, &callback_uri).await {
            Ok(properties) => {
                if &properties.correlation_id != session.correlation_id() {
                    warn!(
                        correlation_id = %session.correlation_id(),
                        answered = %properties.correlation_id,
                        "Answered call reports a different correlation id"
                    );
                }
                session.bind_connection(&properties);
                session.transition_to(CallPhase::Ringing)?;
                info!(correlation_id = %session.correlation_id(), "Call answered");
                Ok(CallSummary::of(&session))
            }
            Err(e) => {
                session.restore_incoming_context(context);
                Err(e)
            }
        }
    }

    /// Reject the selected (or most recent) pending offer
    pub async fn reject_call(&self, selector: Option<CorrelationId>) -> Result<CallSummary> {
        let handle = self.select_offer(selector).await?;
        let mut session = handle.lock().await;

        let context = session.take_incoming_context()?;
        if let Err(e) = self.gateway.reject_call(&context, RejectReason::Forbidden).await {
            session.restore_incoming_context(context);
            return Err(e);
        }

        info!(correlation_id = %session.correlation_id(), "Call rejected");
        self.finish_offer(session).await
    }

    /// Redirect the selected (or most recent) pending offer to the configured target
    pub async fn redirect_call(&self, selector: Option<CorrelationId>) -> Result<CallSummary> {
        let handle = self.select_offer(selector).await?;
        let mut session = handle.lock().await;

        let context = session.take_incoming_context()?;
        if let Err(e) = self
            .gateway
            .redirect_call(&context, &self.settings.target)
            .await
        {
            session.restore_incoming_context(context);
            return Err(e);
        }

        info!(
            correlation_id = %session.correlation_id(),
            target = %self.settings.target,
            "Call redirected"
        );
        self.finish_offer(session).await
    }

    /// End a call whose offer was rejected or redirected
    async fn finish_offer(&self, mut session: MutexGuard<'_, CallSession>) -> Result<CallSummary> {
        session.transition_to(CallPhase::Ended)?;
        let summary = CallSummary::of(&session);
        drop(session);

        self.store.evict(&summary.correlation_id).await;
        self.publish_session_count().await;
        Ok(summary)
    }

    /// Hang up the selected (or most recent) active call for everyone
    pub async fn hang_up(&self, selector: Option<CorrelationId>) -> Result<CallSummary> {
        let handle = self.select_active(selector).await?;
        let mut session = handle.lock().await;

        let call = session.require_call_connection()?.clone();
        if session.phase() != CallPhase::Terminating {
            session.transition_to(CallPhase::Terminating)?;
        }

        self.gateway.hang_up(&call, true).await?;
        session.transition_to(CallPhase::Ended)?;
        info!(correlation_id = %session.correlation_id(), "Call hung up by operator");

        let summary = CallSummary::of(&session);
        drop(session);
        self.store.evict(&summary.correlation_id).await;
        self.publish_session_count().await;
        Ok(summary)
    }

    /// Transfer the selected (or most recent) active call to the configured target
    pub async fn transfer_call(&self, selector: Option<CorrelationId>) -> Result<CallSummary> {
        let handle = self.select_active(selector).await?;
        let mut session = handle.lock().await;

        let call = session.require_call_connection()?.clone();
        self.gateway
            .transfer_call(&call, &self.settings.target)
            .await?;
        session.touch();

        info!(
            correlation_id = %session.correlation_id(),
            target = %self.settings.target,
            "Call transfer requested"
        );
        Ok(CallSummary::of(&session))
    }

    /// Invite the configured participant into the selected (or most recent) active call
    pub async fn add_participant(&self, selector: Option<CorrelationId>) -> Result<CallSummary> {
        let participant = self.settings.participant.clone().ok_or_else(|| {
            DomainError::ValidationError("no participant number configured".to_string())
        })?;

        let handle = self.select_active(selector).await?;
        let mut session = handle.lock().await;

        let call = session.require_call_connection()?.clone();
        self.gateway
            .add_participant(&call, &participant, &self.settings.source)
            .await?;
        session.touch();

        info!(
            correlation_id = %session.correlation_id(),
            participant = %participant,
            "Participant invited"
        );
        Ok(CallSummary::of(&session))
    }

    /// Download a finished recording to the configured file.
    ///
    /// Without a server call id the most recently reported recording is used.
    pub async fn download_recording(
        &self,
        server_call_id: Option<ServerCallId>,
    ) -> Result<DownloadSummary> {
        let location = match &server_call_id {
            Some(id) => self.store.recording_location(id).await,
            None => self.store.latest_recording_location().await,
        }
        .ok_or_else(|| DomainError::invalid_state("no recording location received yet"))?;

        let bytes = self
            .gateway
            .download_recording(&location, &self.settings.download_path)
            .await?;

        Ok(DownloadSummary {
            content_location: location,
            path: self.settings.download_path.clone(),
            bytes,
        })
    }

    /// Evict sessions idle for longer than `max_idle`
    pub async fn sweep_idle_sessions(&self, max_idle: std::time::Duration) -> usize {
        let evicted = self.store.sweep_idle(max_idle).await;
        if evicted > 0 {
            self.publish_session_count().await;
        }
        evicted
    }

    async fn select_offer(&self, selector: Option<CorrelationId>) -> Result<SessionHandle> {
        self.select(selector, "pending incoming call", |s| s.has_pending_offer())
            .await
    }

    async fn select_active(&self, selector: Option<CorrelationId>) -> Result<SessionHandle> {
        self.select(selector, "active call", |s| {
            s.phase().has_call_leg() && s.call_connection_id().is_some()
        })
        .await
    }

    async fn select<F>(
        &self,
        selector: Option<CorrelationId>,
        what: &str,
        predicate: F,
    ) -> Result<SessionHandle>
    where
        F: Fn(&CallSession) -> bool,
    {
        match selector {
            Some(correlation_id) => self.store.get(&correlation_id).await.ok_or_else(|| {
                DomainError::invalid_state(format!("no {what} with correlation id {correlation_id}"))
            }),
            None => self
                .store
                .most_recent(predicate)
                .await
                .map(|(_, handle)| handle)
                .ok_or_else(|| DomainError::invalid_state(format!("no {what}"))),
        }
    }

    fn shared_callback_uri(&self) -> Result<String> {
        Ok(self.callback_url(&["api", "callbacks"])?.to_string())
    }

    /// `<base>/api/calls/<uuid>?callerId=<raw id>`
    fn per_call_callback_uri(&self, caller: &Identifier) -> Result<String> {
        let context_id = uuid::Uuid::new_v4().to_string();
        let mut url = self.callback_url(&["api", "calls", &context_id])?;
        url.query_pairs_mut().append_pair("callerId", &caller.raw_id());
        Ok(url.to_string())
    }

    fn callback_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.settings.callback_base_url).map_err(|e| {
            DomainError::ValidationError(format!("invalid callback base url: {e}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| DomainError::ValidationError("callback base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn publish_session_count(&self) {
        telemetry::update_active_sessions(self.store.len().await);
    }
}
