//! Call session aggregate root

use crate::domain::call::event::{CallIds, IncomingCallOffer};
use crate::domain::call::gateway::CallConnectionProperties;
use crate::domain::call::value_object::{CallDirection, CallPhase};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{
    CallConnectionId, CorrelationId, Identifier, RecordingId, ServerCallId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Call session aggregate root
///
/// Tracks the provider handles of one call, keyed by its correlation id, and
/// the IVR phase the call is in. Only the IVR state machine and the operator
/// actions mutate it, always under the per-call lock held by the session
/// store.
#[derive(Debug, Clone, Serialize)]
pub struct CallSession {
    correlation_id: CorrelationId,
    direction: CallDirection,
    phase: CallPhase,
    call_connection_id: Option<CallConnectionId>,
    server_call_id: Option<ServerCallId>,
    /// Present only while recording is active
    recording_id: Option<RecordingId>,
    caller_identity: Option<Identifier>,
    /// Present only between offer and answer/reject/redirect
    #[serde(skip)]
    pending_incoming_context: Option<String>,
    /// Recognition target supplied by a per-call callback route
    recognition_target: Option<Identifier>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl CallSession {
    /// Session for a call we placed; starts ringing
    pub fn outbound(properties: &CallConnectionProperties) -> Self {
        let mut session = Self::empty(properties.correlation_id.clone(), CallDirection::Outbound);
        session.call_connection_id = Some(properties.call_connection_id.clone());
        session.server_call_id = properties.server_call_id.clone();
        session.phase = CallPhase::Ringing;
        session
    }

    /// Session for an outbound call first seen through one of its events
    pub fn adopted_outbound(ids: &CallIds) -> Self {
        let mut session = Self::empty(ids.correlation_id.clone(), CallDirection::Outbound);
        session.observe(ids);
        session.phase = CallPhase::Ringing;
        session
    }

    /// Session for an inbound offer waiting for the operator
    pub fn offered(offer: &IncomingCallOffer) -> Self {
        let mut session = Self::empty(offer.correlation_id.clone(), CallDirection::Inbound);
        session.server_call_id = offer.server_call_id.clone();
        session.caller_identity = Some(offer.caller.clone());
        session.pending_incoming_context = Some(offer.incoming_call_context.clone());
        session.phase = CallPhase::Offered;
        session
    }

    fn empty(correlation_id: CorrelationId, direction: CallDirection) -> Self {
        let now = Utc::now();
        Self {
            correlation_id,
            direction,
            phase: CallPhase::Idle,
            call_connection_id: None,
            server_call_id: None,
            recording_id: None,
            caller_identity: None,
            pending_incoming_context: None,
            recognition_target: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// Move to a new phase
    pub fn transition_to(&mut self, next: CallPhase) -> Result<()> {
        if !self.phase.can_transition_to(&next) {
            return Err(DomainError::InvalidStateTransition(format!(
                "Cannot transition call {} from {} to {}",
                self.correlation_id, self.phase, next
            )));
        }

        self.phase = next;
        self.touch();
        Ok(())
    }

    /// Bind the handles carried by an event; the latest event wins
    pub fn observe(&mut self, ids: &CallIds) {
        self.call_connection_id = Some(ids.call_connection_id.clone());
        if ids.server_call_id.is_some() {
            self.server_call_id = ids.server_call_id.clone();
        }
        self.touch();
    }

    /// Bind the handles returned when the call was answered
    pub fn bind_connection(&mut self, properties: &CallConnectionProperties) {
        self.call_connection_id = Some(properties.call_connection_id.clone());
        if properties.server_call_id.is_some() {
            self.server_call_id = properties.server_call_id.clone();
        }
        self.touch();
    }

    /// Take the offer context; it can be used exactly once
    pub fn take_incoming_context(&mut self) -> Result<String> {
        self.pending_incoming_context.take().ok_or_else(|| {
            DomainError::invalid_state(format!(
                "call {} has no pending incoming call context",
                self.correlation_id
            ))
        })
    }

    /// Put back an offer context whose use failed on the provider side
    pub fn restore_incoming_context(&mut self, context: String) {
        if self.phase == CallPhase::Offered {
            self.pending_incoming_context = Some(context);
        }
    }

    pub fn set_recording(&mut self, recording_id: RecordingId) {
        self.recording_id = Some(recording_id);
        self.touch();
    }

    /// Take the active recording id; a second call fails without side effects
    pub fn take_recording_id(&mut self) -> Result<RecordingId> {
        self.recording_id.take().ok_or_else(|| {
            DomainError::invalid_state(format!(
                "call {} has no active recording",
                self.correlation_id
            ))
        })
    }

    pub fn require_call_connection(&self) -> Result<&CallConnectionId> {
        match (&self.call_connection_id, self.phase.has_call_leg()) {
            (Some(id), true) => Ok(id),
            _ => Err(DomainError::invalid_state(format!(
                "call {} has no active call connection (phase {})",
                self.correlation_id, self.phase
            ))),
        }
    }

    pub fn require_server_call(&self) -> Result<&ServerCallId> {
        self.server_call_id.as_ref().ok_or_else(|| {
            DomainError::invalid_state(format!(
                "call {} has no server call id",
                self.correlation_id
            ))
        })
    }

    pub fn set_recognition_target(&mut self, target: Identifier) {
        self.recognition_target = Some(target);
    }

    /// Participant whose keypad input is collected.
    ///
    /// Outbound calls listen to the number we dialled; inbound calls listen to
    /// the caller.
    pub fn recognition_target(&self, dialled: &Identifier) -> Result<Identifier> {
        match self.direction {
            CallDirection::Outbound => Ok(dialled.clone()),
            CallDirection::Inbound => self
                .recognition_target
                .clone()
                .or_else(|| self.caller_identity.clone())
                .ok_or_else(|| {
                    DomainError::invalid_state(format!(
                        "inbound call {} has no caller identity",
                        self.correlation_id
                    ))
                }),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    // Getters
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    pub fn call_connection_id(&self) -> Option<&CallConnectionId> {
        self.call_connection_id.as_ref()
    }

    pub fn server_call_id(&self) -> Option<&ServerCallId> {
        self.server_call_id.as_ref()
    }

    pub fn recording_id(&self) -> Option<&RecordingId> {
        self.recording_id.as_ref()
    }

    pub fn caller_identity(&self) -> Option<&Identifier> {
        self.caller_identity.as_ref()
    }

    pub fn has_pending_offer(&self) -> bool {
        self.pending_incoming_context.is_some()
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn last_activity(&self) -> &DateTime<Utc> {
        &self.last_activity
    }

    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }
}
