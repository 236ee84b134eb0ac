/// IVR state machine driving one call through the main menu
///
/// Each mid-call event is looked up against the call's current phase in
/// [`plan`]; the resulting commands are issued to the provider gateway in
/// order while the caller holds the session's lock.
use super::menu::{response_prompt, PromptCatalog};
use crate::domain::call::event::{ProgressEvent, ProgressKind};
use crate::domain::call::gateway::{ProviderGateway, RecognizeDtmfRequest};
use crate::domain::call::session::CallSession;
use crate::domain::call::value_object::{CallPhase, Prompt, RecognizeFailureReason};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::Identifier;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gateway command issued by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartRecording,
    RecognizeDtmf,
    Play(Prompt),
    StopRecording,
    HangUp,
}

/// Commands to run and the phases around them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Phase entered before the first command is issued
    pub entering: Option<CallPhase>,
    pub commands: Vec<Command>,
    /// Phase reached once every command succeeded
    pub next: CallPhase,
}

/// Decision for one (phase, event) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Apply(Transition),
    /// Duplicate, late or out-of-order event; nothing to do
    Ignore(&'static str),
    /// Recognized event whose reason code has no defined action
    Unhandled(RecognizeFailureReason),
}

/// Transition table of the IVR flow
pub fn plan(phase: CallPhase, kind: &ProgressKind) -> Step {
    use CallPhase::*;
    use ProgressKind::*;

    match (phase, kind) {
        (Ended, _) => Step::Ignore("call already ended"),

        (_, CallDisconnected) => Step::Apply(Transition {
            entering: None,
            commands: vec![],
            next: Ended,
        }),

        (Ringing, CallConnected) => Step::Apply(Transition {
            entering: Some(Connected),
            commands: vec![Command::StartRecording, Command::RecognizeDtmf],
            next: AwaitingInput,
        }),
        (_, CallConnected) => Step::Ignore("call connection already handled"),

        (AwaitingInput, RecognizeCompleted { tones }) => Step::Apply(Transition {
            entering: None,
            commands: vec![Command::Play(response_prompt(tones))],
            next: Responding,
        }),
        (AwaitingInput, RecognizeFailed { reason: RecognizeFailureReason::InitialSilenceTimedOut }) => {
            Step::Apply(Transition {
                entering: None,
                commands: vec![Command::Play(Prompt::Timeout)],
                next: Responding,
            })
        }
        // TODO: define prompts for inter-digit timeouts and cancelled recognitions
        (AwaitingInput, RecognizeFailed { reason }) => Step::Unhandled(reason.clone()),
        (_, RecognizeCompleted { .. } | RecognizeFailed { .. }) => {
            Step::Ignore("no recognition outstanding")
        }

        (Responding, PlayCompleted | PlayFailed { .. }) => Step::Apply(Transition {
            entering: Some(Terminating),
            commands: vec![Command::StopRecording, Command::HangUp],
            next: Ended,
        }),
        (_, PlayCompleted | PlayFailed { .. }) => Step::Ignore("no response prompt playing"),

        (_, Other(_)) => Step::Ignore("event not used by the IVR flow"),
    }
}

/// Result of handling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Transitioned { from: CallPhase, to: CallPhase },
    Ignored { phase: CallPhase, reason: &'static str },
}

/// DTMF collection settings
#[derive(Debug, Clone)]
pub struct RecognitionSettings {
    pub initial_silence_timeout: Duration,
    pub max_tones: u8,
    pub interrupt_prompt: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            initial_silence_timeout: Duration::from_secs(5),
            max_tones: 1,
            interrupt_prompt: true,
        }
    }
}

pub struct IvrStateMachine {
    gateway: Arc<dyn ProviderGateway>,
    prompts: PromptCatalog,
    recognition: RecognitionSettings,
    /// Number dialled for outbound calls; their DTMF comes from it
    dialled_target: Identifier,
}

impl IvrStateMachine {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        prompts: PromptCatalog,
        recognition: RecognitionSettings,
        dialled_target: Identifier,
    ) -> Self {
        Self {
            gateway,
            prompts,
            recognition,
            dialled_target,
        }
    }

    /// Apply one mid-call event to its session
    pub async fn handle(&self, session: &mut CallSession, event: &ProgressEvent) -> Result<Outcome> {
        let from = session.phase();

        let transition = match plan(from, &event.kind) {
            Step::Apply(transition) => transition,
            Step::Ignore(reason) => {
                debug!(
                    correlation_id = %event.ids.correlation_id,
                    event = event.kind.name(),
                    phase = %from,
                    "Ignoring event: {}",
                    reason
                );
                return Ok(Outcome::Ignored { phase: from, reason });
            }
            Step::Unhandled(reason) => {
                return Err(DomainError::UnhandledEventReason {
                    event: event.kind.name().to_string(),
                    reason: reason.to_string(),
                });
            }
        };

        session.observe(&event.ids);

        if let Some(entering) = transition.entering {
            session.transition_to(entering)?;
        }

        for command in &transition.commands {
            self.execute(session, command).await?;
        }

        session.transition_to(transition.next)?;

        info!(
            correlation_id = %session.correlation_id(),
            event = event.kind.name(),
            "Call moved from {} to {}",
            from,
            transition.next
        );

        Ok(Outcome::Transitioned {
            from,
            to: transition.next,
        })
    }

    async fn execute(&self, session: &mut CallSession, command: &Command) -> Result<()> {
        match command {
            Command::StartRecording => {
                let server_call_id = session.require_server_call()?.clone();
                let recording_id = self.gateway.start_recording(&server_call_id).await?;
                info!(
                    correlation_id = %session.correlation_id(),
                    recording_id = %recording_id,
                    "Recording started"
                );
                session.set_recording(recording_id);
            }
            Command::RecognizeDtmf => {
                let call = session.require_call_connection()?.clone();
                let request = RecognizeDtmfRequest {
                    target: session.recognition_target(&self.dialled_target)?,
                    prompt_uri: self.prompts.uri(Prompt::MainMenu),
                    interrupt_prompt: self.recognition.interrupt_prompt,
                    initial_silence_timeout: self.recognition.initial_silence_timeout,
                    max_tones: self.recognition.max_tones,
                };
                self.gateway.start_recognizing(&call, request).await?;
            }
            Command::Play(prompt) => {
                let call = session.require_call_connection()?.clone();
                self.gateway.play_to_all(&call, &self.prompts.uri(*prompt)).await?;
            }
            Command::StopRecording => match session.take_recording_id() {
                Ok(recording_id) => {
                    if let Err(e) = self.gateway.stop_recording(&recording_id).await {
                        warn!(
                            correlation_id = %session.correlation_id(),
                            recording_id = %recording_id,
                            "Failed to stop recording: {}",
                            e
                        );
                    }
                }
                Err(e) => {
                    warn!(correlation_id = %session.correlation_id(), "Skipping recording stop: {}", e);
                }
            },
            Command::HangUp => {
                let call = session.require_call_connection()?.clone();
                info!(correlation_id = %session.correlation_id(), "Terminating call for everyone");
                self.gateway.hang_up(&call, true).await?;
            }
        }

        Ok(())
    }
}
