//! Call value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    /// Offered to us by the provider and answered
    Inbound,
    /// Placed by us towards the configured target
    Outbound,
}

/// IVR phase of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallPhase {
    /// Nothing requested yet
    Idle,
    /// Inbound offer received, waiting for the operator to answer or reject
    Offered,
    /// Call created or answered, waiting for the connection
    Ringing,
    /// Connected, media operations being set up
    Connected,
    /// Recording and waiting for a DTMF selection
    AwaitingInput,
    /// Playing the response prompt
    Responding,
    /// Recording stopped, hang-up requested
    Terminating,
    /// Call is over
    Ended,
}

impl CallPhase {
    /// Check if phase transition is valid
    pub fn can_transition_to(&self, next: &CallPhase) -> bool {
        use CallPhase::*;

        match (self, next) {
            (Idle, Offered) => true,
            (Idle, Ringing) => true,

            // Answer, or reject/redirect
            (Offered, Ringing) => true,
            (Offered, Ended) => true,

            (Ringing, Connected) => true,
            (Connected, AwaitingInput) => true,
            (AwaitingInput, Responding) => true,
            (Responding, Terminating) => true,

            // Operator hang-up from any connected phase
            (Ringing | Connected | AwaitingInput, Terminating) => true,

            (Terminating, Ended) => true,

            // Disconnect can arrive at any time
            (Ended, _) => false,
            (_, Ended) => true,

            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, CallPhase::Ended)
    }

    /// Phases in which a call leg exists on the provider side
    pub fn has_call_leg(&self) -> bool {
        matches!(
            self,
            CallPhase::Ringing
                | CallPhase::Connected
                | CallPhase::AwaitingInput
                | CallPhase::Responding
                | CallPhase::Terminating
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallPhase::Idle => "idle",
            CallPhase::Offered => "offered",
            CallPhase::Ringing => "ringing",
            CallPhase::Connected => "connected",
            CallPhase::AwaitingInput => "awaiting_input",
            CallPhase::Responding => "responding",
            CallPhase::Terminating => "terminating",
            CallPhase::Ended => "ended",
        }
    }
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio prompts served under `/audio`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prompt {
    MainMenu,
    Confirmed,
    Goodbye,
    Invalid,
    Timeout,
}

impl Prompt {
    pub fn file_name(&self) -> &'static str {
        match self {
            Prompt::MainMenu => "MainMenu.wav",
            Prompt::Confirmed => "Confirmed.wav",
            Prompt::Goodbye => "Goodbye.wav",
            Prompt::Invalid => "Invalid.wav",
            Prompt::Timeout => "Timeout.wav",
        }
    }

    pub fn all() -> [Prompt; 5] {
        [
            Prompt::MainMenu,
            Prompt::Confirmed,
            Prompt::Goodbye,
            Prompt::Invalid,
            Prompt::Timeout,
        ]
    }
}

/// Why a DTMF recognition ended without a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognizeFailureReason {
    /// Nobody pressed a key before the initial silence timeout
    InitialSilenceTimedOut,
    /// Input started but stalled between tones
    InterDigitTimedOut,
    /// The operation was cancelled by another media operation
    Cancelled,
    /// Any other provider sub-code
    Other(u32),
}

impl RecognizeFailureReason {
    pub fn from_sub_code(sub_code: u32) -> Self {
        match sub_code {
            8510 => RecognizeFailureReason::InitialSilenceTimedOut,
            8532 => RecognizeFailureReason::InterDigitTimedOut,
            8508 => RecognizeFailureReason::Cancelled,
            other => RecognizeFailureReason::Other(other),
        }
    }
}

impl fmt::Display for RecognizeFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognizeFailureReason::InitialSilenceTimedOut => f.write_str("initial silence timed out"),
            RecognizeFailureReason::InterDigitTimedOut => f.write_str("inter-digit timed out"),
            RecognizeFailureReason::Cancelled => f.write_str("cancelled"),
            RecognizeFailureReason::Other(code) => write!(f, "sub-code {code}"),
        }
    }
}

/// Reason sent to the provider when rejecting an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    None,
    Busy,
    Forbidden,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::None => "none",
            RejectReason::Busy => "busy",
            RejectReason::Forbidden => "forbidden",
        }
    }
}
