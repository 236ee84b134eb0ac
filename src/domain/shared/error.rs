//! Domain errors

use thiserror::Error;

/// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    /// A session handle the operation needs is missing or stale
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// The provider rejected or failed a remote command
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A recognized event carried a reason code the IVR flow has no action for
    #[error("Unhandled {event} reason: {reason}")]
    UnhandledEventReason { event: String, reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        DomainError::InvalidState(message.into())
    }
}

/// Failures of the telephony provider's call-control API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("configuration: {0}")]
    Configuration(String),
}

/// A webhook entry that could not be normalized into a call event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {reason}", location(.index))]
pub struct DecodeError {
    /// Position in the delivery, `None` when the whole body was unreadable
    pub index: Option<usize>,
    pub reason: String,
}

fn location(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!("entry {i}"),
        None => "delivery".to_string(),
    }
}

impl DecodeError {
    pub fn entry(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            reason: reason.into(),
        }
    }

    pub fn delivery(reason: impl Into<String>) -> Self {
        Self {
            index: None,
            reason: reason.into(),
        }
    }
}
