//! Shared value objects used across the call-flow layers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation identifier tying together every event of one call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of one live call leg
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallConnectionId(String);

impl CallConnectionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side call object; recordings are addressed through it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerCallId(String);

impl ServerCallId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recording handle returned when recording starts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(String);

impl RecordingId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw-id prefix the provider uses for PSTN phone numbers
const PHONE_NUMBER_PREFIX: &str = "4:";

/// Participant identity as understood by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    /// E.164 phone number, e.g. `+14255550100`
    PhoneNumber(String),
    /// Any other provider identity, kept as its raw id
    Raw(String),
}

impl Identifier {
    pub fn phone_number(number: impl Into<String>) -> Self {
        Identifier::PhoneNumber(number.into())
    }

    /// Build an identifier from a provider raw id such as `4:+14255550100`
    pub fn from_raw_id(raw_id: &str) -> Self {
        match raw_id.strip_prefix(PHONE_NUMBER_PREFIX) {
            Some(number) => Identifier::PhoneNumber(number.to_string()),
            None => Identifier::Raw(raw_id.to_string()),
        }
    }

    pub fn raw_id(&self) -> String {
        match self {
            Identifier::PhoneNumber(number) => format!("{PHONE_NUMBER_PREFIX}{number}"),
            Identifier::Raw(raw) => raw.clone(),
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            Identifier::PhoneNumber(number) => Some(number),
            Identifier::Raw(_) => None,
        }
    }

    /// Repair a raw id whose `+` was decoded to a space in a query string.
    ///
    /// Only phone-number raw ids (leading `4`) are rewritten.
    pub fn normalize_raw_id(raw_id: &str) -> String {
        if raw_id.starts_with('4') {
            raw_id.replace(' ', "+")
        } else {
            raw_id.to_string()
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_id())
    }
}
