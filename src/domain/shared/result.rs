//! Domain result type

use super::error::DomainError;

/// Standard result type for call-flow operations
pub type Result<T> = std::result::Result<T, DomainError>;
