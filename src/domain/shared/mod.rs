//! Shared kernel - identifiers and errors used by every layer

pub mod error;
pub mod result;
pub mod value_objects;

pub use error::{DecodeError, DomainError, ProviderError};
pub use result::Result;
pub use value_objects::*;
