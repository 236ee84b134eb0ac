//! callflow - webhook-driven IVR call controller
//!
//! Receives call-automation events from a telephony provider, drives each
//! call through a small IVR flow (record, prompt, collect one DTMF digit,
//! answer, hang up) and exposes operator actions over HTTP.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
