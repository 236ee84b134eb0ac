//! Telephony provider adapter (Call Automation REST API)

pub mod auth;
pub mod client;
pub mod models;

pub use auth::{ConnectionString, RequestSigner};
pub use client::AcsGateway;
