//! Webhook event decoding

pub mod envelope;

pub use envelope::{decode_cloud_events, decode_event_grid, DecodedBatch};
