//! Provider connection string and HMAC request signing
//!
//! Requests are signed with the resource access key:
//! `HMAC-SHA256(key, "<VERB>\n<path?query>\n<date>;<host>;<content-hash>")`.

use crate::domain::shared::error::ProviderError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::{Position, Url};

type HmacSha256 = Hmac<Sha256>;

pub const DATE_HEADER: &str = "x-ms-date";
pub const CONTENT_HASH_HEADER: &str = "x-ms-content-sha256";

/// Parsed `endpoint=https://...;accesskey=...` connection string
#[derive(Clone)]
pub struct ConnectionString {
    pub endpoint: Url,
    access_key: Vec<u8>,
}

impl ConnectionString {
    pub fn parse(value: &str) -> Result<Self, ProviderError> {
        let mut endpoint = None;
        let mut access_key = None;

        for part in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, val) = part.split_once('=').ok_or_else(|| {
                ProviderError::Configuration(format!("malformed connection string part '{part}'"))
            })?;
            match key.to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(val.to_string()),
                "accesskey" => access_key = Some(val.to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .ok_or_else(|| ProviderError::Configuration("connection string has no endpoint".to_string()))?;
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ProviderError::Configuration(format!("invalid endpoint '{endpoint}': {e}")))?;

        // Split on the first '=' only: base64 keys end in padding
        let access_key = access_key
            .ok_or_else(|| ProviderError::Configuration("connection string has no accesskey".to_string()))?;
        let access_key = STANDARD
            .decode(access_key.as_bytes())
            .map_err(|e| ProviderError::Configuration(format!("access key is not base64: {e}")))?;

        Ok(Self {
            endpoint,
            access_key,
        })
    }
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint.as_str())
            .field("access_key", &"<redacted>")
            .finish()
    }
}

/// Signs outgoing provider requests
#[derive(Clone)]
pub struct RequestSigner {
    access_key: Vec<u8>,
}

impl RequestSigner {
    pub fn new(connection: &ConnectionString) -> Self {
        Self {
            access_key: connection.access_key.clone(),
        }
    }

    /// Headers to attach to a request: `(name, value)` pairs
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Vec<(&'static str, String)>, ProviderError> {
        let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let content_hash = content_hash(body);
        let host = &url[Position::BeforeHost..Position::AfterPort];
        let path_and_query = &url[Position::BeforePath..Position::AfterQuery];

        let string_to_sign = format!(
            "{}\n{}\n{};{};{}",
            method.to_ascii_uppercase(),
            path_and_query,
            date,
            host,
            content_hash
        );

        let mut mac = HmacSha256::new_from_slice(&self.access_key)
            .map_err(|e| ProviderError::Configuration(format!("invalid access key: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(vec![
            (DATE_HEADER, date),
            (CONTENT_HASH_HEADER, content_hash),
            (
                "authorization",
                format!(
                    "HMAC-SHA256 SignedHeaders={};host;{}&Signature={}",
                    DATE_HEADER, CONTENT_HASH_HEADER, signature
                ),
            ),
        ])
    }
}

/// Base64 SHA-256 of a request body
pub fn content_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}
