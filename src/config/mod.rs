//! Configuration management
//!
//! Layered: built-in defaults, then an optional config file (any format the
//! `config` crate understands, e.g. `callflow.toml`), then `CALLFLOW__*`
//! environment variables (`CALLFLOW__PROVIDER__CONNECTION_STRING`, ...).

use crate::domain::shared::value_objects::Identifier;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "CALLFLOW";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub call: CallConfig,
    pub ivr: IvrConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory the prompt files are served from under `/audio`
    pub audio_dir: PathBuf,
    /// Local file the latest recording is downloaded to
    pub download_path: PathBuf,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// `endpoint=https://<resource>/;accesskey=<base64>`
    pub connection_string: String,
    pub api_version: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Caller id presented on outbound calls, E.164
    pub source_number: String,
    /// Number dialled by outbound calls and used for redirect/transfer
    pub target_number: String,
    /// Number invited by the add-participant action
    pub participant_number: String,
    /// Public base URL the provider reaches this service at
    pub callback_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IvrConfig {
    pub initial_silence_timeout_secs: u64,
    pub max_tones: u8,
    pub interrupt_prompt: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions without activity for this long are evicted; 0 disables the sweep
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            audio_dir: PathBuf::from("audio"),
            download_path: PathBuf::from("testfile.wav"),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            api_version: "2023-10-15".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("connection_string", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            source_number: String::new(),
            target_number: String::new(),
            participant_number: String::new(),
            callback_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for IvrConfig {
    fn default() -> Self {
        Self {
            initial_silence_timeout_secs: 5,
            max_tones: 1,
            interrupt_prompt: true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load defaults, then `path` if it exists, then the environment
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&Config::default())?;
        let config: Config = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.connection_string.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "provider.connection_string is required".to_string(),
            ));
        }
        for (name, value) in [
            ("call.source_number", &self.call.source_number),
            ("call.target_number", &self.call.target_number),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} is required")));
            }
        }
        url::Url::parse(&self.call.callback_base_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "call.callback_base_url '{}' is not a url: {e}",
                self.call.callback_base_url
            ))
        })?;
        if self.ivr.max_tones == 0 {
            return Err(ConfigError::Invalid("ivr.max_tones must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid bind address: {e}")))
    }
}

impl CallConfig {
    pub fn source(&self) -> Identifier {
        Identifier::phone_number(self.source_number.trim())
    }

    pub fn target(&self) -> Identifier {
        Identifier::phone_number(self.target_number.trim())
    }

    /// `None` when no participant number is configured
    pub fn participant(&self) -> Option<Identifier> {
        let number = self.participant_number.trim();
        (!number.is_empty()).then(|| Identifier::phone_number(number))
    }
}

impl IvrConfig {
    pub fn initial_silence_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_silence_timeout_secs)
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
