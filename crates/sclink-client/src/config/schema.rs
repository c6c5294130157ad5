use std::time::Duration;

use serde::Deserialize;
use sclink_core::error::{Result, ScError};

/// 32 MiB, the limit sc-server documents for a single frame.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    pub url: String,

    #[serde(default)]
    pub reconnect: ReconnectSection,

    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl ClientConfig {
    /// Defaults for everything but the url.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            version: 1,
            url: url.into(),
            reconnect: ReconnectSection::default(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ScError::InvalidConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ScError::InvalidConfig(
                "url must start with ws:// or wss://".into(),
            ));
        }
        if self.max_payload_bytes == 0 {
            return Err(ScError::InvalidConfig(
                "max_payload_bytes must be greater than 0".into(),
            ));
        }

        self.reconnect.validate()?;

        Ok(())
    }

    /// What the connection manager consumes.
    pub fn settings(&self) -> Result<ConnectionSettings> {
        let retry_delay = Duration::try_from_secs_f64(self.reconnect.retry_delay_secs).map_err(|e| {
            ScError::InvalidConfig(format!("reconnect.retry_delay_secs: {e}"))
        })?;
        Ok(ConnectionSettings {
            retries: self.reconnect.retries,
            retry_delay,
            max_payload_bytes: self.max_payload_bytes,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectSection {
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl ReconnectSection {
    pub fn validate(&self) -> Result<()> {
        if self.retries > 100 {
            return Err(ScError::InvalidConfig(
                "reconnect.retries must be between 0 and 100".into(),
            ));
        }
        if !self.retry_delay_secs.is_finite() || !(0.0..=300.0).contains(&self.retry_delay_secs) {
            return Err(ScError::InvalidConfig(
                "reconnect.retry_delay_secs must be between 0 and 300".into(),
            ));
        }
        Ok(())
    }
}

fn default_retries() -> u32 {
    5
}
fn default_retry_delay_secs() -> f64 {
    2.0
}
fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

/// Runtime knobs of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Reconnect attempts allowed per in-flight send.
    pub retries: u32,
    /// Wait before each reconnect attempt.
    pub retry_delay: Duration,
    /// Local cap on the serialized request size.
    pub max_payload_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay: Duration::from_secs_f64(default_retry_delay_secs()),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}
