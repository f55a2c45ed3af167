//! Session configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! Durations are written in milliseconds.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::KernelError;

/// Quiet period after the last edit before an automatic render.
pub const DEFAULT_RENDER_DELAY: Duration = Duration::from_secs(10);

/// Upper bound on any single remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Filter loaded when a session starts.
pub const DEFAULT_INITIAL_FILTER: &str = "default";

/// File name used for batch results when the server does not name them.
pub const DEFAULT_ARCHIVE_NAME: &str = "batch.zip";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(rename = "render_delay_ms", with = "millis")]
    pub render_delay: Duration,

    #[serde(rename = "request_timeout_ms", with = "millis")]
    pub request_timeout: Duration,

    /// Filter to load on start; `None` starts from empty buffers.
    pub initial_filter: Option<String>,

    pub archive_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            render_delay: DEFAULT_RENDER_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            initial_filter: Some(DEFAULT_INITIAL_FILTER.to_string()),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self, KernelError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self, KernelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if self.render_delay.is_zero() {
            return Err(KernelError::Config("render_delay_ms must be positive".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(KernelError::Config("request_timeout_ms must be positive".into()));
        }
        if self.archive_name.trim().is_empty() {
            return Err(KernelError::Config("archive_name must not be empty".into()));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
