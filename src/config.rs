use crate::core::{Result, StreamError};
use crate::dataset::{DEFAULT_RECEIVE_TIMEOUT, DEFAULT_STREAM_LENGTH};
use crate::resilience::DropPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where items come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Receive from running producers
    #[default]
    Live,
    /// Read back a finalized recording
    Replay,
}

/// Settings of one consumer run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: RunMode,

    /// Record the live stream while consuming it
    pub record: bool,

    pub recording_path: PathBuf,

    /// Soft live length: a default visitation budget, not an upper bound
    pub stream_length: usize,

    pub batch_size: usize,

    pub receive_timeout_ms: u64,

    /// Bound of each producer channel
    pub channel_capacity: usize,

    pub drop_policy: DropPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Live,
            record: false,
            recording_path: PathBuf::from("./tmp/record.ftrec"),
            stream_length: DEFAULT_STREAM_LENGTH,
            batch_size: 4,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64,
            channel_capacity: 8,
            drop_policy: DropPolicy::default(),
        }
    }
}

impl RunConfig {
    /// Parse and validate; missing fields take their defaults
    pub fn from_json(config: Value) -> Result<Self> {
        let config: Self = serde_json::from_value(config)
            .map_err(|e| StreamError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| StreamError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| StreamError::Config(format!("{:?}: {}", path, e)))?;
        Self::from_json(value)
    }

    pub fn validate(&self) -> Result<()> {
        if self.record && self.mode == RunMode::Replay {
            return Err(StreamError::Config(
                "recording requires live mode".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(StreamError::Config("batch_size must be positive".to_string()));
        }
        if self.receive_timeout_ms == 0 {
            return Err(StreamError::Config(
                "receive_timeout_ms must be positive".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(StreamError::Config(
                "channel_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}
