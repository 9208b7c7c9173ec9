use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

/// Failures surfaced by channels, recordings and the batch assembler
#[derive(Debug, Error)]
pub enum StreamError {
    /// A single slot missed its receive window
    #[error("slot {slot} produced nothing within {timeout:?}")]
    ReceiveTimeout { slot: usize, timeout: Duration },

    /// A step could not be filled within its miss budget
    #[error("step {step} incomplete: {received}/{expected} items after {misses} missed receives")]
    IncompleteBatch {
        step: u64,
        received: usize,
        expected: usize,
        misses: usize,
    },

    #[error("failed to write recording {path:?}: {source}")]
    RecordingWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("replay index {index} out of range (recording holds {len} items)")]
    ReplayIndexOutOfRange { index: usize, len: usize },

    #[error("corrupt recording {path:?} at byte {offset}: {reason}")]
    ReplayCorruption {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    #[error("producer on slot {slot} disconnected")]
    ProducerDisconnected { slot: usize },

    #[error("slot {slot} does not exist ({num_slots} slots configured)")]
    InvalidSlot { slot: usize, num_slots: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StreamError {
    /// Recoverable errors never abort a run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ReceiveTimeout { .. } | Self::IncompleteBatch { .. }
        )
    }

    /// Replay ran past the end of the recording
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::ReplayIndexOutOfRange { .. })
    }
}
