use serde::{Deserialize, Serialize};

/// What the batch assembler does when a slot misses its receive window.
///
/// Both variants are deterministic for a given sequence of deliveries and misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Re-poll a missed position in place, up to `max_retries` times, before
    /// moving to the next one. Every batch position keeps its slot; the step
    /// fails with `IncompleteBatch` once a position runs out of retries.
    RetrySlot { max_retries: usize },

    /// Drop the missed index and pull the next one instead, so other slots can
    /// fill the quota. The step fails with `IncompleteBatch` after more than
    /// `max_misses` misses.
    SkipSlot { max_misses: usize },
}

impl DropPolicy {
    pub fn name(&self) -> &str {
        match self {
            Self::RetrySlot { .. } => "retry_slot",
            Self::SkipSlot { .. } => "skip_slot",
        }
    }
}

impl Default for DropPolicy {
    fn default() -> Self {
        Self::RetrySlot { max_retries: 2 }
    }
}
