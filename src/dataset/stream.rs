use crate::channel::{Delivery, LiveChannel};
use crate::core::Result;
use crate::observability::MetricsCollector;
use crate::recording::{DroppedStep, RecordingSummary, ReplaySource};
use std::time::Duration;

/// Receive window of a live `get`, long enough to cover a slow render step
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default visitation budget of a live stream
pub const DEFAULT_STREAM_LENGTH: usize = 64;

/// Reported length of an indexed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLength {
    /// Live stream. `soft` is a planning default, not an upper bound.
    Open { soft: usize },
    /// Recorded stream with an exact item count
    Exact(usize),
}

impl StreamLength {
    /// Number of items a default iteration visits
    pub fn planned(&self) -> usize {
        match self {
            Self::Open { soft } => *soft,
            Self::Exact(len) => *len,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

enum Backing {
    Live(LiveChannel),
    Replay(ReplaySource),
}

/// Index-addressable view over either live producers or a recording.
///
/// Live: `index` picks the slot `index % num_slots` to poll. Replay: `index` is
/// the position in the recording.
pub struct IndexedStream {
    backing: Backing,
    stream_length: usize,
    receive_timeout: Duration,
}

impl IndexedStream {
    pub fn live(channel: LiveChannel) -> Self {
        Self {
            backing: Backing::Live(channel),
            stream_length: DEFAULT_STREAM_LENGTH,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    pub fn replay(source: ReplaySource) -> Self {
        Self {
            backing: Backing::Replay(source),
            stream_length: DEFAULT_STREAM_LENGTH,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    /// Soft length reported in live mode; ignored in replay
    pub fn with_stream_length(mut self, stream_length: usize) -> Self {
        self.stream_length = stream_length;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn is_stream(&self) -> bool {
        match &self.backing {
            Backing::Live(channel) => channel.is_stream(),
            Backing::Replay(_) => false,
        }
    }

    pub fn length(&self) -> StreamLength {
        match &self.backing {
            Backing::Live(_) => StreamLength::Open {
                soft: self.stream_length,
            },
            Backing::Replay(source) => StreamLength::Exact(source.len()),
        }
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    /// Live slot polled for `index`, `None` in replay
    pub fn slot_for(&self, index: usize) -> Option<usize> {
        match &self.backing {
            Backing::Live(channel) => Some(index % channel.num_slots()),
            Backing::Replay(_) => None,
        }
    }

    /// Fetch the item for `index`.
    ///
    /// Live indices past the soft length are still served. Replay indices past
    /// the end fail with `ReplayIndexOutOfRange`.
    pub fn get(&mut self, index: usize) -> Result<Delivery> {
        match &mut self.backing {
            Backing::Live(channel) => {
                let slot = index % channel.num_slots();
                channel.receive(slot, self.receive_timeout)
            }
            Backing::Replay(source) => source.read(index).map(Delivery::Item),
        }
    }

    /// Steps abandoned while the recording was made; empty for live streams
    pub fn dropped_steps(&self) -> &[DroppedStep] {
        match &self.backing {
            Backing::Live(_) => &[],
            Backing::Replay(source) => source.dropped_steps(),
        }
    }

    /// Mark an abandoned live step in the recording, if one is attached
    pub fn mark_step_dropped(&mut self, received: usize, misses: usize) -> Result<()> {
        match &mut self.backing {
            Backing::Live(channel) => channel.mark_step_dropped(received, misses),
            Backing::Replay(_) => Ok(()),
        }
    }

    /// Slot metrics of the live channel
    pub fn live_metrics(&self) -> Option<MetricsCollector> {
        match &self.backing {
            Backing::Live(channel) => Some(channel.metrics()),
            Backing::Replay(_) => None,
        }
    }

    /// Release the backing channel, finalizing its recording if one is attached
    pub fn finish(self) -> Result<Option<RecordingSummary>> {
        match self.backing {
            Backing::Live(channel) => channel.finish(),
            Backing::Replay(_) => Ok(None),
        }
    }
}
