use crate::config::{RunConfig, RunMode};
use crate::channel::LiveChannel;
use crate::core::{Payload, Result, StreamError};
use crate::dataset::IndexedStream;
use crate::engine::{Batch, BatchAssembler};
use crate::observability::StreamMonitor;
use crate::producer::ProducerHandle;
use crate::recording::{Recorder, RecordingSummary, ReplaySource};
use tracing::info;

/// One consumer run: live (optionally recording) or replay, never both
pub struct Session {
    mode: RunMode,
    assembler: BatchAssembler,
}

impl Session {
    /// Open according to `config.mode`. Replay takes no producer handles.
    pub fn open(config: &RunConfig, handles: Vec<ProducerHandle>) -> Result<Self> {
        match config.mode {
            RunMode::Live => Self::live(config, handles),
            RunMode::Replay if handles.is_empty() => Self::replay(config),
            RunMode::Replay => Err(StreamError::Config(
                "replay mode does not receive from producers".to_string(),
            )),
        }
    }

    pub fn live(config: &RunConfig, handles: Vec<ProducerHandle>) -> Result<Self> {
        config.validate()?;
        if config.mode != RunMode::Live {
            return Err(StreamError::Config(
                "live session requires mode \"live\"".to_string(),
            ));
        }

        let mut channel = LiveChannel::new(handles)?;
        if config.record {
            channel = channel.with_recorder(Recorder::create(&config.recording_path)?);
        }
        info!(
            slots = channel.num_slots(),
            recording = channel.is_recording(),
            stream_length = config.stream_length,
            "live session opened"
        );

        let stream = IndexedStream::live(channel)
            .with_stream_length(config.stream_length)
            .with_receive_timeout(config.receive_timeout());
        Self::assemble(RunMode::Live, config, stream)
    }

    pub fn replay(config: &RunConfig) -> Result<Self> {
        config.validate()?;
        if config.mode != RunMode::Replay {
            return Err(StreamError::Config(
                "replay session requires mode \"replay\"".to_string(),
            ));
        }

        let source = ReplaySource::open(&config.recording_path)?;
        info!(path = ?config.recording_path, records = source.len(), "replay session opened");

        Self::assemble(RunMode::Replay, config, IndexedStream::replay(source))
    }

    fn assemble(mode: RunMode, config: &RunConfig, stream: IndexedStream) -> Result<Self> {
        let assembler = BatchAssembler::new(stream, config.batch_size)?
            .with_policy(config.drop_policy);
        Ok(Self { mode, assembler })
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Payload) -> Payload + Send + 'static,
    {
        self.assembler = self.assembler.with_transform(transform);
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn assembler(&self) -> &BatchAssembler {
        &self.assembler
    }

    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        self.assembler.next_batch()
    }

    /// Planned batches, see `BatchAssembler::planned_steps`
    pub fn batches(&mut self) -> &mut BatchAssembler {
        &mut self.assembler
    }

    /// Slot report of a live session
    pub fn monitor(&self) -> Option<StreamMonitor> {
        self.assembler
            .stream()
            .live_metrics()
            .map(StreamMonitor::new)
    }

    /// End the run, finalizing the recording of a recording live session
    pub fn finish(self) -> Result<Option<RecordingSummary>> {
        let summary = self.assembler.finish()?;
        info!(mode = ?self.mode, "session finished");
        Ok(summary)
    }
}
