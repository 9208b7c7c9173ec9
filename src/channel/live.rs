use super::Delivery;
use crate::core::{Result, StreamError};
use crate::observability::MetricsCollector;
use crate::producer::ProducerHandle;
use crate::recording::{Recorder, RecordingSummary};
use crossbeam_channel::RecvTimeoutError;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Consumer side of the live producers, one slot per injected handle.
///
/// Producer processes are owned by whoever built the handles; this type only
/// receives from them.
pub struct LiveChannel {
    slots: Vec<ProducerHandle>,
    /// Last frame id delivered per slot
    cursors: Vec<Option<u64>>,
    recorder: Option<Recorder>,
    metrics: MetricsCollector,
}

impl LiveChannel {
    pub fn new(handles: Vec<ProducerHandle>) -> Result<Self> {
        if handles.is_empty() {
            return Err(StreamError::Config(
                "live channel needs at least one producer handle".to_string(),
            ));
        }

        let num_slots = handles.len();
        Ok(Self {
            slots: handles,
            cursors: vec![None; num_slots],
            recorder: None,
            metrics: MetricsCollector::new(num_slots),
        })
    }

    /// Persist every delivered item through `recorder`
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Live channels have no inherent length
    pub fn is_stream(&self) -> bool {
        true
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }

    /// Wait at most `timeout` for the next new item on `slot`.
    ///
    /// Items at or behind the slot cursor are discarded without resetting the
    /// deadline. With a recorder attached the item is persisted before it is
    /// returned; a write failure is returned instead of the item.
    pub fn receive(&mut self, slot: usize, timeout: Duration) -> Result<Delivery> {
        let num_slots = self.slots.len();
        let handle = self
            .slots
            .get(slot)
            .ok_or(StreamError::InvalidSlot { slot, num_slots })?;
        let metrics = self
            .metrics
            .slot(slot)
            .ok_or(StreamError::InvalidSlot { slot, num_slots })?;

        let start = Instant::now();
        let deadline = start + timeout;

        loop {
            let item = match handle.receiver().recv_deadline(deadline) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => {
                    let waited = start.elapsed();
                    metrics.record_missed(waited);
                    warn!(slot, ?waited, "no item within receive window, slot dropped");
                    return Ok(Delivery::Missed { slot, waited });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(StreamError::ProducerDisconnected { slot });
                }
            };

            if let Some(last) = self.cursors[slot] {
                if item.frame_id <= last {
                    metrics.record_stale();
                    warn!(
                        slot,
                        producer_id = item.producer_id,
                        frame_id = item.frame_id,
                        last_delivered = last,
                        "discarding already delivered frame"
                    );
                    continue;
                }
            }

            if let Some(expected) = handle.producer_id() {
                if expected != item.producer_id {
                    warn!(
                        slot,
                        expected,
                        producer_id = item.producer_id,
                        "item from unexpected producer"
                    );
                }
            }

            if let Some(recorder) = self.recorder.as_mut() {
                recorder.record(&item)?;
                metrics.record_persisted();
            }

            self.cursors[slot] = Some(item.frame_id);
            metrics.record_delivered(start.elapsed());
            debug!(
                slot,
                producer_id = item.producer_id,
                frame_id = item.frame_id,
                "item delivered"
            );
            return Ok(Delivery::Item(item));
        }
    }

    /// Note in the recording that the last `received` deliveries never made it
    /// into a batch. Without a recorder this does nothing.
    pub fn mark_step_dropped(&mut self, received: usize, misses: usize) -> Result<()> {
        match self.recorder.as_mut() {
            Some(recorder) => recorder.record_dropped_step(received, misses),
            None => Ok(()),
        }
    }

    /// Close the attached recorder, if any
    pub fn finish(self) -> Result<Option<RecordingSummary>> {
        self.recorder.map(Recorder::close).transpose()
    }
}
