use crate::channel::Delivery;
use crate::core::{Aux, Item, Payload, Result, StreamError};
use crate::dataset::{IndexedStream, StreamLength};
use crate::recording::RecordingSummary;
use crate::resilience::DropPolicy;
use tracing::{debug, warn};

/// Per-item payload hook applied before batching (e.g. color correction)
pub type PayloadTransform = Box<dyn Fn(Payload) -> Payload + Send>;

/// Fixed-size group of items fetched for one step, in index order
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub step: u64,
    pub items: Vec<Item>,
}

/// Column-wise view handed to downstream consumers
#[derive(Debug, Clone, PartialEq)]
pub struct BatchColumns {
    pub payloads: Vec<Payload>,
    pub aux: Vec<Aux>,
    pub producer_ids: Vec<u32>,
    pub frame_ids: Vec<u64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn producer_ids(&self) -> Vec<u32> {
        self.items.iter().map(|i| i.producer_id).collect()
    }

    pub fn frame_ids(&self) -> Vec<u64> {
        self.items.iter().map(|i| i.frame_id).collect()
    }

    pub fn into_columns(self) -> BatchColumns {
        let mut columns = BatchColumns {
            payloads: Vec::with_capacity(self.items.len()),
            aux: Vec::with_capacity(self.items.len()),
            producer_ids: Vec::with_capacity(self.items.len()),
            frame_ids: Vec::with_capacity(self.items.len()),
        };
        for item in self.items {
            columns.producer_ids.push(item.producer_id);
            columns.frame_ids.push(item.frame_id);
            columns.payloads.push(item.payload);
            columns.aux.push(item.aux);
        }
        columns
    }
}

/// Pulls `batch_size` consecutive indices per step from an indexed stream.
///
/// Misses are handled by the configured `DropPolicy`. Running off the end of a
/// recording ends the stream; a trailing partial step is discarded.
///
/// Items are fetched in batch order, so a recording holds them in the order the
/// batches list them. A live step that fails leaves a dropped marker in the
/// recording and replay reports the same `IncompleteBatch` for it.
pub struct BatchAssembler {
    stream: IndexedStream,
    batch_size: usize,
    policy: DropPolicy,
    transform: Option<PayloadTransform>,
    next_index: usize,
    step: u64,
    /// Recorded dropped steps already replayed
    replayed_drops: usize,
    exhausted: bool,
}

impl BatchAssembler {
    pub fn new(stream: IndexedStream, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(StreamError::Config("batch_size must be positive".to_string()));
        }

        Ok(Self {
            stream,
            batch_size,
            policy: DropPolicy::default(),
            transform: None,
            next_index: 0,
            step: 0,
            replayed_drops: 0,
            exhausted: false,
        })
    }

    pub fn with_policy(mut self, policy: DropPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Payload) -> Payload + Send + 'static,
    {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn policy(&self) -> DropPolicy {
        self.policy
    }

    /// Index of the next step to be assembled
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Stream index the next step starts at
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn stream(&self) -> &IndexedStream {
        &self.stream
    }

    /// Steps a default iteration runs for.
    ///
    /// Live: whole batches within the soft length. Replay: enough steps to cover
    /// the recording, dropped steps included; iteration still stops early at its
    /// end.
    pub fn planned_steps(&self) -> u64 {
        let b = self.batch_size;
        match self.stream.length() {
            StreamLength::Open { soft } => (soft / b) as u64,
            StreamLength::Exact(len) => {
                let dropped = self.stream.dropped_steps();
                let dropped_records: usize = dropped.iter().map(|d| d.received).sum();
                (dropped.len() + len.saturating_sub(dropped_records).div_ceil(b)) as u64
            }
        }
    }

    /// Assemble the next step, ignoring the planned budget.
    ///
    /// `Ok(None)` means the stream is exhausted. `IncompleteBatch` is returned for
    /// a step that could not be filled; the following call moves on to the next
    /// step. Any other error ends the stream.
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.exhausted {
            return Ok(None);
        }

        let step = self.step;
        let filled = match self.recorded_drop(step) {
            Ok(Some(dropped)) => Err(dropped),
            Ok(None) => match self.policy {
                DropPolicy::RetrySlot { max_retries } => self.fill_retrying(step, max_retries),
                DropPolicy::SkipSlot { max_misses } => self.fill_skipping(step, max_misses),
            },
            Err(e) => Err(e),
        };

        match filled {
            Ok(Some(items)) => {
                self.step += 1;
                let batch = Batch { step, items };
                debug!(
                    step,
                    producer_ids = ?batch.producer_ids(),
                    frame_ids = ?batch.frame_ids(),
                    "batch assembled"
                );
                Ok(Some(batch))
            }
            Ok(None) => {
                self.exhausted = true;
                debug!(step, "stream exhausted");
                Ok(None)
            }
            Err(e) => {
                self.step += 1;
                if !e.is_recoverable() {
                    self.exhausted = true;
                    return Err(e);
                }

                warn!(step, error = %e, "step dropped");
                if let StreamError::IncompleteBatch { received, misses, .. } = &e {
                    if let Err(write) = self.stream.mark_step_dropped(*received, *misses) {
                        self.exhausted = true;
                        return Err(write);
                    }
                }
                Err(e)
            }
        }
    }

    /// Release the stream, finalizing a live recording if one is attached
    pub fn finish(self) -> Result<Option<RecordingSummary>> {
        self.stream.finish()
    }

    /// Replay a step the live run abandoned, if the next one starts at its marker
    fn recorded_drop(&mut self, step: u64) -> Result<Option<StreamError>> {
        let Some(dropped) = self.stream.dropped_steps().get(self.replayed_drops).copied() else {
            return Ok(None);
        };

        if dropped.start == self.next_index {
            self.replayed_drops += 1;
            self.next_index += dropped.received;
            return Ok(Some(StreamError::IncompleteBatch {
                step,
                received: dropped.received,
                expected: self.batch_size,
                misses: dropped.misses,
            }));
        }

        if dropped.start < self.next_index + self.batch_size {
            return Err(StreamError::Config(format!(
                "dropped step at record {} does not line up with batch size {}",
                dropped.start, self.batch_size
            )));
        }
        Ok(None)
    }

    /// Fill positions in order, re-polling a missed one in place before moving on
    fn fill_retrying(&mut self, step: u64, max_retries: usize) -> Result<Option<Vec<Item>>> {
        let base = self.next_index;
        let mut items = Vec::with_capacity(self.batch_size);
        let mut misses = 0;

        for index in base..base + self.batch_size {
            let mut retries = 0;
            loop {
                match self.fetch(index)? {
                    Some(Delivery::Item(item)) => {
                        items.push(item);
                        break;
                    }
                    Some(Delivery::Missed { .. }) => {
                        misses += 1;
                        if retries >= max_retries {
                            self.next_index = base + self.batch_size;
                            return Err(StreamError::IncompleteBatch {
                                step,
                                received: items.len(),
                                expected: self.batch_size,
                                misses,
                            });
                        }
                        retries += 1;
                        debug!(step, index, retries, "retrying missed slot");
                    }
                    None => return Ok(None),
                }
            }
        }

        self.next_index = base + self.batch_size;
        Ok(Some(items))
    }

    fn fill_skipping(&mut self, step: u64, max_misses: usize) -> Result<Option<Vec<Item>>> {
        let mut items = Vec::with_capacity(self.batch_size);
        let mut index = self.next_index;
        let mut misses = 0;

        while items.len() < self.batch_size {
            match self.fetch(index)? {
                Some(Delivery::Item(item)) => items.push(item),
                Some(Delivery::Missed { .. }) => {
                    misses += 1;
                    if misses > max_misses {
                        self.next_index = index + 1;
                        return Err(StreamError::IncompleteBatch {
                            step,
                            received: items.len(),
                            expected: self.batch_size,
                            misses,
                        });
                    }
                }
                None => return Ok(None),
            }
            index += 1;
        }

        self.next_index = index;
        Ok(Some(items))
    }

    /// `None` once a replay runs past its last record
    fn fetch(&mut self, index: usize) -> Result<Option<Delivery>> {
        let delivery = match self.stream.get(index) {
            Ok(delivery) => delivery,
            Err(e) if e.is_end_of_stream() => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(match delivery {
            Delivery::Item(mut item) => {
                if let Some(transform) = &self.transform {
                    item.payload = transform(std::mem::take(&mut item.payload));
                }
                Delivery::Item(item)
            }
            missed => missed,
        }))
    }
}

impl Iterator for BatchAssembler {
    type Item = Result<Batch>;

    /// Yields steps up to `planned_steps`
    fn next(&mut self) -> Option<Self::Item> {
        if self.step >= self.planned_steps() {
            return None;
        }
        self.next_batch().transpose()
    }
}
