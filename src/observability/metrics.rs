use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for one live slot, shared between the channel and monitors
pub struct SlotMetrics {
    slot: usize,
    delivered: AtomicU64,
    missed: AtomicU64,
    stale_dropped: AtomicU64,
    recorded: AtomicU64,
    total_wait_us: AtomicU64,
    wait_samples: AtomicU64,
}

impl SlotMetrics {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            delivered: AtomicU64::new(0),
            missed: AtomicU64::new(0),
            stale_dropped: AtomicU64::new(0),
            recorded: AtomicU64::new(0),
            total_wait_us: AtomicU64::new(0),
            wait_samples: AtomicU64::new(0),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }

    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped.load(Ordering::Relaxed)
    }

    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn record_delivered(&self, waited: Duration) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.record_wait(waited);
    }

    pub fn record_missed(&self, waited: Duration) {
        self.missed.fetch_add(1, Ordering::Relaxed);
        self.record_wait(waited);
    }

    pub fn record_stale(&self) {
        self.stale_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persisted(&self) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_wait(&self, waited: Duration) {
        self.total_wait_us
            .fetch_add(waited.as_micros() as u64, Ordering::Relaxed);
        self.wait_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Mean time spent blocked in receive, delivered and missed alike
    pub fn avg_wait_us(&self) -> u64 {
        let samples = self.wait_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_wait_us.load(Ordering::Relaxed) / samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_average() {
        let metrics = SlotMetrics::new(0);
        assert_eq!(metrics.avg_wait_us(), 0);

        metrics.record_delivered(Duration::from_micros(100));
        metrics.record_missed(Duration::from_micros(300));

        assert_eq!(metrics.delivered(), 1);
        assert_eq!(metrics.missed(), 1);
        assert_eq!(metrics.avg_wait_us(), 200);
    }
}
