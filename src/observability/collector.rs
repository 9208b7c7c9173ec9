use super::SlotMetrics;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub slot: usize,
    pub delivered: u64,
    pub missed: u64,
    pub stale_dropped: u64,
    pub recorded: u64,
    pub avg_wait_us: u64,
}

/// Per-slot metrics table of one live channel
#[derive(Clone)]
pub struct MetricsCollector {
    slots: Arc<[Arc<SlotMetrics>]>,
}

impl MetricsCollector {
    pub fn new(num_slots: usize) -> Self {
        Self {
            slots: (0..num_slots).map(|s| Arc::new(SlotMetrics::new(s))).collect(),
        }
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, slot: usize) -> Option<&Arc<SlotMetrics>> {
        self.slots.get(slot)
    }

    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.slots
            .iter()
            .map(|m| SlotSnapshot {
                slot: m.slot(),
                delivered: m.delivered(),
                missed: m.missed(),
                stale_dropped: m.stale_dropped(),
                recorded: m.recorded(),
                avg_wait_us: m.avg_wait_us(),
            })
            .collect()
    }

    pub fn total_delivered(&self) -> u64 {
        self.slots.iter().map(|m| m.delivered()).sum()
    }

    pub fn total_missed(&self) -> u64 {
        self.slots.iter().map(|m| m.missed()).sum()
    }
}
