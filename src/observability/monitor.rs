use super::MetricsCollector;

pub struct StreamMonitor {
    collector: MetricsCollector,
}

impl StreamMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.collector.snapshot();

        if snapshot.is_empty() {
            return "No slots registered".to_string();
        }

        let mut report = String::from("=== Live Channel Metrics ===\n");

        for slot in &snapshot {
            report.push_str(&format!(
                "\n[slot {}]\n  Delivered: {} items\n  Missed: {}\n  Stale dropped: {}\n  Recorded: {}\n  Avg Wait: {}μs\n",
                slot.slot,
                slot.delivered,
                if slot.missed == 1 {
                    "1 receive".to_string()
                } else {
                    format!("{} receives", slot.missed)
                },
                slot.stale_dropped,
                slot.recorded,
                slot.avg_wait_us
            ));
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
