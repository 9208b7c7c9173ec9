pub mod collector;
pub mod metrics;
pub mod monitor;

pub use collector::{MetricsCollector, SlotSnapshot};
pub use metrics::SlotMetrics;
pub use monitor::StreamMonitor;
