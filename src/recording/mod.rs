pub mod format;
pub mod recorder;
pub mod replay;

pub use format::DroppedStep;
pub use recorder::{Recorder, RecordingSummary};
pub use replay::ReplaySource;
