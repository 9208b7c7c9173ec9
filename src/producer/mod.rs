pub mod handle;
pub mod mock;

pub use handle::ProducerHandle;
pub use mock::{FrameRenderer, PatternRenderer, ProducerConfig, ProducerGroup, SimulatedProducer};
