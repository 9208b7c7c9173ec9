pub mod batch;

pub use batch::{Batch, BatchAssembler, BatchColumns, PayloadTransform};
