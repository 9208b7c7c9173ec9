pub mod stream;

pub use stream::{IndexedStream, StreamLength, DEFAULT_RECEIVE_TIMEOUT, DEFAULT_STREAM_LENGTH};
