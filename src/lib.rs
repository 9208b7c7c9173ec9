pub mod channel;
pub mod config;
pub mod core;
pub mod dataset;
pub mod engine;
pub mod observability;
pub mod producer;
pub mod recording;
pub mod resilience;
pub mod session;

pub use crate::core::{Aux, Item, Payload, Result, StreamError};
pub use config::{RunConfig, RunMode};
pub use session::Session;
