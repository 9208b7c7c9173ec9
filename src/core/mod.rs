pub mod error;
pub mod item;

pub use error::{Result, StreamError};
pub use item::{Aux, Item, Payload};
