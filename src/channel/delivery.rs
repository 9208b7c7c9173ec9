use crate::core::{Item, Result, StreamError};
use std::time::Duration;

/// Outcome of a bounded-wait receive.
///
/// A miss is an expected, frequent condition (the producer is busy rendering) and
/// is therefore a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Item(Item),
    Missed { slot: usize, waited: Duration },
}

impl Delivery {
    pub fn is_missed(&self) -> bool {
        matches!(self, Self::Missed { .. })
    }

    pub fn item(&self) -> Option<&Item> {
        match self {
            Self::Item(item) => Some(item),
            Self::Missed { .. } => None,
        }
    }

    /// Convert a miss into `StreamError::ReceiveTimeout`
    pub fn into_item(self) -> Result<Item> {
        match self {
            Self::Item(item) => Ok(item),
            Self::Missed { slot, waited } => Err(StreamError::ReceiveTimeout {
                slot,
                timeout: waited,
            }),
        }
    }
}

impl From<Item> for Delivery {
    fn from(item: Item) -> Self {
        Self::Item(item)
    }
}
