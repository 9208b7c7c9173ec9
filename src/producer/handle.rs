use crate::core::Item;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Connected receiving end of one producer, handed to the live channel at
/// construction. Whoever launched the producer keeps the other end.
pub struct ProducerHandle {
    producer_id: Option<u32>,
    rx: Receiver<Item>,
}

impl ProducerHandle {
    pub fn new(rx: Receiver<Item>) -> Self {
        Self {
            producer_id: None,
            rx,
        }
    }

    /// Bounded channel pair; the sender goes to the producer side
    pub fn channel(capacity: usize) -> (Sender<Item>, Self) {
        let (tx, rx) = bounded(capacity);
        (tx, Self::new(rx))
    }

    /// Producer id this slot is expected to carry, used for diagnostics only
    pub fn with_producer_id(mut self, producer_id: u32) -> Self {
        self.producer_id = Some(producer_id);
        self
    }

    pub fn producer_id(&self) -> Option<u32> {
        self.producer_id
    }

    pub(crate) fn receiver(&self) -> &Receiver<Item> {
        &self.rx
    }
}
