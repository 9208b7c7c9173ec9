use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque array blob carried by an item (e.g. an HxWxC 8-bit image)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payload {
    /// Dimensions, outermost first
    pub shape: Vec<u32>,

    /// Raw element bytes, row-major
    pub data: Vec<u8>,
}

impl Payload {
    pub fn new(shape: Vec<u32>, data: Vec<u8>) -> Self {
        Self { shape, data }
    }

    /// Number of elements implied by `shape`
    pub fn len_expected(&self) -> usize {
        self.shape.iter().map(|d| *d as usize).product()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Structured side data travelling with the payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aux {
    /// 2D coordinates, e.g. projected keypoints
    pub points: Vec<[f32; 2]>,

    /// Free-form producer annotations
    pub attrs: BTreeMap<String, String>,
}

/// Atomic unit flowing from a producer to the consumer.
///
/// `(producer_id, frame_id)` is unique within a live or recorded stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Identity of the originating producer process
    pub producer_id: u32,

    /// Per-producer monotonically increasing frame number
    pub frame_id: u64,

    pub payload: Payload,

    pub aux: Aux,
}

impl Item {
    pub fn new(producer_id: u32, frame_id: u64) -> Self {
        Self {
            producer_id,
            frame_id,
            payload: Payload::default(),
            aux: Aux::default(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_aux(mut self, aux: Aux) -> Self {
        self.aux = aux;
        self
    }

    /// `(producer_id, frame_id)` pair identifying this item
    pub fn key(&self) -> (u32, u64) {
        (self.producer_id, self.frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_expected_len() {
        let payload = Payload::new(vec![4, 3, 2], vec![0; 24]);
        assert_eq!(payload.len_expected(), 24);
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_item_builder() {
        let mut aux = Aux::default();
        aux.points.push([1.0, 2.0]);

        let item = Item::new(3, 7)
            .with_payload(Payload::new(vec![1], vec![9]))
            .with_aux(aux.clone());

        assert_eq!(item.key(), (3, 7));
        assert_eq!(item.payload.data, vec![9]);
        assert_eq!(item.aux, aux);
    }
}
