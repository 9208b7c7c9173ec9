//! Simulated producers standing in for external render workers.
//!
//! These run as tokio tasks and are meant for tests and the demo binary; the
//! live channel only ever sees the `ProducerHandle` they hand out.

use super::ProducerHandle;
use crate::core::{Aux, Item, Payload};
use anyhow::Result;
use async_trait::async_trait;
use crossbeam_channel::TrySendError;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Produces the payload of each frame
#[async_trait]
pub trait FrameRenderer: Send {
    async fn render(&mut self, frame_id: u64) -> Result<(Payload, Aux)>;
}

/// RGBA gradient image with a few points orbiting its centre
pub struct PatternRenderer {
    width: u32,
    height: u32,
    points: usize,
    delay: Duration,
}

impl PatternRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            points: 4,
            delay: Duration::ZERO,
        }
    }

    /// Simulated render time per frame
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_points(mut self, points: usize) -> Self {
        self.points = points;
        self
    }

    fn image(&self, frame_id: u64) -> Payload {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut data = Vec::with_capacity(w * h * 4);
        for y in 0..h {
            for x in 0..w {
                data.push(((x * 255) / w.max(1)) as u8);
                data.push(((y * 255) / h.max(1)) as u8);
                data.push((frame_id % 256) as u8);
                data.push(255);
            }
        }
        Payload::new(vec![self.height, self.width, 4], data)
    }

    fn points(&self, frame_id: u64) -> Vec<[f32; 2]> {
        let (cx, cy) = (self.width as f32 / 2.0, self.height as f32 / 2.0);
        let radius = cx.min(cy) * 0.5;
        (0..self.points)
            .map(|i| {
                let angle = frame_id as f32 * 0.1
                    + i as f32 * std::f32::consts::TAU / self.points.max(1) as f32;
                [cx + radius * angle.cos(), cy + radius * angle.sin()]
            })
            .collect()
    }
}

#[async_trait]
impl FrameRenderer for PatternRenderer {
    async fn render(&mut self, frame_id: u64) -> Result<(Payload, Aux)> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let aux = Aux {
            points: self.points(frame_id),
            ..Aux::default()
        };
        Ok((self.image(frame_id), aux))
    }
}

#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Bound of the producer to consumer channel
    pub capacity: usize,
    /// Stop after emitting this many frames
    pub max_frames: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            max_frames: None,
        }
    }
}

pub struct SimulatedProducer;

impl SimulatedProducer {
    /// Start emitting frames `0, 1, 2, ...` for `producer_id`.
    ///
    /// A full channel drops the frame rather than waiting for the consumer. The
    /// task ends on shutdown, after `max_frames`, or once the handle is dropped,
    /// and returns the number of frames that reached the channel.
    pub fn spawn<R>(
        producer_id: u32,
        mut renderer: R,
        config: ProducerConfig,
        mut shutdown: watch::Receiver<bool>,
    ) -> (ProducerHandle, JoinHandle<Result<u64>>)
    where
        R: FrameRenderer + 'static,
    {
        let (tx, handle) = ProducerHandle::channel(config.capacity);
        let handle = handle.with_producer_id(producer_id);

        let task = tokio::spawn(async move {
            let mut sent = 0u64;
            let mut frame_id = 0u64;

            loop {
                if config.max_frames.is_some_and(|max| frame_id >= max) {
                    break;
                }

                let rendered = tokio::select! {
                    _ = shutdown.changed() => break,
                    rendered = renderer.render(frame_id) => rendered?,
                };
                if *shutdown.borrow() {
                    break;
                }

                let (payload, aux) = rendered;
                let item = Item::new(producer_id, frame_id)
                    .with_payload(payload)
                    .with_aux(aux);

                match tx.try_send(item) {
                    Ok(()) => {
                        trace!(producer_id, frame_id, "frame published");
                        sent += 1;
                    }
                    Err(TrySendError::Full(_)) => {
                        debug!(producer_id, frame_id, "consumer behind, frame dropped");
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
                frame_id += 1;
            }

            Ok(sent)
        });

        (handle, task)
    }
}

/// A set of simulated producers sharing one shutdown signal
pub struct ProducerGroup {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<Result<u64>>>,
}

impl ProducerGroup {
    /// Spawn `count` producers with ids `0..count`
    pub fn spawn<R, F>(
        count: u32,
        config: ProducerConfig,
        mut make_renderer: F,
    ) -> (Self, Vec<ProducerHandle>)
    where
        R: FrameRenderer + 'static,
        F: FnMut(u32) -> R,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(count as usize);
        let mut tasks = Vec::with_capacity(count as usize);

        for producer_id in 0..count {
            let (handle, task) = SimulatedProducer::spawn(
                producer_id,
                make_renderer(producer_id),
                config.clone(),
                shutdown_rx.clone(),
            );
            handles.push(handle);
            tasks.push(task);
        }

        (Self { shutdown_tx, tasks }, handles)
    }

    /// Signal every producer to stop and collect frames sent per producer
    pub async fn shutdown(self) -> Result<Vec<u64>> {
        let _ = self.shutdown_tx.send(true);
        let mut sent = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            sent.push(task.await??);
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pattern_renderer_shape() {
        let mut renderer = PatternRenderer::new(8, 6).with_points(3);
        let (payload, aux) = renderer.render(2).await.unwrap();

        assert_eq!(payload.shape, vec![6, 8, 4]);
        assert_eq!(payload.data.len(), payload.len_expected());
        assert_eq!(aux.points.len(), 3);
    }

    #[tokio::test]
    async fn test_producer_stops_after_max_frames() {
        let (_tx, rx) = watch::channel(false);
        let config = ProducerConfig {
            capacity: 16,
            max_frames: Some(5),
        };
        let (handle, task) = SimulatedProducer::spawn(7, PatternRenderer::new(2, 2), config, rx);

        assert_eq!(task.await.unwrap().unwrap(), 5);

        let frames: Vec<u64> = handle.receiver().try_iter().map(|i| i.frame_id).collect();
        assert_eq!(frames, vec![0, 1, 2, 3, 4]);
        assert_eq!(handle.producer_id(), Some(7));
    }

    #[tokio::test]
    async fn test_full_channel_drops_frames() {
        let (_tx, rx) = watch::channel(false);
        let config = ProducerConfig {
            capacity: 2,
            max_frames: Some(6),
        };
        let (handle, task) = SimulatedProducer::spawn(0, PatternRenderer::new(1, 1), config, rx);

        assert_eq!(task.await.unwrap().unwrap(), 2);
        let frames: Vec<u64> = handle.receiver().try_iter().map(|i| i.frame_id).collect();
        assert_eq!(frames, vec![0, 1]);
    }
}
