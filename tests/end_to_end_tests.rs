use anyhow::Result;
use async_trait::async_trait;
use frametab::engine::Batch;
use frametab::producer::{FrameRenderer, PatternRenderer, ProducerConfig, ProducerGroup};
use frametab::resilience::DropPolicy;
use frametab::{Aux, Payload, RunConfig, RunMode, Session, StreamError};
use std::time::Duration;
use tempfile::tempdir;

/// Renders instantly except for one frame that takes `stall`
struct StallingRenderer {
    inner: PatternRenderer,
    stall_on: Option<u64>,
    stall: Duration,
}

#[async_trait]
impl FrameRenderer for StallingRenderer {
    async fn render(&mut self, frame_id: u64) -> Result<(Payload, Aux)> {
        if self.stall_on == Some(frame_id) {
            tokio::time::sleep(self.stall).await;
        }
        self.inner.render(frame_id).await
    }
}

fn collect_planned(mut session: Session) -> frametab::Result<(Session, Vec<Batch>)> {
    let batches = session.batches().collect::<frametab::Result<Vec<_>>>()?;
    Ok((session, batches))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_two_producers_pair_frames_by_step() {
    let producer_config = ProducerConfig {
        capacity: 64,
        max_frames: Some(10),
    };
    let (group, handles) =
        ProducerGroup::spawn(2, producer_config, |_| PatternRenderer::new(4, 4));

    let config = RunConfig {
        batch_size: 2,
        stream_length: 10,
        receive_timeout_ms: 5_000,
        ..RunConfig::default()
    };
    let session = Session::open(&config, handles).unwrap();

    let (session, batches) = tokio::task::spawn_blocking(move || collect_planned(session))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(batches.len(), 5);
    for (k, batch) in batches.iter().enumerate() {
        assert_eq!(batch.step, k as u64);
        assert_eq!(batch.producer_ids(), vec![0, 1]);
        assert_eq!(batch.frame_ids(), vec![k as u64, k as u64]);
    }

    let report = session.monitor().unwrap().generate_report();
    assert!(report.contains("[slot 0]"));
    assert!(report.contains("Delivered: 5 items"));

    assert!(session.finish().unwrap().is_none());
    let sent = group.shutdown().await.unwrap();
    assert!(sent.iter().all(|s| *s >= 5), "sent {:?}", sent);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_recorded_run_replays_identically() {
    let dir = tempdir().unwrap();
    let recording_path = dir.path().join("record.ftrec");

    let producer_config = ProducerConfig {
        capacity: 16,
        max_frames: Some(5),
    };
    let (group, handles) = ProducerGroup::spawn(2, producer_config, |id| {
        PatternRenderer::new(3 + id, 2).with_points(2)
    });

    let live_config = RunConfig {
        record: true,
        recording_path: recording_path.clone(),
        batch_size: 2,
        stream_length: 10,
        receive_timeout_ms: 5_000,
        ..RunConfig::default()
    };
    let session = Session::open(&live_config, handles).unwrap();
    let (session, live) = tokio::task::spawn_blocking(move || collect_planned(session))
        .await
        .unwrap()
        .unwrap();
    let summary = session.finish().unwrap().unwrap();
    assert_eq!(summary.records, 10);
    group.shutdown().await.unwrap();

    let replay_config = RunConfig {
        mode: RunMode::Replay,
        record: false,
        ..live_config
    };
    let session = Session::open(&replay_config, Vec::new()).unwrap();
    assert_eq!(session.mode(), RunMode::Replay);
    assert!(session.monitor().is_none());
    let (_, replayed) = collect_planned(session).unwrap();

    let flatten = |batches: &[Batch]| -> Vec<(u32, u64, Payload, Aux)> {
        batches
            .iter()
            .flat_map(|b| b.items.iter())
            .map(|i| (i.producer_id, i.frame_id, i.payload.clone(), i.aux.clone()))
            .collect()
    };
    assert_eq!(flatten(&live[..]).len(), 10);
    assert_eq!(flatten(&replayed[..]), flatten(&live[..]));
}

async fn run_stalled_step(policy: DropPolicy) -> Vec<frametab::Result<Batch>> {
    let producer_config = ProducerConfig {
        capacity: 32,
        max_frames: Some(8),
    };
    let (group, handles) = ProducerGroup::spawn(2, producer_config, |id| StallingRenderer {
        inner: PatternRenderer::new(2, 2),
        stall_on: (id == 1).then_some(3),
        stall: Duration::from_millis(1_500),
    });

    let config = RunConfig {
        batch_size: 2,
        stream_length: 8,
        receive_timeout_ms: 200,
        drop_policy: policy,
        ..RunConfig::default()
    };
    let mut session = Session::open(&config, handles).unwrap();

    let results = tokio::task::spawn_blocking(move || {
        (0..4).map(|_| session.next_batch().map(|b| b.unwrap())).collect::<Vec<_>>()
    })
    .await
    .unwrap();

    group.shutdown().await.unwrap();
    results
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stalled_producer_fails_step_under_retry_policy() {
    let results = run_stalled_step(DropPolicy::RetrySlot { max_retries: 1 }).await;

    for (k, result) in results[..3].iter().enumerate() {
        let batch = result.as_ref().unwrap();
        assert_eq!(batch.frame_ids(), vec![k as u64, k as u64]);
    }
    match &results[3] {
        Err(StreamError::IncompleteBatch { step, received, .. }) => {
            assert_eq!(*step, 3);
            assert_eq!(*received, 1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stalled_producer_skipped_under_skip_policy() {
    let results = run_stalled_step(DropPolicy::SkipSlot { max_misses: 2 }).await;

    for result in &results[..3] {
        assert_eq!(result.as_ref().unwrap().producer_ids(), vec![0, 1]);
    }
    let step3 = results[3].as_ref().unwrap();
    assert_eq!(step3.step, 3);
    assert_eq!(step3.len(), 2);
    assert_eq!(step3.producer_ids(), vec![0, 0]);
    assert_eq!(step3.frame_ids(), vec![3, 4]);
}

#[test]
fn test_modes_are_exclusive() {
    let (_tx, handle) = frametab::producer::ProducerHandle::channel(1);
    let config = RunConfig {
        mode: RunMode::Replay,
        ..RunConfig::default()
    };
    assert!(matches!(
        Session::open(&config, vec![handle]),
        Err(StreamError::Config(_))
    ));

    let config = RunConfig {
        mode: RunMode::Replay,
        record: true,
        ..RunConfig::default()
    };
    assert!(matches!(
        Session::open(&config, Vec::new()),
        Err(StreamError::Config(_))
    ));
}
