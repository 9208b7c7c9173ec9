use frametab::recording::{Recorder, ReplaySource};
use frametab::{Aux, Item, Payload, StreamError};
use std::collections::BTreeMap;
use tempfile::tempdir;

fn sample_item(producer_id: u32, frame_id: u64) -> Item {
    let mut attrs = BTreeMap::new();
    attrs.insert("scene".to_string(), "cube".to_string());

    Item::new(producer_id, frame_id)
        .with_payload(Payload::new(
            vec![2, 2, 4],
            (0..16).map(|i| (i as u64 + frame_id) as u8).collect(),
        ))
        .with_aux(Aux {
            points: vec![[frame_id as f32, 1.5], [0.25, -3.0]],
            attrs,
        })
}

#[test]
fn test_length_matches_record_calls() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.ftrec");

    let mut recorder = Recorder::create(&path).unwrap();
    for frame in 0..7 {
        recorder.record(&sample_item(frame as u32 % 2, frame)).unwrap();
    }
    assert_eq!(recorder.records(), 7);
    let summary = recorder.close().unwrap();
    assert_eq!(summary.records, 7);
    assert_eq!(summary.bytes, std::fs::metadata(&path).unwrap().len());

    let replay = ReplaySource::open(&path).unwrap();
    assert_eq!(replay.len(), 7);
}

#[test]
fn test_round_trip_preserves_every_field() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.ftrec");

    let items: Vec<Item> = (0..5).map(|f| sample_item(3, f)).collect();
    let mut recorder = Recorder::create(&path).unwrap();
    for item in &items {
        recorder.record(item).unwrap();
    }
    recorder.close().unwrap();

    let replay = ReplaySource::open(&path).unwrap();
    for (i, expected) in items.iter().enumerate() {
        assert_eq!(&replay.read(i).unwrap(), expected);
    }

    let replayed: Vec<Item> = replay.iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(replayed, items);
}

#[test]
fn test_read_is_idempotent_and_random_access() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.ftrec");

    let mut recorder = Recorder::create(&path).unwrap();
    for f in 0..4 {
        recorder.record(&sample_item(0, f)).unwrap();
    }
    recorder.close().unwrap();

    let replay = ReplaySource::open(&path).unwrap();
    let late = replay.read(3).unwrap();
    let early = replay.read(0).unwrap();
    assert_eq!(replay.read(3).unwrap(), late);
    assert_eq!(replay.read(0).unwrap(), early);

    // Clones share the mapping and read the same data
    let other = replay.clone();
    assert_eq!(other.read(2).unwrap(), replay.read(2).unwrap());
}

#[test]
fn test_out_of_range_read_has_no_side_effects() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.ftrec");

    let mut recorder = Recorder::create(&path).unwrap();
    recorder.record(&sample_item(0, 0)).unwrap();
    recorder.record(&sample_item(0, 1)).unwrap();
    recorder.close().unwrap();

    let replay = ReplaySource::open(&path).unwrap();
    for index in [2, 3, 100, usize::MAX] {
        match replay.read(index) {
            Err(StreamError::ReplayIndexOutOfRange { index: i, len }) => {
                assert_eq!(i, index);
                assert_eq!(len, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    assert_eq!(replay.len(), 2);
    assert_eq!(replay.read(1).unwrap().frame_id, 1);
}

#[test]
fn test_empty_recording_replays_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.ftrec");

    Recorder::create(&path).unwrap().close().unwrap();

    let replay = ReplaySource::open(&path).unwrap();
    assert!(replay.is_empty());
    assert!(replay.read(0).unwrap_err().is_end_of_stream());
}

#[test]
fn test_unfinalized_recording_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("aborted.ftrec");

    {
        let mut recorder = Recorder::create(&path).unwrap();
        recorder.record(&sample_item(0, 0)).unwrap();
        // dropped without close
    }

    match ReplaySource::open(&path) {
        Err(StreamError::ReplayCorruption { reason, .. }) => {
            assert!(reason.contains("not finalized"))
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_truncated_recording_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cut.ftrec");

    let mut recorder = Recorder::create(&path).unwrap();
    for f in 0..3 {
        recorder.record(&sample_item(1, f)).unwrap();
    }
    recorder.close().unwrap();

    let len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 20).unwrap();
    drop(file);

    let err = ReplaySource::open(&path).unwrap_err();
    assert!(matches!(err, StreamError::ReplayCorruption { .. }));
    assert!(!err.is_recoverable());
}

#[test]
fn test_corrupt_body_is_reported_on_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbled.ftrec");

    let mut recorder = Recorder::create(&path).unwrap();
    recorder.record(&sample_item(0, 0)).unwrap();
    recorder.close().unwrap();

    // Point the payload shape length at an absurd value; framing stays intact
    let mut bytes = std::fs::read(&path).unwrap();
    let body = 16 + 4;
    let shape_len_at = body + 4 + 8;
    bytes[shape_len_at..shape_len_at + 8].copy_from_slice(&u64::MAX.to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    let replay = ReplaySource::open(&path).unwrap();
    assert_eq!(replay.len(), 1);
    assert!(matches!(
        replay.read(0),
        Err(StreamError::ReplayCorruption { .. })
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = ReplaySource::open(dir.path().join("nope.ftrec")).unwrap_err();
    assert!(matches!(err, StreamError::Io { .. }));
}

#[test]
fn test_recorder_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/deeper/run.ftrec");

    let recorder = Recorder::create(&path).unwrap();
    assert_eq!(recorder.path(), path.as_path());
    recorder.close().unwrap();
    assert!(path.exists());
}

#[cfg(target_os = "linux")]
#[test]
fn test_failed_write_poisons_recorder() {
    let mut recorder = Recorder::create("/dev/full").unwrap();

    match recorder.record(&sample_item(0, 0)) {
        Err(StreamError::RecordingWrite { path, source }) => {
            assert_eq!(path, std::path::PathBuf::from("/dev/full"));
            assert_eq!(source.raw_os_error(), Some(28));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(recorder.records(), 0);

    assert!(matches!(
        recorder.record(&sample_item(0, 1)),
        Err(StreamError::RecordingWrite { .. })
    ));
    assert!(matches!(
        recorder.record_dropped_step(0, 1),
        Err(StreamError::RecordingWrite { .. })
    ));
    assert!(matches!(recorder.close(), Err(StreamError::RecordingWrite { .. })));
}
