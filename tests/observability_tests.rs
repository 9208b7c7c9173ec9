use frametab::channel::LiveChannel;
use frametab::observability::{MetricsCollector, StreamMonitor};
use frametab::producer::ProducerHandle;
use frametab::Item;
use std::time::Duration;

#[test]
fn test_monitor_report() {
    let (tx0, h0) = ProducerHandle::channel(4);
    let (_tx1, h1) = ProducerHandle::channel(4);
    let mut channel = LiveChannel::new(vec![h0, h1]).unwrap();

    tx0.send(Item::new(0, 0)).unwrap();
    tx0.send(Item::new(0, 1)).unwrap();
    let timeout = Duration::from_millis(10);
    channel.receive(0, timeout).unwrap();
    channel.receive(0, timeout).unwrap();
    channel.receive(1, timeout).unwrap();

    let monitor = StreamMonitor::new(channel.metrics());
    let report = monitor.generate_report();

    assert!(report.contains("[slot 0]"));
    assert!(report.contains("[slot 1]"));
    assert!(report.contains("2 items"));
    assert!(report.contains("Missed: 1 receive\n"));
    assert_eq!(monitor.collector().total_delivered(), 2);
}

#[test]
fn test_empty_collector_report() {
    let monitor = StreamMonitor::new(MetricsCollector::new(0));
    assert_eq!(monitor.generate_report(), "No slots registered");
}

#[test]
fn test_snapshot_per_slot() {
    let collector = MetricsCollector::new(3);
    collector.slot(2).unwrap().record_delivered(Duration::from_micros(50));
    collector.slot(2).unwrap().record_persisted();

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[2].delivered, 1);
    assert_eq!(snapshot[2].recorded, 1);
    assert_eq!(snapshot[2].avg_wait_us, 50);
    assert_eq!(snapshot[0].delivered, 0);
    assert!(collector.slot(3).is_none());
}
