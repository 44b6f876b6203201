//! Event bus over real Unix sockets

use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use convertd::config::EventBusConfig;
use convertd::core::types::{DeviceMode, Orientation};
use convertd::streaming::{AcceptState, EventBus, EventKind, EventSubscriber, MAX_VALUE_LEN};
use tempfile::TempDir;

fn bus_config(dir: &TempDir) -> EventBusConfig {
    EventBusConfig {
        poll_interval_ms: 5,
        shutdown_grace_ms: 2000,
        ..EventBusConfig::with_socket(dir.path().join("events.sock"))
    }
}

fn subscribe(path: &Path) -> EventSubscriber {
    let sub = EventSubscriber::connect(path).unwrap();
    sub.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    sub
}

fn wait_for_clients(bus: &EventBus, n: usize) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while bus.client_count() != n {
        assert!(
            Instant::now() < deadline,
            "expected {} clients, have {}",
            n,
            bus.client_count()
        );
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn subscriber_receives_changes() {
    let dir = TempDir::new().unwrap();
    let config = bus_config(&dir);
    let mut bus = EventBus::start(&config).unwrap();

    let mut sub = subscribe(&config.socket_path);
    wait_for_clients(&bus, 1);

    assert_eq!(bus.broadcast_if_changed(DeviceMode::Laptop, Orientation::Landscape), 2);

    let mode = sub.next_event().unwrap().unwrap();
    assert_eq!(mode.kind, EventKind::Mode);
    assert_eq!(mode.value, "laptop");
    assert_eq!(mode.previous, None);

    let orientation = sub.next_event().unwrap().unwrap();
    assert_eq!(orientation.kind, EventKind::Orientation);
    assert_eq!(orientation.value, "landscape");

    // Unchanged state publishes nothing; a mode change carries the previous value
    assert_eq!(bus.broadcast_if_changed(DeviceMode::Laptop, Orientation::Landscape), 0);
    assert_eq!(bus.broadcast_if_changed(DeviceMode::Flat, Orientation::Landscape), 1);

    let flat = sub.next_event().unwrap().unwrap();
    assert_eq!(flat.value, "flat");
    assert_eq!(flat.previous.as_deref(), Some("laptop"));
    assert!(flat.timestamp >= mode.timestamp);
}

#[test]
fn disconnected_client_is_removed_others_keep_receiving() {
    let dir = TempDir::new().unwrap();
    let config = bus_config(&dir);
    let bus = EventBus::start(&config).unwrap();

    let mut subs: Vec<EventSubscriber> = (0..5).map(|_| subscribe(&config.socket_path)).collect();
    wait_for_clients(&bus, 5);

    drop(subs.remove(2));
    wait_for_clients(&bus, 4);

    let report = bus.publish(EventKind::Mode, "tent", Some("flat"));
    assert_eq!(report.delivered, 4);
    assert_eq!(report.dropped, 0);

    for sub in subs.iter_mut() {
        let event = sub.next_event().unwrap().unwrap();
        assert_eq!(event.value, "tent");
        assert_eq!(event.previous.as_deref(), Some("flat"));
    }
}

#[test]
fn publish_with_no_clients() {
    let dir = TempDir::new().unwrap();
    let bus = EventBus::start(&bus_config(&dir)).unwrap();
    let report = bus.publish(EventKind::Orientation, "portrait", None);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.dropped, 0);
    assert_eq!(bus.client_count(), 0);
}

#[test]
fn shutdown_notifies_and_removes_socket() {
    let dir = TempDir::new().unwrap();
    let config = bus_config(&dir);
    let mut bus = EventBus::start(&config).unwrap();

    let mut sub = subscribe(&config.socket_path);
    wait_for_clients(&bus, 1);
    bus.broadcast_if_changed(DeviceMode::Tablet, Orientation::Portrait);
    assert_eq!(sub.next_event().unwrap().unwrap().value, "tablet");
    assert_eq!(sub.next_event().unwrap().unwrap().value, "portrait");

    bus.shutdown();
    assert_eq!(bus.state(), AcceptState::Stopped);
    assert_eq!(bus.client_count(), 0);
    assert!(!config.socket_path.exists());

    let last = sub.next_event().unwrap().unwrap();
    assert_eq!(last.kind, EventKind::Mode);
    assert_eq!(last.value, "shutdown");
    assert_eq!(last.previous.as_deref(), Some("tablet"));
    assert!(sub.next_event().unwrap().is_none());
}

#[test]
fn stale_socket_from_previous_run_is_replaced() {
    let dir = TempDir::new().unwrap();
    let config = bus_config(&dir);

    drop(UnixListener::bind(&config.socket_path).unwrap());
    assert!(config.socket_path.exists());

    let bus = EventBus::start(&config).unwrap();
    let _sub = subscribe(&config.socket_path);
    wait_for_clients(&bus, 1);
}

#[test]
fn max_clients_is_enforced() {
    let dir = TempDir::new().unwrap();
    let config = EventBusConfig {
        max_clients: 2,
        ..bus_config(&dir)
    };
    let bus = EventBus::start(&config).unwrap();

    let _subs: Vec<EventSubscriber> = (0..3).map(|_| subscribe(&config.socket_path)).collect();
    wait_for_clients(&bus, 2);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(bus.client_count(), 2);
}

#[test]
fn client_that_never_reads_is_dropped_once_its_buffer_fills() {
    let dir = TempDir::new().unwrap();
    let config = bus_config(&dir);
    let bus = EventBus::start(&config).unwrap();

    let _stalled = UnixStream::connect(&config.socket_path).unwrap();
    wait_for_clients(&bus, 1);

    let value = "x".repeat(MAX_VALUE_LEN);
    let started = Instant::now();
    let mut publishes = 0;
    loop {
        let before = Instant::now();
        let report = bus.publish(EventKind::Orientation, &value, Some(&value));
        assert!(before.elapsed() < Duration::from_millis(500), "publish blocked");
        publishes += 1;

        if report.dropped > 0 {
            assert_eq!(report.dropped, 1);
            assert_eq!(report.delivered, 0);
            break;
        }
        assert_eq!(report.delivered, 1);
        assert!(
            publishes < 1_000_000 && started.elapsed() < Duration::from_secs(10),
            "client was never dropped"
        );
    }

    assert!(publishes > 1);
    assert_eq!(bus.client_count(), 0);

    let report = bus.publish(EventKind::Orientation, "landscape", None);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.dropped, 0);
}
