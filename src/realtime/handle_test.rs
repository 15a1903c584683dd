use super::*;
use serde_json::json;

fn handle_with_capacity(capacity: usize) -> RealtimeHandle {
    let mut config = RealtimeConfig::new("http://127.0.0.1:1");
    config.recent_event_capacity = capacity;
    RealtimeHandle::new(config)
}

fn event(name: &str, args: Vec<Value>) -> TransportEvent {
    TransportEvent::Event {
        name: name.to_owned(),
        args,
    }
}

// =============================================================================
// construction
// =============================================================================

#[test]
fn new_handle_is_idle_and_disconnected() {
    // Runs outside a runtime: building must not spawn anything.
    let handle = handle_with_capacity(10);
    assert_eq!(handle.status(), ConnectionStatus::default());
    assert!(!handle.is_connected());
    assert!(!handle.config().auto_connect);
}

#[test]
fn emit_before_connect_is_not_started() {
    let handle = handle_with_capacity(10);
    let err = handle.emit("join_room", vec![json!({"room_id": "r1"})]).unwrap_err();
    assert!(matches!(err, ConnectionError::NotStarted));
}

#[test]
fn disconnect_before_connect_is_noop() {
    let handle = handle_with_capacity(10);
    handle.disconnect();
    assert!(!handle.is_connected());
}

// =============================================================================
// transport callbacks
// =============================================================================

#[test]
fn connect_then_disconnect_transitions_in_order() {
    let handle = handle_with_capacity(10);
    let mut rx = handle.subscribe();

    handle.apply(TransportEvent::Connect { socket_id: "sock-1".into() });
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().connected);

    handle.apply(TransportEvent::Disconnect { reason: "transport close".into() });
    assert!(rx.has_changed().unwrap());
    assert!(!rx.borrow_and_update().connected);
}

#[test]
fn connect_error_does_not_change_connected() {
    let handle = handle_with_capacity(10);
    let mut rx = handle.subscribe();

    handle.apply(TransportEvent::ConnectError { message: "refused".into() });
    assert!(!rx.has_changed().unwrap());
    assert!(!handle.is_connected());

    handle.apply(TransportEvent::Connect { socket_id: "sock-1".into() });
    handle.apply(TransportEvent::ConnectError { message: "late error".into() });
    assert!(handle.is_connected());
}

#[test]
fn events_are_recorded_in_arrival_order() {
    let handle = handle_with_capacity(10);
    handle.apply(event("room_update", vec![json!({"players": 2})]));
    handle.apply(event("hand_update", vec![json!({"cards": []})]));

    let events = handle.recent_events();
    assert_eq!(
        events,
        vec![
            InboundEvent { name: "room_update".into(), args: vec![json!({"players": 2})] },
            InboundEvent { name: "hand_update".into(), args: vec![json!({"cards": []})] },
        ]
    );
}

#[test]
fn recent_events_drop_oldest_beyond_capacity() {
    let handle = handle_with_capacity(2);
    for name in ["a", "b", "c"] {
        handle.apply(event(name, Vec::new()));
    }
    let names: Vec<String> = handle.recent_events().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["b", "c"]);
}

#[test]
fn zero_capacity_records_nothing() {
    let handle = handle_with_capacity(0);
    let mut rx = handle.subscribe();
    handle.apply(event("system_message", vec![json!({"msg": "hi"})]));
    assert!(handle.recent_events().is_empty());
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn events_do_not_touch_connected() {
    let handle = handle_with_capacity(10);
    handle.apply(event("room_update", Vec::new()));
    assert!(!handle.is_connected());
}

#[test]
fn clones_share_status() {
    let handle = handle_with_capacity(10);
    let other = handle.clone();
    handle.apply(TransportEvent::Connect { socket_id: "sock-1".into() });
    assert!(other.is_connected());
}

// =============================================================================
// replaced workers
// =============================================================================

#[test]
fn disconnect_from_replaced_worker_does_not_clear_live_connection() {
    let handle = handle_with_capacity(10);
    let old = handle.recorder.next_worker();
    old.apply(TransportEvent::Connect { socket_id: "sock-old".into() });

    let new = handle.recorder.next_worker();
    new.apply(TransportEvent::Connect { socket_id: "sock-new".into() });
    old.apply(TransportEvent::Disconnect { reason: "io client disconnect".into() });
    assert!(handle.is_connected());

    new.apply(TransportEvent::Disconnect { reason: "transport close".into() });
    assert!(!handle.is_connected());
}

#[test]
fn replaced_worker_disconnect_applies_until_new_worker_connects() {
    let handle = handle_with_capacity(10);
    let old = handle.recorder.next_worker();
    old.apply(TransportEvent::Connect { socket_id: "sock-old".into() });

    let new = handle.recorder.next_worker();
    old.apply(TransportEvent::Disconnect { reason: "io client disconnect".into() });
    assert!(!handle.is_connected());

    new.apply(TransportEvent::Connect { socket_id: "sock-new".into() });
    assert!(handle.is_connected());
}

#[test]
fn replaced_worker_cannot_connect_or_record_events() {
    let handle = handle_with_capacity(10);
    let old = handle.recorder.next_worker();
    let _new = handle.recorder.next_worker();

    old.apply(TransportEvent::Connect { socket_id: "sock-old".into() });
    old.apply(event("room_update", Vec::new()));
    assert_eq!(handle.status(), ConnectionStatus::default());
}
