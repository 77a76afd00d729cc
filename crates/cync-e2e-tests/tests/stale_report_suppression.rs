//! S3: while a command is pending on a device, a status report that
//! arrives before the ack must not clobber the optimistic value — the
//! report is accepted (the device is still online) but its value is
//! discarded until the pending command resolves.

use cync_lan::model::{Registry, StatusOutcome};
use cync_protocol::commands::Command;
use cync_protocol::device::{Device, DeviceKind};

#[test]
fn a_status_report_racing_a_pending_command_does_not_overwrite_the_optimistic_value() {
    let mut registry = Registry::new();
    registry
        .add_device(Device::new(1, "Lamp", DeviceKind::Bulb))
        .unwrap();
    registry.ingest_status(1, true, false, 10, 0, (0, 0, 0));

    // A brightness command is dispatched and marked pending, optimistically
    // setting brightness to 80 before any ack has come back.
    registry
        .device_mut(1)
        .unwrap()
        .begin_pending(Command::Brightness(80), [0, 0, 5], chrono::Utc::now());
    registry.device_mut(1).unwrap().apply_status(false, 80, 0, (0, 0, 0));
    assert_eq!(registry.device(1).unwrap().state.brightness, 80);

    // A stale report (the mesh's own last poll, still reflecting the old
    // brightness) arrives before the ack.
    let outcome = registry.ingest_status(1, true, false, 10, 0, (0, 0, 0));
    assert_eq!(outcome, StatusOutcome::SuppressedWhilePending);
    assert_eq!(registry.device(1).unwrap().state.brightness, 80);
    assert!(registry.device(1).unwrap().online);

    // Once the ack resolves the pending command, subsequent reports apply
    // normally again.
    registry.device_mut(1).unwrap().resolve_pending();
    let outcome = registry.ingest_status(1, true, false, 80, 0, (0, 0, 0));
    assert_eq!(outcome, StatusOutcome::StateChanged);

    let outcome = registry.ingest_status(1, true, false, 30, 0, (0, 0, 0));
    assert_eq!(outcome, StatusOutcome::StateChanged);
    assert_eq!(registry.device(1).unwrap().state.brightness, 30);
}

#[test]
fn a_rejected_busy_command_never_begins_pending_and_so_never_suppresses_reports() {
    let mut registry = Registry::new();
    registry
        .add_device(Device::new(1, "Lamp", DeviceKind::Bulb))
        .unwrap();
    registry.ingest_status(1, true, false, 10, 0, (0, 0, 0));

    // Brightness/color/rgb commands reject outright while one is pending —
    // they never call `begin_pending` a second time, so there is nothing
    // here to discard; this just documents that `coalesces()` is what
    // decides whether a second pending ever exists.
    assert!(!Command::Brightness(50).coalesces());
    assert!(!registry.device(1).unwrap().pending.is_some());
}
