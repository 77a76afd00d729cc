//! S5: relay mode never builds its own commands or acks, but it still
//! parses forwarded frames well enough to fold status reports into the
//! model — the same `parse_packet` + `Registry::ingest_status` path a
//! normal bridge connection uses, just fed from traffic that was already
//! written to the other side of the wire.

use cync_lan::model::Registry;
use cync_protocol::frame::{decode_frame, encode_frame, FrameDecode};
use cync_protocol::packet::{self, Packet};
use cync_protocol::status::{encode_status_records, StatusTuple};
use cync_protocol::device::{Device, DeviceKind};

#[test]
fn a_status_broadcast_observed_in_transit_updates_the_model_without_a_reply() {
    let mut registry = Registry::new();
    registry
        .add_device(Device::new(5, "Relay Lamp", DeviceKind::RgbBulb))
        .unwrap();

    let record = StatusTuple {
        device_id: 5,
        present: true,
        on: true,
        brightness: 70,
        color_temp: 40,
        rgb: (10, 20, 30),
    };
    let observed = encode_frame(0x83, &encode_status_records(&[record])).unwrap();

    let frame = match decode_frame(&observed).unwrap() {
        FrameDecode::Complete { frame, .. } => frame,
        FrameDecode::Incomplete => panic!("full frame must decode"),
    };

    let statuses = match packet::parse_packet(&frame).unwrap() {
        Packet::StatusBroadcast { statuses } => statuses,
        other => panic!("expected a status broadcast, got {other:?}"),
    };

    for status in &statuses {
        registry.ingest_status(
            status.device_id,
            status.present,
            status.on,
            status.brightness,
            status.color_temp,
            status.rgb,
        );
    }

    let device = registry.device(5).unwrap();
    assert!(device.online);
    assert!(device.state.on);
    assert_eq!(device.state.brightness, 70);
    assert_eq!(device.state.rgb, (10, 20, 30));
}

#[test]
fn a_data_channel_frame_observed_in_transit_is_never_acted_on_by_the_model() {
    // A relay only ever folds 0x43/0x83 reports into the model; a 0x73
    // command passing through is left alone — there's no device/command
    // coupling to demonstrate here beyond confirming it parses as data,
    // not as a status report, so ingestion code never sees it.
    let raw = cync_protocol::commands::encode_command(
        5,
        [0; 5],
        [0; 3],
        &cync_protocol::commands::Command::Power(true),
    )
    .unwrap();
    let frame = match decode_frame(&raw).unwrap() {
        FrameDecode::Complete { frame, .. } => frame,
        FrameDecode::Incomplete => panic!("full frame must decode"),
    };
    assert!(matches!(
        packet::parse_packet(&frame).unwrap(),
        Packet::DataChannel { .. }
    ));
}
