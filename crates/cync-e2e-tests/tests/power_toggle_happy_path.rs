//! S1: a device reports present/off, a `set` payload requests `ON`, the
//! encoded command round-trips through the wire layer, and once the bridge
//! would ack it the registry reflects the new state and the right MQTT
//! topics would be republished.

use cync_lan::command::{commands_from_payload, Target};
use cync_lan::model::Registry;
use cync_mqtt::channel::{Channel, DeviceStatePayload};
use cync_mqtt::mock::MockChannel;
use cync_protocol::commands::{self, Command};
use cync_protocol::device::{Device, DeviceKind};
use cync_protocol::frame::{decode_frame, FrameDecode};
use cync_protocol::packet::{self, Packet};
use cync_protocol::topics;
use rumqttc::QoS;

#[test]
fn set_on_payload_yields_a_single_power_command() {
    let payload = serde_json::json!({"state": "ON"});
    assert_eq!(commands_from_payload(&payload), vec![Command::Power(true)]);
}

#[test]
fn power_command_round_trips_through_the_full_wire_stack() {
    let queue_id = [1, 2, 3, 4, 5];
    let msg_id = [0, 0, 1];
    let raw = commands::encode_command(7, queue_id, msg_id, &Command::Power(true)).unwrap();

    let frame = match decode_frame(&raw).unwrap() {
        FrameDecode::Complete { frame, .. } => frame,
        FrameDecode::Incomplete => panic!("a fully encoded frame must decode in one pass"),
    };

    match packet::parse_packet(&frame).unwrap() {
        Packet::DataChannel {
            target_id,
            queue_id: decoded_queue,
            msg_id: decoded_msg,
            command,
        } => {
            assert_eq!(target_id, 7);
            assert_eq!(decoded_queue, queue_id);
            assert_eq!(decoded_msg, msg_id);
            assert_eq!(command, Command::Power(true));
        }
        other => panic!("expected a data channel packet, got {other:?}"),
    }
}

#[tokio::test]
async fn acked_power_command_updates_registry_and_would_republish_retained_state() {
    let mut registry = Registry::new();
    registry
        .add_device(Device::new(1, "Lamp", DeviceKind::Bulb))
        .unwrap();

    // Device currently reports off.
    registry.ingest_status(1, true, false, 0, 0, (0, 0, 0));
    assert!(!registry.device(1).unwrap().state.on);

    // The pipeline marks the device pending before the frame is sent...
    let msg_id = [0, 0, 7];
    registry
        .device_mut(1)
        .unwrap()
        .begin_pending(Command::Power(true), msg_id, chrono::Utc::now());

    // ...and once the ack arrives, folds the optimistic value into state.
    registry.device_mut(1).unwrap().resolve_pending();
    assert!(registry.device(1).unwrap().state.on);

    // The device-facing side republishes retained state on every change.
    let mqtt = MockChannel::new();
    let topic = topics::device_state("cync_lan", 1);
    let state = DeviceStatePayload::from(registry.device(1).unwrap().state);
    mqtt.publish(&topic, &serde_json::to_vec(&state).unwrap(), QoS::AtLeastOnce, true)
        .await
        .unwrap();

    let published = mqtt.last_published().unwrap();
    assert_eq!(published.topic, "cync_lan/device/1/state");
    assert!(published.retain);
    let decoded: serde_json::Value = serde_json::from_slice(&published.payload).unwrap();
    assert_eq!(decoded["on"], true);
}

#[test]
fn device_and_group_targets_carry_distinct_wire_ids() {
    assert!(matches!(Target::Device(1), Target::Device(1)));
    assert!(matches!(Target::Group(0x8000), Target::Group(0x8000)));
}
