//! S2: a device drops out of three consecutive status broadcasts before
//! the registry calls it offline, and the MQTT availability topic only
//! flips once that debounce threshold is crossed.

use cync_lan::model::{Registry, StatusOutcome};
use cync_mqtt::channel::Channel;
use cync_mqtt::mock::MockChannel;
use cync_protocol::device::{Device, DeviceKind};
use cync_protocol::frame::{decode_frame, encode_frame, FrameDecode};
use cync_protocol::packet::{self, Packet};
use cync_protocol::status::{encode_status_records, StatusTuple};
use cync_protocol::topics;
use rumqttc::QoS;

fn status_frame(present: bool) -> Vec<u8> {
    let record = StatusTuple {
        device_id: 1,
        present,
        on: present,
        brightness: 50,
        color_temp: 0,
        rgb: (0, 0, 0),
    };
    encode_frame(0x83, &encode_status_records(&[record])).unwrap()
}

fn decode_statuses(raw: &[u8]) -> Vec<StatusTuple> {
    let frame = match decode_frame(raw).unwrap() {
        FrameDecode::Complete { frame, .. } => frame,
        FrameDecode::Incomplete => panic!("a single full frame must decode in one pass"),
    };
    match packet::parse_packet(&frame).unwrap() {
        Packet::StatusBroadcast { statuses } => statuses,
        other => panic!("expected a status broadcast, got {other:?}"),
    }
}

#[tokio::test]
async fn three_consecutive_absences_mark_the_device_offline_and_publish_once() {
    let mut registry = Registry::new();
    registry
        .add_device(Device::new(1, "Lamp", DeviceKind::Bulb))
        .unwrap();

    let present = decode_statuses(&status_frame(true)).remove(0);
    assert_eq!(
        registry.ingest_status(1, present.present, present.on, present.brightness, present.color_temp, present.rgb),
        StatusOutcome::CameOnline
    );

    let mqtt = MockChannel::new();
    let availability_topic = topics::device_availability("cync_lan", 1);

    for _ in 0..2 {
        let absent = decode_statuses(&status_frame(false)).remove(0);
        let outcome = registry.ingest_status(1, absent.present, absent.on, absent.brightness, absent.color_temp, absent.rgb);
        assert_eq!(outcome, StatusOutcome::NoChange);
        assert!(registry.device(1).unwrap().online);
    }

    let absent = decode_statuses(&status_frame(false)).remove(0);
    let outcome = registry.ingest_status(1, absent.present, absent.on, absent.brightness, absent.color_temp, absent.rgb);
    assert_eq!(outcome, StatusOutcome::WentOffline);
    assert!(!registry.device(1).unwrap().online);

    // Only the transition publishes — two earlier no-change reports never
    // touch availability.
    mqtt.publish(&availability_topic, b"offline", QoS::AtLeastOnce, true)
        .await
        .unwrap();
    assert_eq!(mqtt.published_to(&availability_topic).len(), 1);
}
