//! Home Assistant MQTT discovery document builders (spec.md §4.5, §6).
//!
//! Each function returns the JSON body published (retained) to
//! `<discovery_prefix>/<component>/<object_id>/config`. There is no
//! `zc-*` crate that does MQTT discovery — this module's shape is
//! grounded in `cync_protocol::device`'s capability model rather than a
//! teacher file, and its `serde_json::json!` construction style follows
//! `zc_cloud_api::events`'s use of the same macro for ad hoc JSON bodies.

use serde_json::{json, Value};

use cync_protocol::device::{Capability, Device, DeviceKind, Group};

use cync_protocol::topics;

/// The `device` block every discovery document repeats, grouping all of a
/// physical device's entities under one card in Home Assistant.
fn device_block(topic_prefix: &str, device_id: u8, name: &str) -> Value {
    json!({
        "identifiers": [format!("{topic_prefix}_device_{device_id}")],
        "name": name,
        "manufacturer": "cync-lan",
        "model": "mesh bridge",
    })
}

fn availability_block(topic_prefix: &str, device_id: u8) -> Value {
    json!({
        "topic": topics::device_availability(topic_prefix, device_id),
        "payload_available": "online",
        "payload_not_available": "offline",
    })
}

/// Build the discovery document(s) for a device, one per HA component its
/// kind maps onto. A bulb is a single `light`; a fan is a `light`-less
/// `fan` plus nothing else; a switch/plug is a single `switch`.
pub fn build_device_discovery(topic_prefix: &str, device: &Device) -> Vec<(String, String, Value)> {
    let object_id = format!("{topic_prefix}_{}", device.id);
    let state_topic = topics::device_state(topic_prefix, device.id);
    let command_topic = topics::device_set(topic_prefix, device.id);
    let availability = availability_block(topic_prefix, device.id);
    let dev = device_block(topic_prefix, device.id, &device.name);

    let component = match device.kind {
        DeviceKind::Bulb | DeviceKind::TunableWhiteBulb | DeviceKind::RgbBulb => "light",
        DeviceKind::Switch | DeviceKind::Plug => "switch",
        DeviceKind::FanController => "fan",
    };

    let mut document = json!({
        "name": device.name,
        "unique_id": object_id,
        "state_topic": state_topic,
        "command_topic": command_topic,
        "schema": "json",
        "availability": availability,
        "device": dev,
    });

    if !device.room.is_empty() {
        document["suggested_area"] = json!(device.room);
    }

    if device.supports(Capability::Brightness) {
        document["brightness"] = json!(true);
    }
    if device.supports(Capability::ColorTemp) {
        document["color_mode"] = json!(true);
        document["supported_color_modes"] = json!(["color_temp", "rgb"]);
    } else if device.supports(Capability::Rgb) {
        document["color_mode"] = json!(true);
        document["supported_color_modes"] = json!(["rgb"]);
    }

    vec![(component.to_string(), object_id, document)]
}

/// Build the discovery document for a group (spec.md §3 "Group", §4.5
/// "analogous for groups"). The component and capability fields are the
/// union of its members' — a group mixing a plain switch with a dimmable
/// bulb still advertises brightness, since at least one member can honor it.
pub fn build_group_discovery(topic_prefix: &str, group: &Group, members: &[&Device]) -> Vec<(String, String, Value)> {
    let object_id = format!("{topic_prefix}_group_{}", group.id);
    let state_topic = topics::group_state(topic_prefix, group.id);
    let command_topic = topics::group_set(topic_prefix, group.id);
    let availability = json!({
        "topic": topics::group_availability(topic_prefix, group.id),
        "payload_available": "online",
        "payload_not_available": "offline",
    });
    let dev = json!({
        "identifiers": [format!("{topic_prefix}_group_{}", group.id)],
        "name": group.name,
        "manufacturer": "cync-lan",
        "model": "group",
    });

    let has_brightness = members.iter().any(|d| d.supports(Capability::Brightness));
    let has_color_temp = members.iter().any(|d| d.supports(Capability::ColorTemp));
    let has_rgb = members.iter().any(|d| d.supports(Capability::Rgb));
    let has_fan = members.iter().any(|d| d.supports(Capability::FanSpeed));

    let component = if has_fan && !has_brightness { "fan" } else if members.iter().all(|d| matches!(d.kind, DeviceKind::Switch | DeviceKind::Plug)) {
        "switch"
    } else {
        "light"
    };

    let mut document = json!({
        "name": group.name,
        "unique_id": object_id,
        "state_topic": state_topic,
        "command_topic": command_topic,
        "schema": "json",
        "availability": availability,
        "device": dev,
    });

    if has_brightness {
        document["brightness"] = json!(true);
    }
    if has_color_temp {
        document["color_mode"] = json!(true);
        document["supported_color_modes"] = json!(["color_temp", "rgb"]);
    } else if has_rgb {
        document["color_mode"] = json!(true);
        document["supported_color_modes"] = json!(["rgb"]);
    }

    vec![(component.to_string(), object_id, document)]
}

/// Build discovery for the bridge's own operational entities (spec.md §4.5,
/// §6): binary sensors for "TCP server running", "devices connected", and
/// "MQTT connected"; buttons for "restart", "request mesh refresh", and
/// "start export"; and a `number: submit_otp` that writes the OTP to the
/// exporter's one-shot input.
pub fn build_bridge_entity_discovery(topic_prefix: &str) -> Vec<(String, String, Value)> {
    let dev = json!({
        "identifiers": [format!("{topic_prefix}_bridge")],
        "name": "cync-lan bridge",
        "manufacturer": "cync-lan",
        "model": "bridge",
    });
    let availability = json!({
        "topic": topics::bridge_availability(topic_prefix),
        "payload_available": "online",
        "payload_not_available": "offline",
    });

    let button = |entity: &str, name: &str| {
        (
            "button".to_string(),
            format!("{topic_prefix}_bridge_{entity}"),
            json!({
                "name": name,
                "unique_id": format!("{topic_prefix}_bridge_{entity}"),
                "command_topic": topics::bridge_entity_set(topic_prefix, entity),
                "availability": availability.clone(),
                "device": dev.clone(),
            }),
        )
    };

    let binary_sensor = |entity: &str, name: &str| {
        (
            "binary_sensor".to_string(),
            format!("{topic_prefix}_bridge_{entity}"),
            json!({
                "name": name,
                "unique_id": format!("{topic_prefix}_bridge_{entity}"),
                "state_topic": topics::bridge_entity_state(topic_prefix, entity),
                "payload_on": "ON",
                "payload_off": "OFF",
                "availability": availability.clone(),
                "device": dev.clone(),
            }),
        )
    };

    vec![
        binary_sensor("tcp_server_running", "TCP server running"),
        binary_sensor("devices_connected", "Devices connected"),
        binary_sensor("mqtt_connected", "MQTT connected"),
        button("restart", "Restart bridge"),
        button("request_mesh_refresh", "Request mesh refresh"),
        button("start_export", "Start roster export"),
        (
            "number".to_string(),
            format!("{topic_prefix}_bridge_submit_otp"),
            json!({
                "name": "Submit OTP",
                "unique_id": format!("{topic_prefix}_bridge_submit_otp"),
                "command_topic": topics::bridge_entity_set(topic_prefix, "submit_otp"),
                "min": 0,
                "max": 999999,
                "mode": "box",
                "availability": availability.clone(),
                "device": dev.clone(),
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cync_protocol::device::{Device, Group};

    #[test]
    fn group_discovery_unions_member_capabilities() {
        let dimmable = Device::new(1, "Lamp", DeviceKind::Bulb);
        let plain_switch = Device::new(2, "Outlet", DeviceKind::Switch);
        let group = Group::new(0x8000, "Living Room", vec![1, 2]);
        let docs = build_group_discovery("cync_lan", &group, &[&dimmable, &plain_switch]);
        let (component, object_id, doc) = &docs[0];
        assert_eq!(component, "light");
        assert_eq!(object_id, "cync_lan_group_32768");
        assert_eq!(doc["brightness"], json!(true));
    }

    #[test]
    fn group_of_only_switches_uses_switch_component() {
        let a = Device::new(1, "a", DeviceKind::Switch);
        let b = Device::new(2, "b", DeviceKind::Plug);
        let group = Group::new(0x8000, "Outlets", vec![1, 2]);
        let docs = build_group_discovery("cync_lan", &group, &[&a, &b]);
        assert_eq!(docs[0].0, "switch");
    }

    #[test]
    fn rgb_bulb_discovery_advertises_brightness_and_rgb() {
        let device = Device::new(1, "Lamp", DeviceKind::RgbBulb);
        let docs = build_device_discovery("cync_lan", &device);
        assert_eq!(docs.len(), 1);
        let (component, object_id, doc) = &docs[0];
        assert_eq!(component, "light");
        assert_eq!(object_id, "cync_lan_1");
        assert_eq!(doc["brightness"], json!(true));
        assert_eq!(doc["supported_color_modes"], json!(["color_temp", "rgb"]));
    }

    #[test]
    fn switch_discovery_has_no_brightness_field() {
        let device = Device::new(2, "Outlet", DeviceKind::Switch);
        let docs = build_device_discovery("cync_lan", &device);
        let (component, _, doc) = &docs[0];
        assert_eq!(component, "switch");
        assert!(doc.get("brightness").is_none());
    }

    #[test]
    fn fan_controller_discovery_uses_fan_component() {
        let device = Device::new(3, "Ceiling Fan", DeviceKind::FanController);
        let docs = build_device_discovery("cync_lan", &device);
        assert_eq!(docs[0].0, "fan");
    }

    #[test]
    fn bridge_entity_discovery_covers_every_operational_entity() {
        let docs = build_bridge_entity_discovery("cync_lan");
        assert_eq!(docs.len(), 7);
        assert!(docs.iter().any(|(c, id, _)| c == "button" && id.ends_with("restart")));
        assert!(docs.iter().any(|(c, id, _)| c == "button" && id.ends_with("request_mesh_refresh")));
        assert!(docs.iter().any(|(c, id, _)| c == "button" && id.ends_with("start_export")));
        assert!(docs.iter().any(|(c, id, _)| c == "binary_sensor" && id.ends_with("tcp_server_running")));
        assert!(docs.iter().any(|(c, id, _)| c == "binary_sensor" && id.ends_with("devices_connected")));
        assert!(docs.iter().any(|(c, id, _)| c == "binary_sensor" && id.ends_with("mqtt_connected")));
        assert!(docs.iter().any(|(c, id, _)| c == "number" && id.ends_with("submit_otp")));
    }
}
