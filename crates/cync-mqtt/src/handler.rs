//! Incoming message classification, mirroring `zc_mqtt_channel::handler` —
//! turns a raw `rumqttc::Publish` into a typed variant so the command
//! pipeline dispatches on an enum instead of topic strings.

use rumqttc::Publish;

use cync_protocol::topics;

#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    DeviceSet { device_id: u8, payload: serde_json::Value },
    GroupSet { group_id: u16, payload: serde_json::Value },
    BridgeEntitySet { entity: String, payload: serde_json::Value },
    Unknown { topic: String, payload: Vec<u8> },
}

pub fn classify(topic_prefix: &str, publish: &Publish) -> IncomingMessage {
    let topic = &publish.topic;
    let payload = &publish.payload;

    let Some(parsed) = topics::parse_topic(topic_prefix, topic) else {
        return unknown(topic, payload);
    };

    if parsed.action != "set" {
        return unknown(topic, payload);
    }

    // `.../set` accepts either a JSON object (`{"state":"ON","brightness":42}`)
    // or a bare `ON`/`OFF` string (spec.md §4.5) — the latter never parses
    // as JSON on its own, so it's normalized into `{"state": "..."}` first.
    let value = match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(value) => value,
        Err(_) => match std::str::from_utf8(payload) {
            Ok(text) if is_plain_state(text) => {
                serde_json::json!({ "state": text.trim().to_uppercase() })
            }
            _ => return unknown(topic, payload),
        },
    };

    match parsed.entity.as_str() {
        "device" => match parsed.id.parse::<u8>() {
            Ok(device_id) => IncomingMessage::DeviceSet { device_id, payload: value },
            Err(_) => unknown(topic, payload),
        },
        "group" => match parsed.id.parse::<u16>() {
            Ok(group_id) => IncomingMessage::GroupSet { group_id, payload: value },
            Err(_) => unknown(topic, payload),
        },
        "bridge" => IncomingMessage::BridgeEntitySet {
            entity: parsed.id,
            payload: value,
        },
        _ => unknown(topic, payload),
    }
}

fn is_plain_state(text: &str) -> bool {
    matches!(text.trim().to_uppercase().as_str(), "ON" | "OFF")
}

fn unknown(topic: &str, payload: &[u8]) -> IncomingMessage {
    IncomingMessage::Unknown {
        topic: topic.to_string(),
        payload: payload.to_vec(),
    }
}
