//! MQTT topic vocabulary (spec.md §4.5 "MQTT bridge"), in the same
//! pure-function style as `zc-protocol::topics` — every topic shape lives in
//! exactly one place so the publisher and the subscriber can never drift.

/// `<prefix>/device/<id>/state`
pub fn device_state(prefix: &str, device_id: u8) -> String {
    format!("{prefix}/device/{device_id}/state")
}

/// `<prefix>/device/<id>/set`
pub fn device_set(prefix: &str, device_id: u8) -> String {
    format!("{prefix}/device/{device_id}/set")
}

/// `<prefix>/device/<id>/availability`
pub fn device_availability(prefix: &str, device_id: u8) -> String {
    format!("{prefix}/device/{device_id}/availability")
}

/// `<prefix>/device/+/set` — the single wildcard subscription that covers
/// every device's command topic.
pub fn device_set_wildcard(prefix: &str) -> String {
    format!("{prefix}/device/+/set")
}

/// `<prefix>/group/<id>/state`
pub fn group_state(prefix: &str, group_id: u16) -> String {
    format!("{prefix}/group/{group_id}/state")
}

/// `<prefix>/group/<id>/set`
pub fn group_set(prefix: &str, group_id: u16) -> String {
    format!("{prefix}/group/{group_id}/set")
}

/// `<prefix>/group/<id>/availability`
pub fn group_availability(prefix: &str, group_id: u16) -> String {
    format!("{prefix}/group/{group_id}/availability")
}

/// `<prefix>/group/+/set`
pub fn group_set_wildcard(prefix: &str) -> String {
    format!("{prefix}/group/+/set")
}

/// `<prefix>/bridge/availability` — the bridge's own LWT topic.
pub fn bridge_availability(prefix: &str) -> String {
    format!("{prefix}/bridge/availability")
}

/// `<prefix>/bridge/<entity>/state` — operational entities (restart,
/// request_mesh_refresh, start_export, submit_otp).
pub fn bridge_entity_state(prefix: &str, entity: &str) -> String {
    format!("{prefix}/bridge/{entity}/state")
}

/// `<prefix>/bridge/<entity>/set`
pub fn bridge_entity_set(prefix: &str, entity: &str) -> String {
    format!("{prefix}/bridge/{entity}/set")
}

/// `<discovery_prefix>/<component>/<object_id>/config` — Home Assistant MQTT
/// discovery document topic.
pub fn discovery_config(discovery_prefix: &str, component: &str, object_id: &str) -> String {
    format!("{discovery_prefix}/{component}/{object_id}/config")
}

/// A topic broken back down into its parts, the inverse of the builders
/// above. Used by the incoming-message classifier so dispatch is a tuple
/// match rather than ad hoc string splitting at every call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub entity: String,
    pub id: String,
    pub action: String,
}

/// Parse `<prefix>/<entity>/<id>/<action>` back into its parts. Returns
/// `None` for anything that doesn't have exactly four `/`-separated
/// segments under the given prefix.
pub fn parse_topic(prefix: &str, topic: &str) -> Option<ParsedTopic> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let mut parts = rest.splitn(3, '/');
    let entity = parts.next()?.to_string();
    let id = parts.next()?.to_string();
    let action = parts.next()?.to_string();
    Some(ParsedTopic { entity, id, action })
}
