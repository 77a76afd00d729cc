//! Turn an MQTT `.../set` JSON payload into the list of wire [`Command`]s
//! it implies (spec.md §4.5 "`/set` accepts a JSON payload
//! (`{"state":"ON","brightness":42,...}`) or plain `ON/OFF`").
//!
//! A single payload can name several capabilities at once (state +
//! brightness + color in the same message, as Home Assistant's light
//! component does); each becomes its own dispatched command since the
//! wire protocol has no multi-capability command shape.

use cync_protocol::commands::Command;

/// Parse `payload` into the ordered list of commands it requests. Power is
/// always dispatched first so a simultaneous `{"state":"ON","brightness":1}`
/// turns the light on before dimming it, matching how a physical switch
/// behaves.
pub fn commands_from_payload(payload: &serde_json::Value) -> Vec<Command> {
    let mut commands = Vec::new();

    if let Some(state) = payload.get("state").and_then(|v| v.as_str()) {
        commands.push(Command::Power(state.eq_ignore_ascii_case("on")));
    }

    if let Some(brightness) = payload.get("brightness").and_then(|v| v.as_u64()) {
        commands.push(Command::Brightness(brightness.min(100) as u8));
    }

    if let Some(color_temp) = payload.get("color_temp").and_then(|v| v.as_u64()) {
        commands.push(Command::ColorTemp(color_temp.min(100) as u8));
    }

    if let Some(rgb) = payload.get("rgb").and_then(|v| v.as_array()) {
        if let [r, g, b] = rgb.as_slice() {
            if let (Some(r), Some(g), Some(b)) = (r.as_u64(), g.as_u64(), b.as_u64()) {
                commands.push(Command::Rgb(r as u8, g as u8, b as u8));
            }
        }
    }

    if let Some(fan_speed) = payload.get("fan_speed").and_then(|v| v.as_u64()) {
        commands.push(Command::FanSpeed(fan_speed as u8));
    }

    if let Some(mode) = payload.get("mode").and_then(|v| v.as_u64()) {
        commands.push(Command::Mode(mode as u8));
    }

    commands
}
