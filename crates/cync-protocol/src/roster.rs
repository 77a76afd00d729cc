//! The roster file shape (spec.md §6 "External interfaces" — YAML roster),
//! following the same "typed struct + `serde(default)`" idiom
//! `zc-fleet-agent::config::AgentConfig` uses for its TOML config. Loading
//! the file from disk is `cync-lan::roster`'s job; this module only owns the
//! shape so `cync-protocol` stays the single source of truth for what a
//! device/group/bridge looks like.

use serde::{Deserialize, Serialize};

use crate::device::{Capability, DeviceKind};

fn default_true() -> bool {
    true
}

/// A bridge's endpoint/credentials entry, read once at startup. The roster
/// does not assign a `queue_id` — that's learned live from the handshake
/// (spec.md §3 "Bridge connection"); the roster only needs to know which
/// endpoints are expected, for logging and for relay-mode device selection.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RosterBridge {
    /// 4-byte endpoint, hex-encoded (e.g. `"60b17c4a"`).
    pub endpoint: String,
    #[serde(default)]
    pub device_id: Option<u8>,
    #[serde(default)]
    pub relay: bool,
}

impl RosterBridge {
    /// Decode `endpoint` into the 4 raw bytes the handshake carries.
    pub fn endpoint_bytes(&self) -> Result<[u8; 4], std::num::ParseIntError> {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&self.endpoint[i * 2..i * 2 + 2], 16)?;
        }
        Ok(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RosterDevice {
    pub id: u8,
    pub name: String,
    #[serde(default)]
    pub room: String,
    pub kind: DeviceKind,
    /// Overrides the kind's default capability set, for devices with
    /// nonstandard capability combinations.
    #[serde(default)]
    pub capabilities: Option<Vec<Capability>>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RosterGroup {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub room: String,
    pub members: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Roster {
    #[serde(default)]
    pub bridges: Vec<RosterBridge>,
    #[serde(default)]
    pub devices: Vec<RosterDevice>,
    #[serde(default)]
    pub groups: Vec<RosterGroup>,
}

impl Roster {
    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_roster() {
        let yaml = r#"
bridges:
  - endpoint: "60b17c4a"
    device_id: 1
devices:
  - id: 1
    name: Living Room Lamp
    room: Living Room
    kind: bulb
groups:
  - id: 32768
    name: Living Room
    members: [1]
"#;
        let roster = Roster::from_yaml_str(yaml).unwrap();
        assert_eq!(roster.devices.len(), 1);
        assert_eq!(roster.devices[0].name, "Living Room Lamp");
        assert_eq!(roster.devices[0].room, "Living Room");
        assert!(roster.devices[0].enabled);
        assert_eq!(roster.groups[0].members, vec![1]);
        assert_eq!(roster.bridges[0].endpoint_bytes().unwrap(), [0x60, 0xb1, 0x7c, 0x4a]);
    }

    #[test]
    fn enabled_defaults_to_true_and_capabilities_default_to_none() {
        let yaml = "devices:\n  - id: 2\n    name: Fan\n    kind: fan-controller\n";
        let roster = Roster::from_yaml_str(yaml).unwrap();
        assert!(roster.devices[0].enabled);
        assert!(roster.devices[0].capabilities.is_none());
        assert_eq!(roster.devices[0].room, "");
    }

    #[test]
    fn empty_roster_parses_to_empty_vecs() {
        let roster = Roster::from_yaml_str("").unwrap();
        assert!(roster.devices.is_empty());
        assert!(roster.groups.is_empty());
        assert!(roster.bridges.is_empty());
    }

    #[test]
    fn round_trips_through_yaml() {
        let roster = Roster {
            bridges: vec![RosterBridge {
                endpoint: "deadbeef".into(),
                device_id: Some(1),
                relay: false,
            }],
            devices: vec![RosterDevice {
                id: 1,
                name: "Lamp".into(),
                room: "Office".into(),
                kind: DeviceKind::Bulb,
                capabilities: None,
                enabled: true,
            }],
            groups: vec![],
        };
        let yaml = roster.to_yaml_string().unwrap();
        let parsed = Roster::from_yaml_str(&yaml).unwrap();
        assert_eq!(roster, parsed);
    }

    #[test]
    fn relay_bridges_are_flagged() {
        let yaml = "bridges:\n  - endpoint: \"aabbccdd\"\n    relay: true\n";
        let roster = Roster::from_yaml_str(yaml).unwrap();
        assert!(roster.bridges[0].relay);
    }
}
