//! Roster loading (spec.md §6 "Roster file (read-only input)").
//!
//! Reads the YAML roster once at startup and populates a fresh
//! [`Registry`](crate::model::Registry) from it. No hot reload — the
//! spec is explicit that the core doesn't watch the roster file, matching
//! `zc_fleet_agent::config::AgentConfig::from_file`'s one-shot load.

use cync_protocol::device::{Device, Group};
use cync_protocol::roster::Roster;

use crate::error::{CyncError, CyncResult};
use crate::model::Registry;

/// Read and parse the roster file at `path`.
pub fn load(path: &str) -> CyncResult<Roster> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CyncError::ConfigInvalid(format!("failed to read roster '{path}': {e}")))?;
    Roster::from_yaml_str(&contents)
        .map_err(|e| CyncError::ConfigInvalid(format!("failed to parse roster '{path}': {e}")))
}

/// Build a fresh [`Registry`] from a parsed roster, skipping devices
/// marked `enabled: false`.
pub fn build_registry(roster: &Roster) -> CyncResult<Registry> {
    let mut registry = Registry::new();

    for entry in &roster.devices {
        if !entry.enabled {
            continue;
        }
        let mut device = Device::new(entry.id, entry.name.clone(), entry.kind).with_room(entry.room.clone());
        if let Some(capabilities) = &entry.capabilities {
            device.capabilities = capabilities.clone();
        }
        registry
            .add_device(device)
            .map_err(|_| CyncError::ConfigInvalid(format!("duplicate device id {}", entry.id)))?;
    }

    for entry in &roster.groups {
        let group = Group::new(entry.id, entry.name.clone(), entry.members.clone());
        registry
            .add_group(group)
            .map_err(|_| CyncError::ConfigInvalid(format!("duplicate group id {}", entry.id)))?;
    }

    Ok(registry)
}

/// The set of endpoints the roster expects to see dial in as bridges, and
/// whether each should run in relay (MITM) mode (spec.md §4.6). Parsed
/// once at startup alongside the device/group registry.
#[derive(Debug, Clone)]
pub struct ExpectedBridge {
    pub endpoint: [u8; 4],
    pub relay: bool,
}

pub fn expected_bridges(roster: &Roster) -> CyncResult<Vec<ExpectedBridge>> {
    roster
        .bridges
        .iter()
        .map(|b| {
            b.endpoint_bytes()
                .map(|endpoint| ExpectedBridge {
                    endpoint,
                    relay: b.relay,
                })
                .map_err(|e| {
                    CyncError::ConfigInvalid(format!(
                        "invalid bridge endpoint '{}': {e}",
                        b.endpoint
                    ))
                })
        })
        .collect()
}
