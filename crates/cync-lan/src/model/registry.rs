//! Device/group registry (spec.md §3 "Data model" invariants).
//!
//! A single `tokio::sync::Mutex` around one `Registry` is the serialization
//! point spec.md §5 calls for: "the model mutex serializes all state
//! mutations". Every status update, command dispatch, and availability
//! change takes this lock, mutates, and publishes while still holding it —
//! mirroring `zc_cloud_api::state::AppState`'s single `RwLock<HashMap<..>>`
//! registry, except device/group uniqueness here is an enforced invariant
//! rather than just a map key.

use std::collections::HashMap;

use chrono::Utc;

use cync_protocol::device::{Device, Group};

use crate::error::{CyncError, CyncResult};

#[derive(Debug, Default)]
pub struct Registry {
    devices: HashMap<u8, Device>,
    groups: HashMap<u16, Group>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Insert a device, rejecting a duplicate id (spec.md §3 "device_id
    /// uniqueness").
    pub fn add_device(&mut self, device: Device) -> CyncResult<()> {
        if self.devices.contains_key(&device.id) {
            return Err(CyncError::ConfigInvalid(format!(
                "duplicate device id {}",
                device.id
            )));
        }
        self.devices.insert(device.id, device);
        Ok(())
    }

    pub fn add_group(&mut self, group: Group) -> CyncResult<()> {
        if self.groups.contains_key(&group.id) {
            return Err(CyncError::ConfigInvalid(format!(
                "duplicate group id {}",
                group.id
            )));
        }
        self.groups.insert(group.id, group);
        Ok(())
    }

    pub fn device(&self, id: u8) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn device_mut(&mut self, id: u8) -> Option<&mut Device> {
        self.devices.get_mut(&id)
    }

    pub fn group(&self, id: u16) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Apply a mesh status report for one device, per spec.md §4.4's
    /// ingestion rules. Returns what, if anything, should be published —
    /// the caller (the mesh-status handler) owns MQTT I/O so this stays a
    /// pure state transition the way `Device::mark_present`/`mark_absent`
    /// are pure.
    pub fn ingest_status(
        &mut self,
        device_id: u8,
        present: bool,
        on: bool,
        brightness: u8,
        color_temp: u8,
        rgb: (u8, u8, u8),
    ) -> StatusOutcome {
        let Some(device) = self.devices.get_mut(&device_id) else {
            return StatusOutcome::UnknownDevice;
        };

        if !present {
            return if device.mark_absent() {
                StatusOutcome::WentOffline
            } else {
                StatusOutcome::NoChange
            };
        }

        let was_offline = !device.online;
        device.mark_present(Utc::now());
        let pending = device.pending.is_some();
        device.apply_status(on, brightness, color_temp, rgb);

        if was_offline {
            StatusOutcome::CameOnline
        } else if pending {
            StatusOutcome::SuppressedWhilePending
        } else {
            StatusOutcome::StateChanged
        }
    }

    /// The groups `device_id` belongs to, so a member state change knows
    /// which aggregates need recomputing and republishing (spec.md §3
    /// "recomputed from members on every member change").
    pub fn groups_containing(&self, device_id: u8) -> Vec<u16> {
        self.groups
            .values()
            .filter(|g| g.member_ids.contains(&device_id))
            .map(|g| g.id)
            .collect()
    }

    /// Recompute a group's aggregate state from its current members
    /// (spec.md §3 "Group": on iff any member on; brightness = average of
    /// on members). Called after any member device change.
    pub fn group_aggregate(&self, group_id: u16) -> Option<(bool, u8)> {
        let group = self.groups.get(&group_id)?;
        let members: Vec<&Device> = group
            .member_ids
            .iter()
            .filter_map(|id| self.devices.get(id))
            .collect();
        let on = members.iter().any(|d| d.state.on);
        let on_members: Vec<&&Device> = members.iter().filter(|d| d.state.on).collect();
        let brightness = if on_members.is_empty() {
            0
        } else {
            let sum: u32 = on_members.iter().map(|d| d.state.brightness as u32).sum();
            (sum / on_members.len() as u32) as u8
        };
        Some((on, brightness))
    }

    /// Whether any member of `group_id` is currently online — the
    /// aggregate availability published on the group's own availability
    /// topic (spec.md §4.5 "analogous for groups"), mirroring the
    /// on-iff-any-member-on rule `group_aggregate` uses for state.
    pub fn group_any_online(&self, group_id: u16) -> Option<bool> {
        let group = self.groups.get(&group_id)?;
        Some(
            group
                .member_ids
                .iter()
                .filter_map(|id| self.devices.get(id))
                .any(|d| d.online),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    UnknownDevice,
    WentOffline,
    CameOnline,
    StateChanged,
    SuppressedWhilePending,
    NoChange,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cync_protocol::device::DeviceKind;

    fn registry_with_bulb(id: u8) -> Registry {
        let mut reg = Registry::new();
        reg.add_device(Device::new(id, "lamp", DeviceKind::Bulb)).unwrap();
        reg
    }

    #[test]
    fn duplicate_device_id_is_rejected() {
        let mut reg = registry_with_bulb(1);
        let err = reg.add_device(Device::new(1, "dup", DeviceKind::Plug));
        assert!(err.is_err());
    }

    #[test]
    fn presence_report_marks_device_online() {
        let mut reg = registry_with_bulb(1);
        let outcome = reg.ingest_status(1, true, true, 50, 0, (0, 0, 0));
        assert_eq!(outcome, StatusOutcome::CameOnline);
        assert!(reg.device(1).unwrap().online);
        assert!(reg.device(1).unwrap().state.on);
    }

    #[test]
    fn absence_is_debounced_before_going_offline() {
        let mut reg = registry_with_bulb(1);
        reg.ingest_status(1, true, true, 50, 0, (0, 0, 0));
        assert_eq!(
            reg.ingest_status(1, false, false, 0, 0, (0, 0, 0)),
            StatusOutcome::NoChange
        );
        assert_eq!(
            reg.ingest_status(1, false, false, 0, 0, (0, 0, 0)),
            StatusOutcome::NoChange
        );
        assert_eq!(
            reg.ingest_status(1, false, false, 0, 0, (0, 0, 0)),
            StatusOutcome::WentOffline
        );
        assert!(!reg.device(1).unwrap().online);
    }

    #[test]
    fn status_for_unknown_device_is_reported_as_such() {
        let mut reg = Registry::new();
        assert_eq!(
            reg.ingest_status(99, true, true, 1, 1, (1, 1, 1)),
            StatusOutcome::UnknownDevice
        );
    }

    #[test]
    fn status_is_suppressed_while_pending_and_unsuppressed_after() {
        use cync_protocol::commands::Command;

        let mut reg = registry_with_bulb(1);
        reg.ingest_status(1, true, true, 10, 0, (0, 0, 0));
        reg.device_mut(1)
            .unwrap()
            .begin_pending(Command::Power(false), [0, 0, 1], Utc::now());

        assert_eq!(
            reg.ingest_status(1, true, true, 99, 0, (0, 0, 0)),
            StatusOutcome::SuppressedWhilePending
        );
        assert_eq!(reg.device(1).unwrap().state.brightness, 10);

        reg.device_mut(1).unwrap().resolve_pending();
        assert_eq!(
            reg.ingest_status(1, true, true, 99, 0, (0, 0, 0)),
            StatusOutcome::StateChanged
        );
        assert_eq!(reg.device(1).unwrap().state.brightness, 99);
    }

    #[test]
    fn group_aggregate_on_if_any_member_on_and_averages_brightness() {
        let mut reg = Registry::new();
        reg.add_device(Device::new(1, "a", DeviceKind::Bulb)).unwrap();
        reg.add_device(Device::new(2, "b", DeviceKind::Bulb)).unwrap();
        reg.add_group(Group::new(0x8000, "room", vec![1, 2])).unwrap();

        reg.ingest_status(1, true, true, 40, 0, (0, 0, 0));
        reg.ingest_status(2, true, true, 60, 0, (0, 0, 0));

        let (on, brightness) = reg.group_aggregate(0x8000).unwrap();
        assert!(on);
        assert_eq!(brightness, 50);
    }

    #[test]
    fn group_aggregate_is_off_when_all_members_off() {
        let mut reg = Registry::new();
        reg.add_device(Device::new(1, "a", DeviceKind::Bulb)).unwrap();
        reg.add_group(Group::new(0x8000, "room", vec![1])).unwrap();
        reg.ingest_status(1, true, false, 0, 0, (0, 0, 0));

        let (on, brightness) = reg.group_aggregate(0x8000).unwrap();
        assert!(!on);
        assert_eq!(brightness, 0);
    }
}
