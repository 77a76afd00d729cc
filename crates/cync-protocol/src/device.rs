//! Shared device/group data model (spec.md §3 "Data model").
//!
//! These types carry no I/O and no bridge/connection state — they're the
//! vocabulary the registry in `cync-lan::model` mutates and the vocabulary
//! `cync-mqtt`'s discovery builders read from. Keeping them here, alongside
//! the wire codec, mirrors `zc-protocol::device` holding `DeviceInfo` next to
//! the CAN/MQTT wire types it describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::{Command, MsgId};

/// A device stops being reported present in this many consecutive status
/// broadcasts before the registry marks it offline (spec.md §3 "debounced
/// offline marking").
pub const OFFLINE_THRESHOLD: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    Bulb,
    TunableWhiteBulb,
    RgbBulb,
    Plug,
    Switch,
    FanController,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    OnOff,
    Brightness,
    ColorTemp,
    Rgb,
    FanSpeed,
}

impl DeviceKind {
    /// The capability set a device of this kind is expected to advertise
    /// over MQTT discovery, absent an explicit roster override (spec.md §3
    /// lists the five recognized capabilities; this maps each device kind
    /// onto the subset it actually supports).
    pub fn default_capabilities(&self) -> Vec<Capability> {
        match self {
            DeviceKind::Bulb => vec![Capability::OnOff, Capability::Brightness],
            DeviceKind::TunableWhiteBulb => vec![
                Capability::OnOff,
                Capability::Brightness,
                Capability::ColorTemp,
            ],
            DeviceKind::RgbBulb => vec![
                Capability::OnOff,
                Capability::Brightness,
                Capability::ColorTemp,
                Capability::Rgb,
            ],
            DeviceKind::Plug => vec![Capability::OnOff],
            DeviceKind::Switch => vec![Capability::OnOff],
            DeviceKind::FanController => vec![Capability::OnOff, Capability::FanSpeed],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceState {
    pub on: bool,
    pub brightness: u8,
    pub color_temp: u8,
    pub rgb: (u8, u8, u8),
    pub fan_speed: u8,
}

/// A command sent to a device but not yet acknowledged. While this is
/// `Some`, incoming status for the device is ignored (spec.md §4.4 "stale
/// status suppression while pending") so a broadcast racing the ack can't
/// clobber the optimistic state the pipeline is about to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub command: Command,
    pub msg_id: MsgId,
    pub issued_at: DateTime<Utc>,
}

/// A mesh member (spec.md §3 "Device"). Devices that are also bridges are
/// linked to their live connection by `id` through the bridge pool in
/// `cync-lan::bridge` — the endpoint/queue_id/connection state belongs to
/// that pool, not to this struct, since the overwhelming majority of
/// devices are reached only indirectly via mesh reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: u8,
    pub name: String,
    pub room: String,
    pub kind: DeviceKind,
    pub capabilities: Vec<Capability>,
    pub state: DeviceState,
    pub online: bool,
    pub offline_count: u8,
    pub pending: Option<PendingCommand>,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    pub fn new(id: u8, name: impl Into<String>, kind: DeviceKind) -> Self {
        Device {
            id,
            name: name.into(),
            room: String::new(),
            capabilities: kind.default_capabilities(),
            kind,
            state: DeviceState::default(),
            online: false,
            offline_count: 0,
            pending: None,
            last_seen: Utc::now(),
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Record that this device was present in a status broadcast. Clears
    /// the offline debounce counter and marks it online.
    pub fn mark_present(&mut self, now: DateTime<Utc>) {
        self.offline_count = 0;
        self.online = true;
        self.last_seen = now;
    }

    /// Record that this device was absent from a status broadcast.
    /// Returns `true` the moment the device actually transitions to
    /// offline (the threshold-th consecutive miss), so the caller can
    /// publish an availability update exactly once.
    pub fn mark_absent(&mut self) -> bool {
        if !self.online {
            return false;
        }
        self.offline_count = self.offline_count.saturating_add(1);
        if self.offline_count >= OFFLINE_THRESHOLD {
            self.online = false;
            self.offline_count = 0;
            true
        } else {
            false
        }
    }

    /// Apply a freshly decoded status tuple, unless a command is still
    /// pending for this device (spec.md §4.4).
    pub fn apply_status(&mut self, on: bool, brightness: u8, color_temp: u8, rgb: (u8, u8, u8)) {
        if self.pending.is_some() {
            return;
        }
        self.state.on = on;
        self.state.brightness = brightness;
        self.state.color_temp = color_temp;
        self.state.rgb = rgb;
    }

    pub fn begin_pending(&mut self, command: Command, msg_id: MsgId, now: DateTime<Utc>) {
        self.pending = Some(PendingCommand {
            command,
            msg_id,
            issued_at: now,
        });
    }

    /// Clear the pending command and optimistically fold its effect into
    /// `state` (spec.md §5 "optimistic state application on ACK"). Call
    /// this only on the ack path — timeout/superseded/bridge-lost must use
    /// [`Device::discard_pending`] instead, since spec.md §7 requires a
    /// failed command to leave `state` untouched.
    pub fn resolve_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            match pending.command {
                Command::Power(on) => self.state.on = on,
                Command::Brightness(pct) => self.state.brightness = pct,
                Command::ColorTemp(pct) => self.state.color_temp = pct,
                Command::Rgb(r, g, b) => self.state.rgb = (r, g, b),
                Command::FanSpeed(speed) => self.state.fan_speed = speed,
                Command::Mode(_) | Command::QueryStatus => {}
            }
        }
    }

    /// Clear the pending command without applying it (spec.md §4.3 "on
    /// timeout, clears `pending_command` ... without mutating state", §7
    /// "a failed command does not modify device state").
    pub fn discard_pending(&mut self) {
        self.pending = None;
    }
}

/// The first group id in the device/group id space (spec.md §4.3).
pub const GROUP_ID_BASE: u16 = 0x8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: u16,
    pub name: String,
    pub member_ids: Vec<u8>,
}

impl Group {
    pub fn new(id: u16, name: impl Into<String>, member_ids: Vec<u8>) -> Self {
        Group {
            id,
            name: name.into(),
            member_ids,
        }
    }

    pub fn is_group_id(id: u16) -> bool {
        id >= GROUP_ID_BASE
    }
}
