//! Inner command kinds carried inside the `0x7E` envelope of a `0x73`
//! data-channel frame, and the encoder that assembles a full `0x73` frame
//! from a target, queue id, message id and capability command (spec.md
//! §4.1 "Encoder contract", §4.2 "Commands").
//!
//! The three inner command prefixes spec.md calls out by name
//! (`POWER_TOGGLE`, `SET_MODE`, `QUERY_STATUS`) are exact. The remaining
//! capability commands (brightness, color temperature, RGB, fan speed) are
//! data whose on-the-wire prefixes spec.md leaves unspecified beyond "they
//! follow the same envelope shape" — this module assigns them consistent
//! prefixes from the same `f8 xx xx` family and documents the choice in
//! DESIGN.md rather than guessing at undocumented vendor bytes.

use crate::checksum;
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame;

pub const POWER_TOGGLE: [u8; 3] = [0xf8, 0xd0, 0x0d];
pub const SET_MODE: [u8; 3] = [0xf8, 0x8e, 0x0c];
pub const QUERY_STATUS: [u8; 3] = [0xf8, 0x52, 0x06];
pub const SET_BRIGHTNESS: [u8; 3] = [0xf8, 0xd2, 0x0f];
pub const SET_COLOR_TEMP: [u8; 3] = [0xf8, 0xe2, 0x0f];
pub const SET_RGB: [u8; 3] = [0xf8, 0xf0, 0x10];
pub const SET_FAN_SPEED: [u8; 3] = [0xf8, 0x97, 0x0c];

/// A capability-level command, independent of wire encoding. This is what
/// the command pipeline in `cync-lan` builds from an MQTT `set` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Power(bool),
    Mode(u8),
    QueryStatus,
    Brightness(u8),
    ColorTemp(u8),
    Rgb(u8, u8, u8),
    FanSpeed(u8),
}

impl Command {
    /// Whether two in-flight commands of this shape coalesce (the newer one
    /// simply supersedes the older, no rejection) or must reject a busy
    /// target (spec.md §5 "Coalesce vs reject policy").
    pub fn coalesces(&self) -> bool {
        matches!(self, Command::Power(_) | Command::FanSpeed(_) | Command::Mode(_))
    }

    fn prefix(&self) -> [u8; 3] {
        match self {
            Command::Power(_) => POWER_TOGGLE,
            Command::Mode(_) => SET_MODE,
            Command::QueryStatus => QUERY_STATUS,
            Command::Brightness(_) => SET_BRIGHTNESS,
            Command::ColorTemp(_) => SET_COLOR_TEMP,
            Command::Rgb(..) => SET_RGB,
            Command::FanSpeed(_) => SET_FAN_SPEED,
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        match self {
            Command::Power(on) => vec![if *on { 0x01 } else { 0x00 }],
            Command::Mode(m) => vec![*m],
            Command::QueryStatus => vec![],
            Command::Brightness(pct) => vec![*pct],
            Command::ColorTemp(pct) => vec![*pct],
            Command::Rgb(r, g, b) => vec![*r, *g, *b],
            Command::FanSpeed(speed) => vec![*speed],
        }
    }

    /// The full command-prefix + value bytes, as carried inside the
    /// checksummed portion of the inner envelope.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.prefix().to_vec();
        bytes.extend(self.value_bytes());
        bytes
    }

    /// Recover a `Command` from its wire bytes (prefix + value).
    pub fn from_bytes(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() < 3 {
            return Err(ProtocolError::UnknownCommandPrefix);
        }
        let prefix = [bytes[0], bytes[1], bytes[2]];
        let value = &bytes[3..];

        let need = |n: usize| -> ProtocolResult<()> {
            if value.len() < n {
                Err(ProtocolError::PayloadTooShort {
                    packet_type: 0x73,
                    need: n,
                    got: value.len(),
                })
            } else {
                Ok(())
            }
        };

        match prefix {
            POWER_TOGGLE => {
                need(1)?;
                Ok(Command::Power(value[0] != 0))
            }
            SET_MODE => {
                need(1)?;
                Ok(Command::Mode(value[0]))
            }
            QUERY_STATUS => Ok(Command::QueryStatus),
            SET_BRIGHTNESS => {
                need(1)?;
                Ok(Command::Brightness(value[0]))
            }
            SET_COLOR_TEMP => {
                need(1)?;
                Ok(Command::ColorTemp(value[0]))
            }
            SET_RGB => {
                need(3)?;
                Ok(Command::Rgb(value[0], value[1], value[2]))
            }
            SET_FAN_SPEED => {
                need(1)?;
                Ok(Command::FanSpeed(value[0]))
            }
            _ => Err(ProtocolError::UnknownCommandPrefix),
        }
    }
}

/// `queue_id` is a 5-byte bridge-assigned routing field; `msg_id` is the
/// 3-byte counter used to correlate the eventual `0x7B` ack.
pub type QueueId = [u8; 5];
pub type MsgId = [u8; 3];

/// Assemble a full `0x73` data-channel frame addressed to `target_id`
/// (a device id or, for group commands, a group id from the `0x8000+`
/// range — spec.md §4.3).
///
/// Payload layout (spec.md only pins the `queue_id`/`msg_id` offsets; the
/// leading two bytes are the `target_id` and the following three are
/// reserved padding to reach offset 5):
///
/// ```text
/// [0..2)   target_id (u16, big-endian)
/// [2..5)   reserved (zero)
/// [5..10)  queue_id
/// [10..13) msg_id
/// [13..)   0x7E-wrapped inner envelope
/// ```
pub fn encode_command(
    target_id: u16,
    queue_id: QueueId,
    msg_id: MsgId,
    command: &Command,
) -> ProtocolResult<Vec<u8>> {
    let mut payload = Vec::with_capacity(13);
    payload.extend_from_slice(&target_id.to_be_bytes());
    payload.extend_from_slice(&[0u8; 3]);
    payload.extend_from_slice(&queue_id);
    payload.extend_from_slice(&msg_id);

    let envelope = checksum::encode_envelope([0u8; 6], &command.to_bytes());
    payload.extend_from_slice(&envelope);

    frame::encode_frame(0x73, &payload)
}

/// Extract `(target_id, queue_id, msg_id, command)` from a `0x73` frame's
/// payload.
pub fn decode_command(payload: &[u8]) -> ProtocolResult<(u16, QueueId, MsgId, Command)> {
    if payload.len() < 13 {
        return Err(ProtocolError::PayloadTooShort {
            packet_type: 0x73,
            need: 13,
            got: payload.len(),
        });
    }

    let target_id = u16::from_be_bytes([payload[0], payload[1]]);

    let mut queue_id: QueueId = [0; 5];
    queue_id.copy_from_slice(&payload[5..10]);

    let mut msg_id: MsgId = [0; 3];
    msg_id.copy_from_slice(&payload[10..13]);

    let (_header, command_bytes) = checksum::decode_envelope(&payload[13..])?;
    let command = Command::from_bytes(&command_bytes)?;

    Ok((target_id, queue_id, msg_id, command))
}
