//! Typed packets, one layer above [`crate::frame::RawFrame`] (spec.md §4.1
//! "Packet types").
//!
//! `parse_packet` is the single entry point the per-connection handler in
//! `cync-lan` calls once it has a complete `RawFrame`; everything else in
//! this module is decode plumbing for one packet type.

use crate::commands::{Command, MsgId, QueueId};
use crate::error::ProtocolError;
use crate::frame::RawFrame;
use crate::status::{decode_status_records, StatusTuple};
use crate::{checksum, commands};

/// The handshake payload carries the bridge's 4-byte endpoint starting at
/// this offset (spec.md §4.1).
const HANDSHAKE_ENDPOINT_OFFSET: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Handshake,
    HandshakeAck,
    DeviceInfo,
    InfoAck,
    DataChannel,
    DataAck,
    /// The three observed keepalive byte values (`0x78`, `0xD3`, `0xD8`)
    /// all mean the same thing; the original byte is kept so a relay bridge
    /// can echo back the exact variant it saw.
    Heartbeat(u8),
    StatusBroadcast,
    StatusAck,
    Unknown(u8),
}

impl PacketType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x23 => PacketType::Handshake,
            0x28 => PacketType::HandshakeAck,
            0x43 => PacketType::DeviceInfo,
            0x48 => PacketType::InfoAck,
            0x73 => PacketType::DataChannel,
            0x7B => PacketType::DataAck,
            0x78 | 0xD3 | 0xD8 => PacketType::Heartbeat(b),
            0x83 => PacketType::StatusBroadcast,
            0x88 => PacketType::StatusAck,
            other => PacketType::Unknown(other),
        }
    }

    pub fn to_byte(&self) -> u8 {
        match self {
            PacketType::Handshake => 0x23,
            PacketType::HandshakeAck => 0x28,
            PacketType::DeviceInfo => 0x43,
            PacketType::InfoAck => 0x48,
            PacketType::DataChannel => 0x73,
            PacketType::DataAck => 0x7B,
            PacketType::Heartbeat(b) => *b,
            PacketType::StatusBroadcast => 0x83,
            PacketType::StatusAck => 0x88,
            PacketType::Unknown(b) => *b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Handshake { endpoint: [u8; 4] },
    HandshakeAck,
    DeviceInfo { statuses: Vec<StatusTuple> },
    InfoAck,
    DataChannel {
        target_id: u16,
        queue_id: QueueId,
        msg_id: MsgId,
        command: Command,
    },
    /// `msg_id` is `None` when the ack payload is too short to carry one —
    /// the pipeline's FIFO fallback (spec.md §9 "msg_id echo matching")
    /// handles that case.
    DataAck { msg_id: Option<MsgId> },
    Heartbeat(u8),
    StatusBroadcast { statuses: Vec<StatusTuple> },
    StatusAck,
    Unknown { frame_type: u8, payload: Vec<u8> },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Handshake { .. } => PacketType::Handshake,
            Packet::HandshakeAck => PacketType::HandshakeAck,
            Packet::DeviceInfo { .. } => PacketType::DeviceInfo,
            Packet::InfoAck => PacketType::InfoAck,
            Packet::DataChannel { .. } => PacketType::DataChannel,
            Packet::DataAck { .. } => PacketType::DataAck,
            Packet::Heartbeat(b) => PacketType::Heartbeat(*b),
            Packet::StatusBroadcast { .. } => PacketType::StatusBroadcast,
            Packet::StatusAck => PacketType::StatusAck,
            Packet::Unknown { frame_type, .. } => PacketType::Unknown(*frame_type),
        }
    }
}

pub fn parse_packet(raw: &RawFrame) -> Result<Packet, ProtocolError> {
    match PacketType::from_byte(raw.frame_type) {
        PacketType::Handshake => {
            let end = HANDSHAKE_ENDPOINT_OFFSET + 4;
            if raw.payload.len() < end {
                return Err(ProtocolError::PayloadTooShort {
                    packet_type: raw.frame_type,
                    need: end,
                    got: raw.payload.len(),
                });
            }
            let mut endpoint = [0u8; 4];
            endpoint.copy_from_slice(&raw.payload[HANDSHAKE_ENDPOINT_OFFSET..end]);
            Ok(Packet::Handshake { endpoint })
        }
        PacketType::HandshakeAck => Ok(Packet::HandshakeAck),
        PacketType::DeviceInfo => Ok(Packet::DeviceInfo {
            statuses: decode_status_records(&raw.payload)?,
        }),
        PacketType::InfoAck => Ok(Packet::InfoAck),
        PacketType::DataChannel => {
            let (target_id, queue_id, msg_id, command) = commands::decode_command(&raw.payload)?;
            Ok(Packet::DataChannel {
                target_id,
                queue_id,
                msg_id,
                command,
            })
        }
        PacketType::DataAck => {
            let msg_id = if raw.payload.len() >= 3 {
                Some([raw.payload[0], raw.payload[1], raw.payload[2]])
            } else {
                None
            };
            Ok(Packet::DataAck { msg_id })
        }
        PacketType::Heartbeat(b) => Ok(Packet::Heartbeat(b)),
        PacketType::StatusBroadcast => Ok(Packet::StatusBroadcast {
            statuses: decode_status_records(&raw.payload)?,
        }),
        PacketType::StatusAck => Ok(Packet::StatusAck),
        PacketType::Unknown(frame_type) => Ok(Packet::Unknown {
            frame_type,
            payload: raw.payload.clone(),
        }),
    }
}

/// Build the ack frame a bridge connection sends back for a `DataAck`
/// (`0x7B`), echoing `msg_id` at the offset `parse_packet` reads it from.
pub fn encode_data_ack(msg_id: MsgId) -> Result<Vec<u8>, ProtocolError> {
    crate::frame::encode_frame(PacketType::DataAck.to_byte(), &msg_id)
}

/// Build a bare ack frame with no payload — used for `0x28`, `0x48`, `0x88`.
pub fn encode_bare_ack(packet_type: PacketType) -> Result<Vec<u8>, ProtocolError> {
    crate::frame::encode_frame(packet_type.to_byte(), &[])
}

/// Re-export for callers that only need the envelope helpers alongside
/// packet parsing (e.g. relay-mode packet rewriting).
pub use checksum::{checksum_over, decode_envelope, encode_envelope, find_markers};
