//! Wire codec, shared data model, and MQTT topic vocabulary for cync-lan.
//!
//! No I/O and no async anywhere in this crate — everything here is a pure
//! function or a plain type, the same split `zc-protocol` keeps between
//! "what a message means" and "how it gets sent".

pub mod checksum;
pub mod commands;
pub mod device;
pub mod error;
pub mod frame;
pub mod packet;
pub mod roster;
pub mod status;
pub mod topics;

pub use checksum::{decode_envelope, encode_envelope};
pub use commands::{Command, MsgId, QueueId};
pub use device::{Capability, Device, DeviceKind, DeviceState, Group, PendingCommand};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{decode_frame, encode_frame, FrameDecode, RawFrame, HEADER_LEN, MAX_PAYLOAD_LEN};
pub use packet::{parse_packet, Packet, PacketType};
pub use roster::{Roster, RosterBridge, RosterDevice, RosterGroup};
pub use status::{decode_status_records, encode_status_records, StatusTuple};
