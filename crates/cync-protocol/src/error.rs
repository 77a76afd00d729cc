//! Wire-level error types.
//!
//! These are pure decode/encode errors — no I/O, no connection state. The
//! per-connection handler in `cync-lan` maps these onto the broader error
//! kinds from spec §7 (`malformed-frame`, `checksum-mismatch`, ...).

use thiserror::Error;

/// Errors produced while framing or parsing the wire protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame length {len} exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("checksum mismatch: expected {expected:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error("inner envelope missing 0x7E start/end markers")]
    MissingEnvelopeMarkers,

    #[error("inner envelope too short to contain a checksum byte")]
    EnvelopeTooShort,

    #[error("payload too short for packet type {packet_type:#04x}: need {need} bytes, got {got}")]
    PayloadTooShort {
        packet_type: u8,
        need: usize,
        got: usize,
    },

    #[error("status record block length {len} is not a multiple of {record_len}")]
    MisalignedStatusBlock { len: usize, record_len: usize },

    #[error("unknown capability byte prefix")]
    UnknownCommandPrefix,
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
