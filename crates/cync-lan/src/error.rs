//! Core error enum unifying the bridge/command/relay error kinds (spec.md §7).
//!
//! Leaf errors here mirror `zc_mqtt_channel::error::MqttError`'s shape:
//! one `thiserror` enum per failure family, `Other(String)` as an escape
//! hatch for wrapped library errors that don't deserve their own variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CyncError {
    #[error("malformed frame from bridge {endpoint}: {reason}")]
    MalformedFrame { endpoint: String, reason: String },

    #[error("handshake timed out after {secs}s")]
    HandshakeTimeout { secs: u64 },

    #[error("handshake payload invalid: {reason}")]
    HandshakeInvalid { reason: String },

    #[error("bridge for endpoint {endpoint} is no longer connected")]
    BridgeLost { endpoint: String },

    #[error("no ready bridge is available to reach device/group {target}")]
    NoBridgesAvailable { target: u32 },

    #[error("unknown target id {target}")]
    UnknownTarget { target: u32 },

    #[error("device/group {target} is busy with another command")]
    Busy { target: u32 },

    #[error("command for {target} superseded by a newer one")]
    Superseded { target: u32 },

    #[error("command to {target} timed out waiting for an ack")]
    AckTimeout { target: u32 },

    #[error("mqtt broker disconnected: {reason}")]
    MqttDisconnected { reason: String },

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Protocol(#[from] cync_protocol::ProtocolError),

    #[error(transparent)]
    Mqtt(#[from] cync_mqtt::MqttError),

    #[error("{0}")]
    Other(String),
}

pub type CyncResult<T> = Result<T, CyncError>;
