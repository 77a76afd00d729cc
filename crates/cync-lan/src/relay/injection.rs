//! Debug injection surface for relay connections (spec.md §4.6
//! "Injection", §6 "Injection files (relay only)").
//!
//! Two well-known files are polled on a short interval. When present, each
//! is consumed atomically — read, then removed — and turned into bytes
//! written straight onto the device-side socket. This is a debug surface
//! only; the spec-level guarantee is at-most-once delivery per file
//! appearance, not exactly-once, so a file that reappears mid-poll before
//! its predecessor is removed is simply picked up on the next tick.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cync_protocol::commands::{encode_command, Command};
use cync_protocol::packet::{checksum_over, find_markers};

use crate::bridge::connection::BridgeConnection;
use crate::error::{CyncError, CyncResult};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const COMMAND_FILE: &str = "cync_inject_command.txt";
const RAW_BYTES_FILE: &str = "cync_inject_raw_bytes.txt";

/// No specific device is addressed by an injected mode command; it rides
/// the same broadcast sentinel `maintenance::send_mesh_refresh_probe` uses.
const INJECTION_TARGET: u16 = 0;

/// Run forever, polling both injection files on `POLL_INTERVAL` and writing
/// whatever they ask for onto `connection`. Only returns on a write
/// failure, which the caller treats the same as any other forwarder ending.
pub async fn watch(connection: Arc<BridgeConnection>, write_drain_timeout: Duration) -> CyncResult<()> {
    let dir = std::env::temp_dir();
    let command_path = dir.join(COMMAND_FILE);
    let raw_path = dir.join(RAW_BYTES_FILE);

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        if let Some(mode) = take_file(&command_path).await {
            if let Err(e) = inject_mode(&connection, &mode, write_drain_timeout).await {
                tracing::warn!(error = %e, mode, "relay: failed to inject mode command");
            }
        }

        if let Some(hex) = take_file(&raw_path).await {
            if let Err(e) = inject_raw(&connection, &hex, write_drain_timeout).await {
                tracing::warn!(error = %e, "relay: failed to inject raw bytes");
            }
        }
    }
}

/// Read and delete a file if it exists and is non-empty. Best-effort: a
/// concurrent writer racing the removal just costs an extra empty poll.
async fn take_file(path: &PathBuf) -> Option<String> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    let _ = tokio::fs::remove_file(path).await;
    let trimmed = contents.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `smart`/`traditional` map onto the real Cync `SET_MODE` capability — a
/// fixture wired to a wall switch can run its own local dimming ("smart
/// mode" off) or defer fully to mesh commands ("smart mode" on). The wire
/// values aren't otherwise documented in the spec; this assignment is
/// recorded in DESIGN.md.
async fn inject_mode(connection: &BridgeConnection, mode: &str, write_drain_timeout: Duration) -> CyncResult<()> {
    let command = match mode.to_ascii_lowercase().as_str() {
        "smart" => Command::Mode(1),
        "traditional" => Command::Mode(0),
        other => {
            tracing::warn!(mode = other, "relay: unrecognized mode trigger, ignoring");
            return Ok(());
        }
    };
    let msg_id = connection.allocate_msg_id();
    let frame = encode_command(INJECTION_TARGET, connection.queue_id, msg_id, &command)?;
    connection.send(&frame, write_drain_timeout).await
}

/// Parse whitespace-separated hex bytes into a full packet and write it
/// verbatim, after optionally recomputing its checksum.
async fn inject_raw(connection: &BridgeConnection, hex: &str, write_drain_timeout: Duration) -> CyncResult<()> {
    let mut bytes = Vec::new();
    for token in hex.split_whitespace() {
        let b = u8::from_str_radix(token, 16).map_err(|_| {
            CyncError::Other(format!("relay: invalid hex byte '{token}' in injection file"))
        })?;
        bytes.push(b);
    }
    if bytes.is_empty() {
        return Ok(());
    }

    let bytes = maybe_recompute_checksum(bytes);
    connection.send(&bytes, write_drain_timeout).await
}

/// If the byte immediately before the closing `0x7E` marker is itself
/// `0x7E` — a placeholder left by whoever crafted the file rather than a
/// real checksum — replace it with the correct one (spec.md §6: "checksum
/// is recomputed if the last byte before the closing 0x7E is a marker").
fn maybe_recompute_checksum(mut payload: Vec<u8>) -> Vec<u8> {
    let Some((start, end)) = find_markers(&payload) else {
        return payload;
    };
    if end == 0 || payload[end - 1] != 0x7E {
        return payload;
    }
    if let Ok(checksum) = checksum_over(&payload, start, end) {
        payload[end - 1] = checksum;
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_a_real_checksum_byte_untouched() {
        let envelope = cync_protocol::packet::encode_envelope([0u8; 6], &[1, 2, 3]);
        let recomputed = maybe_recompute_checksum(envelope.clone());
        assert_eq!(recomputed, envelope);
    }

    #[test]
    fn replaces_a_placeholder_marker_checksum() {
        let mut envelope = cync_protocol::packet::encode_envelope([0u8; 6], &[1, 2, 3]);
        let checksum_index = envelope.len() - 2;
        let real_checksum = envelope[checksum_index];
        envelope[checksum_index] = 0x7E;

        let recomputed = maybe_recompute_checksum(envelope);
        assert_eq!(recomputed[recomputed.len() - 2], real_checksum);
    }

    #[test]
    fn payload_without_markers_is_returned_unchanged() {
        let payload = vec![1, 2, 3];
        assert_eq!(maybe_recompute_checksum(payload.clone()), payload);
    }
}
