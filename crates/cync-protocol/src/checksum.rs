//! The inner `0x7E ... 0x7E` envelope carried inside `0x73` data-channel
//! payloads (spec.md §4.1 "Checksum").
//!
//! Layout of the envelope, start to end:
//!
//! ```text
//! 0x7E | 6-byte inner header (not checksummed) | command bytes | checksum | 0x7E
//! ```
//!
//! The checksum is the sum of every byte strictly between the 6-byte inner
//! header and the checksum byte itself, modulo 256. Six bytes are always
//! skipped after the opening marker and the checksum byte plus the closing
//! marker are excluded from the sum.

use crate::error::ProtocolError;

const INNER_HEADER_LEN: usize = 6;

/// Locate the first and last `0x7E` byte in `payload`. Returns `None` if
/// fewer than two markers are present, or if they coincide.
pub fn find_markers(payload: &[u8]) -> Option<(usize, usize)> {
    let start = payload.iter().position(|&b| b == 0x7E)?;
    let end = payload.iter().rposition(|&b| b == 0x7E)?;
    if end <= start {
        return None;
    }
    Some((start, end))
}

/// Sum `payload[start + 1 + 6 .. end - 1]` modulo 256 — the checksum the
/// device expects to find at `payload[end - 1]`. `start + 1` steps past the
/// opening marker, `+ 6` skips the inner header, and the range excludes the
/// checksum byte itself at `end - 1`.
fn compute(payload: &[u8], start: usize, end: usize) -> Result<u8, ProtocolError> {
    let body_start = start + 1 + INNER_HEADER_LEN;
    if body_start > end.saturating_sub(1) {
        return Err(ProtocolError::EnvelopeTooShort);
    }
    let sum: u32 = payload[body_start..end - 1].iter().map(|&b| b as u32).sum();
    Ok((sum % 256) as u8)
}

/// Public entry point for `compute`, for callers that already know the
/// marker offsets and just need the checksum byte — the relay's injection
/// path recomputes a checksum it doesn't otherwise need a full
/// `decode_envelope` round-trip for.
pub fn checksum_over(payload: &[u8], start: usize, end: usize) -> Result<u8, ProtocolError> {
    compute(payload, start, end)
}

/// Build a complete `0x7E ... 0x7E` envelope around `inner_header` (the six
/// bytes skipped by the checksum) and `command_bytes` (the checksummed
/// body), appending the computed checksum and closing marker.
pub fn encode_envelope(inner_header: [u8; INNER_HEADER_LEN], command_bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(INNER_HEADER_LEN + command_bytes.len());
    body.extend_from_slice(&inner_header);
    body.extend_from_slice(command_bytes);

    let checksum = (body[INNER_HEADER_LEN..]
        .iter()
        .map(|&b| b as u32)
        .sum::<u32>()
        % 256) as u8;

    let mut envelope = Vec::with_capacity(body.len() + 3);
    envelope.push(0x7E);
    envelope.extend_from_slice(&body);
    envelope.push(checksum);
    envelope.push(0x7E);
    envelope
}

/// Parse and checksum-verify an envelope found inside `payload`. Returns the
/// inner header and the command bytes on success.
pub fn decode_envelope(
    payload: &[u8],
) -> Result<([u8; INNER_HEADER_LEN], Vec<u8>), ProtocolError> {
    let (start, end) = find_markers(payload).ok_or(ProtocolError::MissingEnvelopeMarkers)?;
    let expected = compute(payload, start, end)?;
    let actual = payload[end - 1];
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch {
            expected,
            computed: actual,
        });
    }

    let header_start = start + 1;
    let header_end = header_start + INNER_HEADER_LEN;
    if header_end > end {
        return Err(ProtocolError::EnvelopeTooShort);
    }

    let mut inner_header = [0u8; INNER_HEADER_LEN];
    inner_header.copy_from_slice(&payload[header_start..header_end]);
    // command bytes run from the end of the inner header up to (excluding)
    // the checksum byte at `end - 1`.
    let command_bytes = payload[header_end..end - 1].to_vec();

    Ok((inner_header, command_bytes))
}
