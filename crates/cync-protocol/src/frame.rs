//! Outer frame format: `[type][0x00][0x00][len_hi][len_lo]` followed by
//! `len` bytes of payload (spec.md §4.1 "Frame format").
//!
//! `decode_frame` is a pure, allocation-light function over an accumulation
//! buffer so it can be driven from any I/O source — a live TCP stream in
//! `cync-lan`, or a fixture byte slice in tests here. The caller keeps
//! appending bytes to its buffer and calling `decode_frame` until it gets
//! `Incomplete`, then drains `consumed` bytes on every `Complete`.

use crate::error::ProtocolError;

pub const HEADER_LEN: usize = 5;
pub const MAX_PAYLOAD_LEN: usize = 4096;

/// A single decoded frame: the type byte and its payload, with the header
/// and length-prefix already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub frame_type: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDecode {
    /// Not enough bytes buffered yet to know the full frame length.
    Incomplete,
    /// A full frame was parsed; `consumed` bytes should be drained from the
    /// front of the accumulation buffer.
    Complete { frame: RawFrame, consumed: usize },
}

/// Attempt to decode one frame from the front of `buf`.
///
/// Returns `Incomplete` rather than erroring when there simply aren't enough
/// bytes yet — TCP delivers this protocol in arbitrary chunks, so running
/// out of bytes mid-frame is the common case, not a fault.
pub fn decode_frame(buf: &[u8]) -> Result<FrameDecode, ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Ok(FrameDecode::Incomplete);
    }

    let frame_type = buf[0];
    let len = ((buf[3] as usize) << 8) | (buf[4] as usize);

    if len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    let total = HEADER_LEN + len;
    if buf.len() < total {
        return Ok(FrameDecode::Incomplete);
    }

    Ok(FrameDecode::Complete {
        frame: RawFrame {
            frame_type,
            payload: buf[HEADER_LEN..total].to_vec(),
        },
        consumed: total,
    })
}

/// Build the 5-byte header + payload for an outgoing frame.
pub fn encode_frame(frame_type: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.push(frame_type);
    buf.push(0x00);
    buf.push(0x00);
    buf.push((payload.len() >> 8) as u8);
    buf.push((payload.len() & 0xFF) as u8);
    buf.extend_from_slice(payload);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_complete_frame() {
        let raw = encode_frame(0x23, &[1, 2, 3]).unwrap();
        match decode_frame(&raw).unwrap() {
            FrameDecode::Complete { frame, consumed } => {
                assert_eq!(frame.frame_type, 0x23);
                assert_eq!(frame.payload, vec![1, 2, 3]);
                assert_eq!(consumed, HEADER_LEN + 3);
            }
            FrameDecode::Incomplete => panic!("expected a complete frame"),
        }
    }

    #[test]
    fn reports_incomplete_on_partial_header() {
        let raw = encode_frame(0x23, &[1, 2, 3]).unwrap();
        assert_eq!(decode_frame(&raw[..3]).unwrap(), FrameDecode::Incomplete);
    }

    #[test]
    fn reports_incomplete_on_partial_payload() {
        let raw = encode_frame(0x23, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(
            decode_frame(&raw[..HEADER_LEN + 2]).unwrap(),
            FrameDecode::Incomplete
        );
    }

    #[test]
    fn rejects_oversized_length_prefix() {
        let mut raw = vec![0x23, 0x00, 0x00, 0xFF, 0xFF];
        raw.extend(std::iter::repeat(0u8).take(10));
        assert!(matches!(
            decode_frame(&raw),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn two_frames_back_to_back_decode_independently() {
        let mut buf = encode_frame(0x78, &[]).unwrap();
        buf.extend(encode_frame(0x88, &[9]).unwrap());

        let (first, consumed) = match decode_frame(&buf).unwrap() {
            FrameDecode::Complete { frame, consumed } => (frame, consumed),
            FrameDecode::Incomplete => panic!("expected first frame"),
        };
        assert_eq!(first.frame_type, 0x78);
        assert!(first.payload.is_empty());

        let rest = &buf[consumed..];
        match decode_frame(rest).unwrap() {
            FrameDecode::Complete { frame, .. } => {
                assert_eq!(frame.frame_type, 0x88);
                assert_eq!(frame.payload, vec![9]);
            }
            FrameDecode::Incomplete => panic!("expected second frame"),
        }
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            encode_frame(0x73, &payload),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }
}
