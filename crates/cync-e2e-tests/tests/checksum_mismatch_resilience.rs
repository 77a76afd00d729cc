//! S6: a frame with a corrupted inner-envelope checksum must surface as a
//! typed `ChecksumMismatch` error at the packet layer, and one malformed
//! frame on the wire must never stop the connection from decoding the
//! next, well-formed one out of the same buffer.

use cync_protocol::commands::{self, Command};
use cync_protocol::frame::{decode_frame, FrameDecode};
use cync_protocol::packet::{self, Packet};
use cync_protocol::ProtocolError;

#[test]
fn a_corrupted_checksum_is_reported_as_a_typed_error_not_a_panic() {
    let mut raw = commands::encode_command(1, [0; 5], [0; 3], &Command::Power(true)).unwrap();
    // Flip a byte inside the checksummed command body (well past the
    // 5-byte outer frame header and the inner header it skips).
    let corrupt_index = raw.len() - 3;
    raw[corrupt_index] ^= 0xFF;

    let frame = match decode_frame(&raw).unwrap() {
        FrameDecode::Complete { frame, .. } => frame,
        FrameDecode::Incomplete => panic!("full frame must decode at the outer layer"),
    };

    let result = packet::parse_packet(&frame);
    assert!(matches!(result, Err(ProtocolError::ChecksumMismatch { .. })));
}

#[test]
fn a_malformed_frame_does_not_prevent_decoding_a_following_well_formed_one() {
    let mut corrupted = commands::encode_command(1, [0; 5], [0; 3], &Command::Power(true)).unwrap();
    let corrupt_index = corrupted.len() - 3;
    corrupted[corrupt_index] ^= 0xFF;

    let good = commands::encode_command(2, [0; 5], [0; 3], &Command::Power(false)).unwrap();

    let mut buf = Vec::new();
    buf.extend_from_slice(&corrupted);
    buf.extend_from_slice(&good);

    // First frame decodes at the outer layer (it's a well-formed frame,
    // just with bad inner contents) but fails checksum verification at the
    // packet layer — the bytes are still consumed so the buffer advances.
    let (first_frame, consumed) = match decode_frame(&buf).unwrap() {
        FrameDecode::Complete { frame, consumed } => (frame, consumed),
        FrameDecode::Incomplete => panic!("full frame must decode"),
    };
    assert!(matches!(
        packet::parse_packet(&first_frame),
        Err(ProtocolError::ChecksumMismatch { .. })
    ));

    let remaining = &buf[consumed..];
    let second_frame = match decode_frame(remaining).unwrap() {
        FrameDecode::Complete { frame, .. } => frame,
        FrameDecode::Incomplete => panic!("second frame must also be fully buffered"),
    };
    match packet::parse_packet(&second_frame).unwrap() {
        Packet::DataChannel { target_id, command, .. } => {
            assert_eq!(target_id, 2);
            assert_eq!(command, Command::Power(false));
        }
        other => panic!("expected the second frame's data channel packet, got {other:?}"),
    }
}
