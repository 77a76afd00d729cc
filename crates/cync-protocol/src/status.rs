//! Status records carried in `0x43` (device-info) and `0x83`
//! (status-broadcast) payloads (spec.md §4.1, §4.4 "Mesh status ingestion").
//!
//! Both packet types carry the same fixed-width record repeated back to
//! back: one record per device the bridge currently knows about. A device
//! absent from a broadcast is exactly how the bridge reports "no longer
//! reachable" — there is no separate offline marker on the wire (spec.md
//! §4.4); `present` on the decoded tuple reflects that.

use crate::error::ProtocolError;

pub const STATUS_RECORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTuple {
    pub device_id: u8,
    pub present: bool,
    pub on: bool,
    pub brightness: u8,
    pub color_temp: u8,
    pub rgb: (u8, u8, u8),
}

impl StatusTuple {
    fn decode(record: &[u8; STATUS_RECORD_LEN]) -> Self {
        StatusTuple {
            device_id: record[0],
            present: record[1] != 0,
            on: record[2] != 0,
            brightness: record[3],
            color_temp: record[4],
            rgb: (record[5], record[6], record[7]),
        }
    }

    fn encode(&self) -> [u8; STATUS_RECORD_LEN] {
        [
            self.device_id,
            self.present as u8,
            self.on as u8,
            self.brightness,
            self.color_temp,
            self.rgb.0,
            self.rgb.1,
            self.rgb.2,
        ]
    }
}

/// Decode every whole status record in `payload`. A payload whose length
/// isn't a multiple of `STATUS_RECORD_LEN` is malformed outright — partial
/// trailing bytes never occur on the wire for these two packet types.
pub fn decode_status_records(payload: &[u8]) -> Result<Vec<StatusTuple>, ProtocolError> {
    if payload.len() % STATUS_RECORD_LEN != 0 {
        return Err(ProtocolError::MisalignedStatusBlock {
            len: payload.len(),
            record_len: STATUS_RECORD_LEN,
        });
    }

    Ok(payload
        .chunks_exact(STATUS_RECORD_LEN)
        .map(|chunk| {
            let mut record = [0u8; STATUS_RECORD_LEN];
            record.copy_from_slice(chunk);
            StatusTuple::decode(&record)
        })
        .collect())
}

/// Build a status-broadcast payload from a set of records (used by relay
/// injection fixtures and tests).
pub fn encode_status_records(records: &[StatusTuple]) -> Vec<u8> {
    records.iter().flat_map(|r| r.encode()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StatusTuple {
        StatusTuple {
            device_id: 12,
            present: true,
            on: true,
            brightness: 80,
            color_temp: 50,
            rgb: (10, 20, 30),
        }
    }

    #[test]
    fn round_trips_a_single_record() {
        let payload = encode_status_records(&[sample()]);
        let decoded = decode_status_records(&payload).unwrap();
        assert_eq!(decoded, vec![sample()]);
    }

    #[test]
    fn round_trips_multiple_records() {
        let other = StatusTuple {
            device_id: 13,
            present: false,
            on: false,
            brightness: 0,
            color_temp: 0,
            rgb: (0, 0, 0),
        };
        let payload = encode_status_records(&[sample(), other]);
        let decoded = decode_status_records(&payload).unwrap();
        assert_eq!(decoded, vec![sample(), other]);
    }

    #[test]
    fn empty_payload_decodes_to_no_records() {
        assert_eq!(decode_status_records(&[]).unwrap(), vec![]);
    }

    #[test]
    fn misaligned_payload_is_an_error() {
        assert!(matches!(
            decode_status_records(&[1, 2, 3]),
            Err(ProtocolError::MisalignedStatusBlock { .. })
        ));
    }

    #[test]
    fn absent_device_decodes_with_present_false() {
        let mut record = sample();
        record.present = false;
        let payload = encode_status_records(&[record]);
        let decoded = decode_status_records(&payload).unwrap();
        assert!(!decoded[0].present);
    }
}
