//! SysEx codec for the SDE-3000 dialect
//!
//! Frame layout:
//!
//! ```text
//! F0 <mfr> <family> <unit> <command> <payload> [values...] F7
//! ```
//!
//! `command` is either a parameter id (write) or `0x7E` (slot request on the
//! way out, slot dump on the way in). A dump carries one value byte per
//! catalog entry, in catalog order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{EditorError, FrameError};
use crate::midi::{SYSEX_END, SYSEX_START};
use crate::params::{ParameterDefinition, ParameterTable};

/// Command byte for slot requests and slot dumps
pub const SLOT_COMMAND: u8 = 0x7E;

/// Valid slot numbers
pub const SLOTS: std::ops::RangeInclusive<u8> = 1..=6;

/// Shortest frame this dialect accepts (header + command + payload + F7)
pub const MIN_FRAME_LEN: usize = 7;

const VALUES_OFFSET: usize = 6;

/// Vendor header bytes following F0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SysExHeader {
    pub manufacturer_id: u8,
    pub family_id: u8,
    pub unit_id: u8,
}

impl SysExHeader {
    fn bytes(&self) -> [u8; 3] {
        [self.manufacturer_id, self.family_id, self.unit_id]
    }
}

impl Default for SysExHeader {
    fn default() -> Self {
        Self {
            manufacturer_id: 0x41,
            family_id: 0x10,
            unit_id: 0x11,
        }
    }
}

/// A full parameter set reported by the device for one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDump {
    pub slot: u8,
    /// Values in catalog order
    pub values: Vec<u8>,
}

/// Successfully decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedMessage {
    SlotDump(SlotDump),
}

/// Check a slot number against 1..=6
pub fn validate_slot(slot: u8) -> Result<u8, EditorError> {
    if SLOTS.contains(&slot) {
        Ok(slot)
    } else {
        Err(EditorError::InvalidSlot(slot))
    }
}

/// Encoder/decoder bound to one catalog and one vendor header
#[derive(Debug, Clone)]
pub struct SysExCodec {
    header: SysExHeader,
    table: Arc<ParameterTable>,
}

impl SysExCodec {
    pub fn new(header: SysExHeader, table: Arc<ParameterTable>) -> Self {
        Self { header, table }
    }

    pub fn header(&self) -> SysExHeader {
        self.header
    }

    pub fn table(&self) -> &ParameterTable {
        &self.table
    }

    fn frame(&self, command: u8, payload: u8, values: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(MIN_FRAME_LEN + values.len());
        frame.push(SYSEX_START);
        frame.extend_from_slice(&self.header.bytes());
        frame.push(command);
        frame.push(payload);
        frame.extend_from_slice(values);
        frame.push(SYSEX_END);
        frame
    }

    /// Encode a single parameter write, clamping the value into range
    pub fn encode_write(&self, definition: &ParameterDefinition, value: i32) -> Vec<u8> {
        let clamped = ParameterTable::clamp(definition, value);
        self.frame(definition.id, clamped, &[])
    }

    /// Encode a request for the device to dump the given slot
    pub fn encode_slot_request(&self, slot: u8) -> Result<Vec<u8>, EditorError> {
        let slot = validate_slot(slot)?;
        Ok(self.frame(SLOT_COMMAND, slot, &[]))
    }

    /// Encode a device-to-host dump; values are clamped per definition
    pub fn encode_dump(&self, slot: u8, values: &[u8]) -> Result<Vec<u8>, EditorError> {
        let slot = validate_slot(slot)?;
        let values: Vec<u8> = self
            .table
            .ordered()
            .iter()
            .zip(values)
            .map(|(def, &v)| ParameterTable::clamp(def, v as i32))
            .collect();
        Ok(self.frame(SLOT_COMMAND, slot, &values))
    }

    /// Decode an inbound frame
    pub fn decode(&self, frame: &[u8]) -> Result<DecodedMessage, FrameError> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(FrameError::MalformedFrame("frame shorter than 7 bytes"));
        }
        if frame[0] != SYSEX_START {
            return Err(FrameError::MalformedFrame("missing SysEx start byte"));
        }
        if frame[frame.len() - 1] != SYSEX_END {
            return Err(FrameError::MalformedFrame("missing SysEx end byte"));
        }
        if frame[1..4] != self.header.bytes() {
            return Err(FrameError::UnrecognizedFrame);
        }
        if frame[4] != SLOT_COMMAND {
            return Err(FrameError::UnrecognizedFrame);
        }

        let dump = SlotDump {
            slot: frame[5],
            values: frame[VALUES_OFFSET..frame.len() - 1].to_vec(),
        };
        self.validate_dump(&dump)?;
        Ok(DecodedMessage::SlotDump(dump))
    }

    /// Check a dump against the catalog: exact value count, slot 1-6 and
    /// every value within its definition's range
    pub fn validate_dump(&self, dump: &SlotDump) -> Result<(), FrameError> {
        if dump.values.len() != self.table.len() {
            return Err(FrameError::TruncatedDump {
                expected: self.table.len(),
                actual: dump.values.len(),
            });
        }
        if !SLOTS.contains(&dump.slot) {
            return Err(FrameError::MalformedFrame("slot out of range"));
        }
        let in_range = self
            .table
            .ordered()
            .iter()
            .zip(&dump.values)
            .all(|(def, &v)| (def.min..=def.max).contains(&v));
        if !in_range {
            return Err(FrameError::MalformedFrame("parameter value out of range"));
        }
        Ok(())
    }
}

impl Default for SysExCodec {
    fn default() -> Self {
        Self::new(SysExHeader::default(), Arc::new(ParameterTable::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec() -> SysExCodec {
        SysExCodec::default()
    }

    #[test]
    fn test_encode_write_delay_time() {
        let codec = codec();
        let def = codec.table().lookup("delayTime").unwrap().clone();
        assert_eq!(
            codec.encode_write(&def, 64),
            vec![0xF0, 0x41, 0x10, 0x11, 0x01, 64, 0xF7]
        );
    }

    #[test]
    fn test_encode_slot_request() {
        assert_eq!(
            codec().encode_slot_request(3).unwrap(),
            vec![0xF0, 0x41, 0x10, 0x11, 0x7E, 3, 0xF7]
        );
    }

    #[test]
    fn test_decode_dump() {
        let frame = [0xF0, 0x41, 0x10, 0x11, 0x7E, 3, 10, 20, 30, 40, 0xF7];
        assert_eq!(
            codec().decode(&frame),
            Ok(DecodedMessage::SlotDump(SlotDump {
                slot: 3,
                values: vec![10, 20, 30, 40],
            }))
        );
    }

    #[test]
    fn test_decode_malformed() {
        let codec = codec();
        assert!(matches!(
            codec.decode(&[0xF0, 0x41, 0x10, 0x11, 0x7E, 0xF7]),
            Err(FrameError::MalformedFrame(_))
        ));
        assert!(matches!(
            codec.decode(&[0x90, 0x41, 0x10, 0x11, 0x7E, 3, 1, 2, 3, 4, 0xF7]),
            Err(FrameError::MalformedFrame(_))
        ));
        assert!(matches!(
            codec.decode(&[0xF0, 0x41, 0x10, 0x11, 0x7E, 3, 1, 2, 3, 4, 0x00]),
            Err(FrameError::MalformedFrame(_))
        ));
        assert!(matches!(codec.decode(&[]), Err(FrameError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_truncated_dump() {
        let codec = codec();
        assert_eq!(
            codec.decode(&[0xF0, 0x41, 0x10, 0x11, 0x7E, 3, 10, 20, 30, 0xF7]),
            Err(FrameError::TruncatedDump { expected: 4, actual: 3 })
        );
        assert_eq!(
            codec.decode(&[0xF0, 0x41, 0x10, 0x11, 0x7E, 3, 10, 20, 30, 40, 50, 0xF7]),
            Err(FrameError::TruncatedDump { expected: 4, actual: 5 })
        );
    }

    #[test]
    fn test_decode_foreign_and_unknown_commands() {
        let codec = codec();
        // Different unit id
        assert_eq!(
            codec.decode(&[0xF0, 0x41, 0x10, 0x12, 0x7E, 3, 10, 20, 30, 40, 0xF7]),
            Err(FrameError::UnrecognizedFrame)
        );
        // Device inquiry reply from some other gear
        assert_eq!(
            codec.decode(&[0xF0, 0x7E, 0x00, 0x06, 0x02, 0x41, 0xF7]),
            Err(FrameError::UnrecognizedFrame)
        );
        // Command byte this dialect does not define
        assert_eq!(
            codec.decode(&[0xF0, 0x41, 0x10, 0x11, 0x20, 3, 0xF7]),
            Err(FrameError::UnrecognizedFrame)
        );
    }

    #[test]
    fn test_decode_rejects_bad_slot_and_values() {
        let codec = codec();
        assert!(matches!(
            codec.decode(&[0xF0, 0x41, 0x10, 0x11, 0x7E, 9, 10, 20, 30, 40, 0xF7]),
            Err(FrameError::MalformedFrame(_))
        ));
        assert!(matches!(
            codec.decode(&[0xF0, 0x41, 0x10, 0x11, 0x7E, 2, 10, 0xF0, 30, 40, 0xF7]),
            Err(FrameError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_slot_request_echo_is_not_a_dump() {
        let codec = codec();
        let request = codec.encode_slot_request(2).unwrap();
        assert_eq!(
            codec.decode(&request),
            Err(FrameError::TruncatedDump { expected: 4, actual: 0 })
        );
    }

    #[test]
    fn test_custom_header() {
        let header = SysExHeader {
            manufacturer_id: 0x42,
            family_id: 0x30,
            unit_id: 0x04,
        };
        let codec = SysExCodec::new(header, Arc::new(ParameterTable::default()));
        assert_eq!(
            codec.encode_slot_request(1).unwrap(),
            vec![0xF0, 0x42, 0x30, 0x04, 0x7E, 1, 0xF7]
        );
        assert_eq!(
            SysExCodec::default().decode(&codec.encode_dump(1, &[0, 0, 0, 0]).unwrap()),
            Err(FrameError::UnrecognizedFrame)
        );
    }

    proptest! {
        #[test]
        fn prop_write_frame_shape(index in 0usize..4, value in -500i32..500) {
            let codec = codec();
            let def = codec.table().ordered()[index].clone();
            let frame = codec.encode_write(&def, value);
            let clamped = ParameterTable::clamp(&def, value);
            prop_assert_eq!(&frame, &vec![0xF0, 0x41, 0x10, 0x11, def.id, clamped, 0xF7]);
            prop_assert_eq!(codec.decode(&frame), Err(FrameError::UnrecognizedFrame));
        }

        #[test]
        fn prop_dump_round_trip(slot in 1u8..=6, values in proptest::collection::vec(0u8..=127, 4)) {
            let codec = codec();
            let frame = codec.encode_dump(slot, &values).unwrap();
            prop_assert_eq!(
                codec.decode(&frame),
                Ok(DecodedMessage::SlotDump(SlotDump { slot, values }))
            );
        }

        #[test]
        fn prop_invalid_slot_rejected(slot in any::<u8>().prop_filter("outside 1..=6", |s| !SLOTS.contains(s))) {
            prop_assert_eq!(codec().encode_slot_request(slot), Err(EditorError::InvalidSlot(slot)));
        }
    }
}
