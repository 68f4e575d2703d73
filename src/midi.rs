//! MIDI byte-level helpers

/// System Exclusive start status byte
pub const SYSEX_START: u8 = 0xF0;

/// System Exclusive end status byte
pub const SYSEX_END: u8 = 0xF7;

/// True if the bytes look like a complete SysEx message
pub fn is_sysex(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == SYSEX_START && data[data.len() - 1] == SYSEX_END
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
