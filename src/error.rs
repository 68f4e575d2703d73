//! Error types for the SysEx editor core
//!
//! Caller-facing errors (`EditorError`) are returned synchronously from the
//! call that triggered them. Inbound protocol errors (`FrameError`) only ever
//! surface inside the inbound listener, where they are logged and the frame
//! is discarded.

use thiserror::Error;

/// Errors surfaced to callers of the session, store and codec
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// No parameter with this key exists in the catalog
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Slot number outside 1..=6
    #[error("invalid slot {0} (must be 1-6)")]
    InvalidSlot(u8),

    /// No input/output port pair matched the device pattern
    #[error("device not found: no input/output pair matching {0}")]
    DeviceNotFound(String),

    /// The session is not connected to a device
    #[error("not connected to a device")]
    NotConnected,

    /// The transport rejected an operation
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised while decoding an inbound frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame too short or missing its F0/F7 markers, or carrying impossible data
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// A dump whose value count does not equal the catalog size
    #[error("truncated dump: expected {expected} values, got {actual}")]
    TruncatedDump { expected: usize, actual: usize },

    /// Frame belongs to another device or uses a command this dialect does not define
    #[error("unrecognized frame")]
    UnrecognizedFrame,
}

/// Parameter catalog validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("parameter catalog is empty")]
    Empty,

    #[error("duplicate parameter id 0x{0:02X}")]
    DuplicateId(u8),

    #[error("duplicate parameter key '{0}'")]
    DuplicateKey(String),

    #[error("parameter '{key}' has id 0x{id:02X}, which is reserved or not a 7-bit data byte")]
    ReservedId { key: String, id: u8 },

    #[error("parameter '{key}' has invalid range {min}..={max}")]
    InvalidRange { key: String, min: u8, max: u8 },
}

/// Failure reported by a MIDI backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
