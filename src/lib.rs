//! SDE Editor - SysEx parameter editor for the SDE-3000 EVH
//!
//! Reads and writes delay parameters over MIDI System Exclusive and keeps a
//! host-side snapshot of the active slot in sync with the pedal.

pub mod cli;
pub mod config;
pub mod error;
pub mod midi;
pub mod params;
pub mod session;
pub mod store;
pub mod sysex;
pub mod transport;

pub use error::{EditorError, FrameError, TableError, TransportError};
pub use params::{ParameterDefinition, ParameterTable};
pub use session::{DeviceMatcher, DeviceSession, InboundListener, InboundOutcome, Request, SessionState};
pub use store::{ParameterSnapshot, ParameterStore, ParameterValue, PendingWrite};
pub use sysex::{DecodedMessage, SlotDump, SysExCodec, SysExHeader};
