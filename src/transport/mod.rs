//! Transport boundary
//!
//! The session only needs to enumerate named endpoints, write raw bytes to an
//! output and receive raw bytes from an input. `MidirBackend` talks to real
//! MIDI ports; `SimulatedBackend` is an in-memory SDE-3000 used offline and in
//! tests.

mod midir_backend;
mod simulated;

pub use midir_backend::MidirBackend;
pub use simulated::SimulatedBackend;

use crate::error::TransportError;

/// Callback invoked with every raw message arriving on an input
pub type InboundCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// An open output endpoint
pub trait OutputHandle {
    fn port_name(&self) -> &str;
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

/// An open input endpoint; dropping it stops message delivery
pub trait InputHandle {
    fn port_name(&self) -> &str;
}

/// Capability to enumerate and open bidirectional MIDI endpoints
pub trait MidiBackend {
    fn input_ports(&self) -> Result<Vec<String>, TransportError>;
    fn output_ports(&self) -> Result<Vec<String>, TransportError>;
    fn open_input(
        &mut self,
        port_name: &str,
        on_message: InboundCallback,
    ) -> Result<Box<dyn InputHandle>, TransportError>;
    fn open_output(&mut self, port_name: &str) -> Result<Box<dyn OutputHandle>, TransportError>;
}
