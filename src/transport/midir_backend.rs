//! Hardware MIDI backend built on midir

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::debug;

use super::{InboundCallback, InputHandle, MidiBackend, OutputHandle};
use crate::error::TransportError;

fn transport_err(context: &str, err: impl std::fmt::Display) -> TransportError {
    TransportError::new(format!("{}: {}", context, err))
}

/// midir-backed port access
pub struct MidirBackend {
    client_name: String,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn midi_in(&self) -> Result<MidiInput, TransportError> {
        MidiInput::new(&self.client_name).map_err(|e| transport_err("Failed to create MIDI input", e))
    }

    fn midi_out(&self) -> Result<MidiOutput, TransportError> {
        MidiOutput::new(&self.client_name)
            .map_err(|e| transport_err("Failed to create MIDI output", e))
    }
}

impl MidiBackend for MidirBackend {
    fn input_ports(&self) -> Result<Vec<String>, TransportError> {
        let midi_in = self.midi_in()?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    fn output_ports(&self) -> Result<Vec<String>, TransportError> {
        let midi_out = self.midi_out()?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }

    fn open_input(
        &mut self,
        port_name: &str,
        mut on_message: InboundCallback,
    ) -> Result<Box<dyn InputHandle>, TransportError> {
        let mut midi_in = self.midi_in()?;
        // SysEx is filtered by some backends unless explicitly enabled
        midi_in.ignore(Ignore::None);

        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).ok().as_deref() == Some(port_name))
            .ok_or_else(|| TransportError::new(format!("Input port '{}' not found", port_name)))?;

        debug!("Opening input port: {}", port_name);
        let conn = midi_in
            .connect(
                &port,
                &self.client_name,
                move |_timestamp, data, _| on_message(data),
                (),
            )
            .map_err(|e| transport_err("Failed to connect to input port", e))?;

        Ok(Box::new(MidirInput {
            _conn: conn,
            port_name: port_name.to_string(),
        }))
    }

    fn open_output(&mut self, port_name: &str) -> Result<Box<dyn OutputHandle>, TransportError> {
        let midi_out = self.midi_out()?;

        let port = midi_out
            .ports()
            .into_iter()
            .find(|p| midi_out.port_name(p).ok().as_deref() == Some(port_name))
            .ok_or_else(|| TransportError::new(format!("Output port '{}' not found", port_name)))?;

        debug!("Opening output port: {}", port_name);
        let conn = midi_out
            .connect(&port, &self.client_name)
            .map_err(|e| transport_err("Failed to connect to output port", e))?;

        Ok(Box::new(MidirOutput {
            conn,
            port_name: port_name.to_string(),
        }))
    }
}

struct MidirInput {
    _conn: MidiInputConnection<()>,
    port_name: String,
}

impl InputHandle for MidirInput {
    fn port_name(&self) -> &str {
        &self.port_name
    }
}

struct MidirOutput {
    conn: MidiOutputConnection,
    port_name: String,
}

impl OutputHandle for MidirOutput {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.conn
            .send(data)
            .map_err(|e| transport_err("Failed to send MIDI message", e))
    }
}
