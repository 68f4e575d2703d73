//! In-memory SDE-3000
//!
//! Keeps six slots of parameter values, applies write frames to the active
//! slot and answers slot requests with a dump, the same way the pedal does.
//! Clones share the same unit, so a caller can keep a handle for inspection
//! after passing the backend to a session.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

use super::{InboundCallback, InputHandle, MidiBackend, OutputHandle};
use crate::error::TransportError;
use crate::midi::{format_hex, is_sysex};
use crate::sysex::{SysExCodec, SLOTS, SLOT_COMMAND};

/// Port name the simulated unit advertises on both sides
pub const SIMULATED_PORT_NAME: &str = "SDE-3000 EVH (simulated)";

struct UnitState {
    input_ports: Vec<String>,
    output_ports: Vec<String>,
    slots: Vec<Vec<u8>>,
    active_slot: u8,
    sent: Vec<Vec<u8>>,
    auto_respond: bool,
    unplugged: bool,
}

#[derive(Clone)]
pub struct SimulatedBackend {
    codec: SysExCodec,
    state: Arc<Mutex<UnitState>>,
    inbound: Arc<Mutex<Option<InboundCallback>>>,
}

impl SimulatedBackend {
    pub fn new(codec: SysExCodec) -> Self {
        Self::with_ports(
            codec,
            vec![SIMULATED_PORT_NAME.to_string()],
            vec![SIMULATED_PORT_NAME.to_string()],
        )
    }

    /// A unit reachable through the given port names
    pub fn with_ports(codec: SysExCodec, input_ports: Vec<String>, output_ports: Vec<String>) -> Self {
        let defaults: Vec<u8> = codec.table().ordered().iter().map(|d| d.min).collect();
        let state = UnitState {
            input_ports,
            output_ports,
            slots: SLOTS.map(|_| defaults.clone()).collect(),
            active_slot: *SLOTS.start(),
            sent: Vec::new(),
            auto_respond: true,
            unplugged: false,
        };

        Self {
            codec,
            state: Arc::new(Mutex::new(state)),
            inbound: Arc::new(Mutex::new(None)),
        }
    }

    /// Frames received from the host, oldest first
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    /// Overwrite the stored values of a slot
    pub fn store_slot(&self, slot: u8, values: &[u8]) {
        if let Some(stored) = self.state.lock().slots.get_mut(slot_index(slot)) {
            let n = stored.len().min(values.len());
            stored[..n].copy_from_slice(&values[..n]);
        }
    }

    pub fn slot_values(&self, slot: u8) -> Option<Vec<u8>> {
        self.state.lock().slots.get(slot_index(slot)).cloned()
    }

    pub fn active_slot(&self) -> u8 {
        self.state.lock().active_slot
    }

    /// Whether slot requests are answered with a dump
    pub fn set_auto_respond(&self, enabled: bool) {
        self.state.lock().auto_respond = enabled;
    }

    /// Make every further output write fail, as a vanished device would
    pub fn unplug(&self) {
        self.state.lock().unplugged = true;
    }

    /// Deliver a raw message to the host as if the unit had sent it
    pub fn inject(&self, data: &[u8]) {
        if let Some(callback) = self.inbound.lock().as_mut() {
            callback(data);
        }
    }

    /// Apply a host frame and return the unit's reply, if any
    fn receive(&self, data: &[u8]) -> Result<Option<Vec<u8>>, TransportError> {
        let mut state = self.state.lock();
        if state.unplugged {
            return Err(TransportError::new("device disconnected"));
        }
        state.sent.push(data.to_vec());

        let header = self.codec.header();
        if !is_sysex(data)
            || data.len() != 7
            || data[1..4] != [header.manufacturer_id, header.family_id, header.unit_id]
        {
            trace!("Simulated unit ignoring {}", format_hex(data));
            return Ok(None);
        }

        let (command, payload) = (data[4], data[5]);
        if command == SLOT_COMMAND {
            if !SLOTS.contains(&payload) {
                return Ok(None);
            }
            state.active_slot = payload;
            if !state.auto_respond {
                return Ok(None);
            }
            let values = state.slots[slot_index(payload)].clone();
            let dump = self
                .codec
                .encode_dump(payload, &values)
                .map_err(|e| TransportError::new(e.to_string()))?;
            debug!("Simulated unit dumping slot {}", payload);
            return Ok(Some(dump));
        }

        let table = self.codec.table();
        let position = table.ordered().iter().position(|d| d.id == command);
        if let Some(index) = position {
            let active = slot_index(state.active_slot);
            state.slots[active][index] = payload.min(table.ordered()[index].max);
        }
        Ok(None)
    }
}

fn slot_index(slot: u8) -> usize {
    (slot as usize).wrapping_sub(1)
}

impl MidiBackend for SimulatedBackend {
    fn input_ports(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.state.lock().input_ports.clone())
    }

    fn output_ports(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.state.lock().output_ports.clone())
    }

    fn open_input(
        &mut self,
        port_name: &str,
        on_message: InboundCallback,
    ) -> Result<Box<dyn InputHandle>, TransportError> {
        if !self.state.lock().input_ports.iter().any(|p| p == port_name) {
            return Err(TransportError::new(format!("Input port '{}' not found", port_name)));
        }
        *self.inbound.lock() = Some(on_message);
        Ok(Box::new(SimulatedInput {
            port_name: port_name.to_string(),
            inbound: self.inbound.clone(),
        }))
    }

    fn open_output(&mut self, port_name: &str) -> Result<Box<dyn OutputHandle>, TransportError> {
        if !self.state.lock().output_ports.iter().any(|p| p == port_name) {
            return Err(TransportError::new(format!("Output port '{}' not found", port_name)));
        }
        Ok(Box::new(SimulatedOutput {
            port_name: port_name.to_string(),
            unit: self.clone(),
        }))
    }
}

struct SimulatedInput {
    port_name: String,
    inbound: Arc<Mutex<Option<InboundCallback>>>,
}

impl InputHandle for SimulatedInput {
    fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Drop for SimulatedInput {
    fn drop(&mut self) {
        self.inbound.lock().take();
    }
}

struct SimulatedOutput {
    port_name: String,
    unit: SimulatedBackend,
}

impl OutputHandle for SimulatedOutput {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if let Some(reply) = self.unit.receive(data)? {
            self.unit.inject(&reply);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_dump_reflects_value() {
        let mut unit = SimulatedBackend::new(SysExCodec::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let _input = unit
            .open_input(SIMULATED_PORT_NAME, Box::new(move |d| sink.lock().push(d.to_vec())))
            .unwrap();
        let mut output = unit.open_output(SIMULATED_PORT_NAME).unwrap();

        output.send(&[0xF0, 0x41, 0x10, 0x11, 0x7E, 2, 0xF7]).unwrap();
        output.send(&[0xF0, 0x41, 0x10, 0x11, 0x03, 55, 0xF7]).unwrap();
        output.send(&[0xF0, 0x41, 0x10, 0x11, 0x7E, 2, 0xF7]).unwrap();

        let received = received.lock();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1], vec![0xF0, 0x41, 0x10, 0x11, 0x7E, 2, 0, 0, 55, 0, 0xF7]);
        assert_eq!(unit.slot_values(2), Some(vec![0, 0, 55, 0]));
        assert_eq!(unit.active_slot(), 2);
    }

    #[test]
    fn test_unplugged_output_fails() {
        let mut unit = SimulatedBackend::new(SysExCodec::default());
        let mut output = unit.open_output(SIMULATED_PORT_NAME).unwrap();
        unit.unplug();
        assert!(output.send(&[0xF0, 0x41, 0x10, 0x11, 0x7E, 1, 0xF7]).is_err());
    }

    #[test]
    fn test_dropping_input_stops_delivery() {
        let mut unit = SimulatedBackend::new(SysExCodec::default());
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let input = unit
            .open_input(SIMULATED_PORT_NAME, Box::new(move |_| *counter.lock() += 1))
            .unwrap();
        unit.inject(&[0xF0, 0xF7]);
        drop(input);
        unit.inject(&[0xF0, 0xF7]);
        assert_eq!(*count.lock(), 1);
    }
}
