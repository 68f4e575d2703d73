//! ParameterStore - the host's snapshot of the device state
//!
//! All mutations and reads go through a single mutex, so a dump applied while
//! local writes are in flight is never interleaved with them. Every change is
//! published on a watch channel while the lock is still held, which keeps the
//! published sequence in mutation order.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{EditorError, FrameError};
use crate::params::ParameterTable;
use crate::sysex::{SlotDump, SysExCodec};

/// Slot the host assumes before the first dump arrives
pub const INITIAL_SLOT: u8 = 1;

/// Current value of one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterValue {
    pub key: String,
    pub value: u8,
}

/// Read-only view of the current slot and all values in catalog order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSnapshot {
    pub slot: u8,
    pub values: Vec<ParameterValue>,
}

impl ParameterSnapshot {
    pub fn get(&self, key: &str) -> Option<u8> {
        self.values.iter().find(|p| p.key == key).map(|p| p.value)
    }
}

/// A clamped, encoded write that has not yet reached the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    index: usize,
    value: u8,
    frame: Vec<u8>,
}

impl PendingWrite {
    /// The encoded write frame
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

struct StoreState {
    slot: u8,
    /// Values in catalog order
    values: Vec<u8>,
}

/// Cheaply cloneable handle to the shared parameter snapshot
#[derive(Clone)]
pub struct ParameterStore {
    codec: SysExCodec,
    state: Arc<Mutex<StoreState>>,
    changes: Arc<watch::Sender<ParameterSnapshot>>,
}

impl ParameterStore {
    /// Create a store with every parameter at its minimum and slot 1 active
    pub fn new(codec: SysExCodec) -> Self {
        let state = StoreState {
            slot: INITIAL_SLOT,
            values: codec.table().ordered().iter().map(|d| d.min).collect(),
        };
        let initial = build_snapshot(codec.table(), &state);
        let (changes, _) = watch::channel(initial);

        Self {
            codec,
            state: Arc::new(Mutex::new(state)),
            changes: Arc::new(changes),
        }
    }

    pub fn codec(&self) -> &SysExCodec {
        &self.codec
    }

    /// Resolve, clamp and encode a write without touching the snapshot
    pub fn prepare_write(&self, key: &str, value: i32) -> Result<PendingWrite, EditorError> {
        let table = self.codec.table();
        let index = table.index_of(key)?;
        let definition = &table.ordered()[index];
        let clamped = ParameterTable::clamp(definition, value);

        Ok(PendingWrite {
            index,
            value: clamped,
            frame: self.codec.encode_write(definition, clamped as i32),
        })
    }

    /// Record a prepared write in the snapshot
    pub fn commit_write(&self, write: &PendingWrite) {
        let table = self.codec.table();
        let mut state = self.state.lock();
        state.values[write.index] = write.value;
        debug!("Local write {}={}", table.ordered()[write.index].key, write.value);
        self.changes.send_replace(build_snapshot(table, &state));
    }

    /// Optimistically set a parameter and return the write frame to transmit
    pub fn write_local(&self, key: &str, value: i32) -> Result<Vec<u8>, EditorError> {
        let write = self.prepare_write(key, value)?;
        self.commit_write(&write);
        Ok(write.frame)
    }

    /// Replace every value and the current slot from a decoded dump
    ///
    /// A dump that violates the catalog (value count, slot range, value
    /// ranges) is rejected and the snapshot is left untouched.
    pub fn apply(&self, dump: &SlotDump) -> Result<(), FrameError> {
        if let Err(e) = self.codec.validate_dump(dump) {
            warn!("Rejecting dump for slot {}: {}", dump.slot, e);
            return Err(e);
        }

        let mut state = self.state.lock();
        state.slot = dump.slot;
        state.values.copy_from_slice(&dump.values);
        debug!("Applied dump for slot {}", dump.slot);
        self.changes.send_replace(build_snapshot(self.codec.table(), &state));
        Ok(())
    }

    /// Encode a write frame for every current value, in catalog order
    pub fn encode_all(&self) -> Vec<Vec<u8>> {
        let state = self.state.lock();
        self.codec
            .table()
            .ordered()
            .iter()
            .zip(&state.values)
            .map(|(def, &v)| self.codec.encode_write(def, v as i32))
            .collect()
    }

    pub fn current_slot(&self) -> u8 {
        self.state.lock().slot
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        let state = self.state.lock();
        build_snapshot(self.codec.table(), &state)
    }

    /// Receive every snapshot published after a mutation
    pub fn subscribe(&self) -> watch::Receiver<ParameterSnapshot> {
        self.changes.subscribe()
    }
}

fn build_snapshot(table: &ParameterTable, state: &StoreState) -> ParameterSnapshot {
    ParameterSnapshot {
        slot: state.slot,
        values: table
            .ordered()
            .iter()
            .zip(&state.values)
            .map(|(def, &value)| ParameterValue {
                key: def.key.clone(),
                value,
            })
            .collect(),
    }
}
