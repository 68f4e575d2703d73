//! DeviceSession - connection lifecycle and frame dispatch for one SDE-3000
//!
//! The session owns the matched input/output pair. Outbound requests are
//! encoded and written synchronously. Inbound messages are pushed by the
//! transport callback into a bounded channel; an `InboundListener` drains it,
//! decodes each frame and applies dumps to the `ParameterStore`.
//!
//! ```text
//! transport callback ──try_send──▶ mpsc ──▶ InboundListener ──▶ decode ──▶ store.apply
//! caller ──▶ DeviceSession::send ──▶ encode ──▶ output handle
//! ```

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::{EditorError, FrameError, Result};
use crate::midi::format_hex;
use crate::store::ParameterStore;
use crate::sysex::DecodedMessage;
use crate::transport::{InputHandle, MidiBackend, OutputHandle};


/// Inbound frames buffered between the transport thread and the listener
pub const INBOUND_QUEUE_CAPACITY: usize = 1000;

/// Product substring the SDE-3000 EVH reports in its port names
pub const DEFAULT_DEVICE_PATTERN: &str = "SDE-3000";

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Matching,
    Connected,
}

/// Decides whether a port name belongs to the target device
#[derive(Clone)]
pub enum DeviceMatcher {
    /// Substring match on the port name
    NameContains { pattern: String, ignore_case: bool },
    /// Arbitrary predicate, with a label for logs and errors
    Predicate {
        label: String,
        matches: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    },
}

impl DeviceMatcher {
    /// Case-sensitive substring match
    pub fn name_contains(pattern: impl Into<String>) -> Self {
        DeviceMatcher::NameContains {
            pattern: pattern.into(),
            ignore_case: false,
        }
    }

    pub fn predicate(
        label: impl Into<String>,
        matches: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        DeviceMatcher::Predicate {
            label: label.into(),
            matches: Arc::new(matches),
        }
    }

    pub fn matches(&self, port_name: &str) -> bool {
        match self {
            DeviceMatcher::NameContains {
                pattern,
                ignore_case: false,
            } => port_name.contains(pattern.as_str()),
            DeviceMatcher::NameContains {
                pattern,
                ignore_case: true,
            } => port_name.to_lowercase().contains(&pattern.to_lowercase()),
            DeviceMatcher::Predicate { matches, .. } => matches(port_name),
        }
    }
}

impl Default for DeviceMatcher {
    fn default() -> Self {
        Self::name_contains(DEFAULT_DEVICE_PATTERN)
    }
}

impl fmt::Display for DeviceMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMatcher::NameContains { pattern, .. } => write!(f, "'{}'", pattern),
            DeviceMatcher::Predicate { label, .. } => write!(f, "{}", label),
        }
    }
}

impl fmt::Debug for DeviceMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMatcher::NameContains {
                pattern,
                ignore_case,
            } => f
                .debug_struct("NameContains")
                .field("pattern", pattern)
                .field("ignore_case", ignore_case)
                .finish(),
            DeviceMatcher::Predicate { label, .. } => {
                f.debug_struct("Predicate").field("label", label).finish()
            }
        }
    }
}

/// Outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Write one parameter (value is clamped into range)
    Write { key: String, value: i32 },
    /// Ask the device to dump a slot
    ReadSlot(u8),
}

/// Matched input/output pair
struct SessionIdentity {
    input: Box<dyn InputHandle>,
    output: Box<dyn OutputHandle>,
}

/// Explicitly owned connection to a single device
pub struct DeviceSession {
    matcher: DeviceMatcher,
    store: ParameterStore,
    state: SessionState,
    identity: Option<SessionIdentity>,
    listener: Option<InboundListener>,
}

impl DeviceSession {
    pub fn new(store: ParameterStore, matcher: DeviceMatcher) -> Self {
        Self {
            matcher,
            store,
            state: SessionState::Disconnected,
            identity: None,
            listener: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn matcher(&self) -> &DeviceMatcher {
        &self.matcher
    }

    /// Names of the matched (input, output) ports
    pub fn port_names(&self) -> Option<(&str, &str)> {
        self.identity
            .as_ref()
            .map(|id| (id.input.port_name(), id.output.port_name()))
    }

    /// Find the device on both sides of the backend and open it
    pub fn connect<B: MidiBackend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
        self.disconnect();
        self.state = SessionState::Matching;

        let result = self.open_matching(backend);
        if let Err(e) = &result {
            warn!("Connection to device {} failed: {}", self.matcher, e);
            self.state = SessionState::Disconnected;
        }
        result
    }

    fn open_matching<B: MidiBackend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
        let inputs = backend.input_ports()?;
        let outputs = backend.output_ports()?;
        debug!("Found {} input and {} output ports", inputs.len(), outputs.len());

        let input_name = inputs.iter().find(|name| self.matcher.matches(name));
        let output_name = outputs.iter().find(|name| self.matcher.matches(name));

        let (input_name, output_name) = match (input_name, output_name) {
            (Some(i), Some(o)) => (i, o),
            (i, o) => {
                debug!(
                    "Device match incomplete (input: {:?}, output: {:?})",
                    i, o
                );
                return Err(EditorError::DeviceNotFound(self.matcher.to_string()));
            }
        };

        let (frame_tx, frame_rx) = mpsc::channel::<Vec<u8>>(INBOUND_QUEUE_CAPACITY);
        let input = backend.open_input(
            input_name,
            Box::new(move |data: &[u8]| {
                // Never block the transport thread
                if let Err(e) = frame_tx.try_send(data.to_vec()) {
                    warn!("Dropping inbound MIDI message: {}", e);
                }
            }),
        )?;
        let output = backend.open_output(output_name)?;

        info!("Connected to device - Input: '{}', Output: '{}'", input_name, output_name);

        self.identity = Some(SessionIdentity { input, output });
        self.listener = Some(InboundListener::new(frame_rx, self.store.clone()));
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Take the listener for the current connection (for the caller to drive)
    pub fn take_listener(&mut self) -> Option<InboundListener> {
        self.listener.take()
    }

    /// Encode and transmit a request, returning the frame that was sent
    ///
    /// A write reaches the snapshot only after its frame was handed to the
    /// output port.
    pub fn send(&mut self, request: Request) -> Result<Vec<u8>> {
        if !self.is_connected() {
            return Err(EditorError::NotConnected);
        }

        match request {
            Request::Write { key, value } => {
                let write = self.store.prepare_write(&key, value)?;
                self.transmit(write.frame())?;
                self.store.commit_write(&write);
                Ok(write.frame().to_vec())
            }
            Request::ReadSlot(slot) => {
                let frame = self.store.codec().encode_slot_request(slot)?;
                self.transmit(&frame)?;
                Ok(frame)
            }
        }
    }

    pub fn write_param(&mut self, key: &str, value: i32) -> Result<Vec<u8>> {
        self.send(Request::Write {
            key: key.to_string(),
            value,
        })
    }

    /// Request a slot dump; the snapshot changes only when the dump arrives
    pub fn read_slot(&mut self, slot: u8) -> Result<Vec<u8>> {
        self.send(Request::ReadSlot(slot))
    }

    /// Re-read the slot the host believes is active
    pub fn refresh(&mut self) -> Result<Vec<u8>> {
        let slot = self.store.current_slot();
        self.read_slot(slot)
    }

    /// Transmit every current value to the device, returning the frame count
    pub fn write_all(&mut self) -> Result<usize> {
        if !self.is_connected() {
            return Err(EditorError::NotConnected);
        }

        let frames = self.store.encode_all();
        for frame in &frames {
            self.transmit(frame)?;
        }
        info!("Wrote {} parameters to device", frames.len());
        Ok(frames.len())
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        let identity = self.identity.as_mut().ok_or(EditorError::NotConnected)?;

        if let Err(e) = identity.output.send(frame) {
            warn!("Send failed, dropping session: {}", e);
            self.mark_device_lost();
            return Err(e.into());
        }
        debug!("Sent: {}", format_hex(frame));
        Ok(())
    }

    /// Close both ports and return to Disconnected
    pub fn disconnect(&mut self) {
        if self.identity.take().is_some() {
            info!("Device disconnected");
        }
        self.listener = None;
        self.state = SessionState::Disconnected;
    }

    /// The transport reported the device gone
    pub fn mark_device_lost(&mut self) {
        if self.is_connected() {
            warn!("Device lost");
        }
        self.disconnect();
    }
}

/// Result of processing one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A dump replaced the snapshot
    Applied { slot: u8 },
    /// Foreign or undefined traffic
    Ignored,
    /// Protocol error; the frame was discarded
    Dropped(FrameError),
}

/// Drains inbound frames for one connection and applies decoded dumps
pub struct InboundListener {
    frame_rx: mpsc::Receiver<Vec<u8>>,
    store: ParameterStore,
}

impl InboundListener {
    fn new(frame_rx: mpsc::Receiver<Vec<u8>>, store: ParameterStore) -> Self {
        Self { frame_rx, store }
    }

    /// Process frames until the connection's input is closed
    pub async fn run(mut self) {
        while let Some(frame) = self.frame_rx.recv().await {
            self.process(&frame);
        }
        debug!("Inbound listener stopped");
    }

    /// Process every frame already queued
    pub fn drain(&mut self) -> Vec<InboundOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(frame) = self.frame_rx.try_recv() {
            outcomes.push(self.process(&frame));
        }
        outcomes
    }

    /// Decode one frame and apply it if it is a dump
    pub fn process(&self, frame: &[u8]) -> InboundOutcome {
        match self.store.codec().decode(frame) {
            Ok(DecodedMessage::SlotDump(dump)) => match self.store.apply(&dump) {
                Ok(()) => {
                    info!("Slot {} loaded from device", dump.slot);
                    InboundOutcome::Applied { slot: dump.slot }
                }
                Err(e) => InboundOutcome::Dropped(e),
            },
            Err(FrameError::UnrecognizedFrame) => {
                trace!("Ignoring frame: {}", format_hex(frame));
                InboundOutcome::Ignored
            }
            Err(e) => {
                warn!("Discarding inbound frame ({}): {}", e, format_hex(frame));
                InboundOutcome::Dropped(e)
            }
        }
    }
}
