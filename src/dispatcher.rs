//! MIDI note dispatcher
//!
//! Owns the selected output destination and sends note messages to it.
//! Every send degrades to a silent no-op while no destination is selected,
//! so composition code can call [`MidiDispatcher::note`] unconditionally.
//!
//! ## Lifecycle
//!
//! - **Uninitialized**: created, no access requested yet.
//! - **Ready**: [`MidiDispatcher::initialize`] obtained access and
//!   auto-selected a port (or none if the host enumerates nothing).
//! - **Unavailable**: the host lacks MIDI capability. Terminal for the
//!   session; later `initialize` calls return the same error.
//!
//! Concurrent `initialize` calls on clones are serialized: the host is
//! asked for access once and later callers see the settled state.

pub mod backend;
pub mod error;
pub mod scheduler;

#[cfg(test)]
mod tests;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace, warn};

pub use backend::{
    AccessOptions, MemoryAccess, MemoryRegistry, MidiAccess, MidirAccess, OutputPort,
    OutputRegistry, SentMessage,
};
pub use error::MidiError;
pub use scheduler::{ManualScheduler, Scheduler, Task, TokioScheduler};

use crate::midi::{format_hex, pitch, MidiMessage};

/// Velocity used when the caller does not pick one
pub const DEFAULT_VELOCITY: u8 = 100;

/// Note length used when the caller does not pick one
pub const DEFAULT_NOTE_DURATION: Duration = Duration::from_millis(200);

/// Dispatcher lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Uninitialized,
    Unavailable,
    Ready,
}

/// What happened to a single send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// No destination selected; nothing was sent
    NoDestination,
    /// The destination rejected the bytes; logged, not raised
    Failed,
    /// Pitch or velocity above 127; logged, nothing was sent
    Invalid,
}

/// Dispatcher settings
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Substring preferred when auto-selecting a port (case-insensitive)
    pub port_marker: Option<String>,
    /// Ask the host for sysex-capable access
    pub sysex: bool,
    /// Log every send, selection and initialization outcome
    pub verbose: bool,
}

/// A timed note: pitch, velocity and how long it rings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub duration: Duration,
}

impl NoteEvent {
    /// Note with default velocity and duration
    pub fn new(pitch: u8) -> Self {
        Self {
            pitch,
            velocity: DEFAULT_VELOCITY,
            duration: DEFAULT_NOTE_DURATION,
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Pick the port to use at initialization.
///
/// First name containing `marker` (case-insensitive), else the first port,
/// else none.
pub fn choose_port(names: &[String], marker: Option<&str>) -> Option<usize> {
    if names.is_empty() {
        return None;
    }

    marker
        .filter(|m| !m.is_empty())
        .and_then(|m| {
            let m = m.to_lowercase();
            names.iter().position(|name| name.to_lowercase().contains(&m))
        })
        .or(Some(0))
}

struct SelectedPort {
    index: usize,
    port: Box<dyn OutputPort>,
}

struct Inner {
    state: DispatcherState,
    registry: Option<Box<dyn OutputRegistry>>,
    selected: Option<SelectedPort>,
    unavailable: Option<MidiError>,
    verbose: bool,
}

impl Inner {
    fn open(&self, index: usize) -> Option<SelectedPort> {
        let registry = self.registry.as_ref()?;
        match registry.open(index) {
            Ok(port) => Some(SelectedPort { index, port }),
            Err(e) => {
                warn!("Failed to open MIDI output {}: {}", index, e);
                None
            }
        }
    }

    fn selected_name(&self) -> Option<String> {
        self.selected.as_ref().map(|s| s.port.name().to_string())
    }
}

/// Sends note messages to the selected output
///
/// Clones share the same state; pending note-offs hold a clone too.
#[derive(Clone)]
pub struct MidiDispatcher {
    inner: Arc<Mutex<Inner>>,
    /// Held across the access request so only one caller probes the host
    init_gate: Arc<tokio::sync::Mutex<()>>,
    scheduler: Arc<dyn Scheduler>,
    port_marker: Option<String>,
    sysex: bool,
}

impl MidiDispatcher {
    pub fn new(config: DispatcherConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: DispatcherState::Uninitialized,
                registry: None,
                selected: None,
                unavailable: None,
                verbose: config.verbose,
            })),
            init_gate: Arc::new(tokio::sync::Mutex::new(())),
            scheduler,
            port_marker: config.port_marker,
            sysex: config.sysex,
        }
    }

    /// Request MIDI access and auto-select a port.
    ///
    /// Returns the selected port name, if any. Capability absence is
    /// returned as [`MidiError::Unsupported`] and is never retried.
    pub async fn initialize(&self, access: &dyn MidiAccess) -> Result<Option<String>, MidiError> {
        let _gate = self.init_gate.lock().await;

        {
            let inner = self.inner.lock();
            match inner.state {
                DispatcherState::Ready => return Ok(inner.selected_name()),
                DispatcherState::Unavailable => {
                    let err = inner
                        .unavailable
                        .clone()
                        .unwrap_or_else(|| MidiError::Unsupported("unavailable".to_string()));
                    return Err(err);
                }
                DispatcherState::Uninitialized => {}
            }
        }

        let options = AccessOptions { sysex: self.sysex };
        let registry = match access.request_access(options).await {
            Ok(registry) => registry,
            Err(e) => {
                let mut inner = self.inner.lock();
                inner.state = DispatcherState::Unavailable;
                inner.unavailable = Some(e.clone());
                warn!("{}. Continuing without MIDI output.", e);
                return Err(e);
            }
        };

        let names = registry.port_names();
        let chosen = choose_port(&names, self.port_marker.as_deref());

        let mut inner = self.inner.lock();
        inner.registry = Some(registry);
        inner.state = DispatcherState::Ready;
        let opened = chosen.and_then(|index| inner.open(index));
        inner.selected = opened;

        let selected = inner.selected_name();
        if inner.verbose {
            info!(
                "MIDI ready: {} output(s), selected {:?} (marker: {:?})",
                names.len(),
                selected,
                self.port_marker
            );
        }

        Ok(selected)
    }

    /// Switch the selected output.
    ///
    /// An out-of-range index falls back to the first port, or to none when
    /// nothing is enumerated. Returns the newly selected port name.
    pub fn select_port(&self, index: usize) -> Option<String> {
        let mut inner = self.inner.lock();

        let Some(registry) = inner.registry.as_ref() else {
            if inner.verbose {
                info!("MIDI not ready, ignoring selection of port {}", index);
            }
            return None;
        };

        let count = registry.port_names().len();
        let target = if index < count {
            Some(index)
        } else if count > 0 {
            if inner.verbose {
                info!("Port index {} out of range ({} ports), using port 0", index, count);
            }
            Some(0)
        } else {
            None
        };

        // Release the old connection before opening the new one
        inner.selected = None;
        let opened = target.and_then(|i| inner.open(i));
        inner.selected = opened;

        let selected = inner.selected_name();
        if inner.verbose {
            info!("MIDI output selected: {:?}", selected);
        }
        selected
    }

    /// Output names in host enumeration order; empty until ready
    pub fn list_ports(&self) -> Vec<String> {
        self.inner
            .lock()
            .registry
            .as_ref()
            .map(|r| r.port_names())
            .unwrap_or_default()
    }

    pub fn selected_port(&self) -> Option<String> {
        self.inner.lock().selected_name()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.inner.lock().selected.as_ref().map(|s| s.index)
    }

    pub fn state(&self) -> DispatcherState {
        self.inner.lock().state
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.inner.lock().verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.inner.lock().verbose
    }

    /// Send Note On `[0x90, pitch, velocity]` to the selected output
    pub fn note_on(&self, pitch: u8, velocity: u8) -> SendOutcome {
        send(&self.inner, MidiMessage::note_on(pitch, velocity))
    }

    /// Send Note Off `[0x80, pitch, 0]` to the selected output
    pub fn note_off(&self, pitch: u8) -> SendOutcome {
        send(&self.inner, MidiMessage::note_off(pitch))
    }

    /// Note On now, Note Off after `duration`.
    ///
    /// Overlapping notes of the same pitch are not tracked: each call
    /// schedules its own note-off, which may cut a later note short.
    /// An invalid pitch or velocity schedules nothing.
    pub fn note(&self, pitch: u8, velocity: u8, duration: Duration) -> SendOutcome {
        let outcome = self.note_on(pitch, velocity);
        if outcome == SendOutcome::Invalid {
            return outcome;
        }

        let inner = self.inner.clone();
        self.scheduler.schedule(
            duration,
            Box::new(move || {
                send(&inner, MidiMessage::note_off(pitch));
            }),
        );

        outcome
    }

    pub fn play(&self, event: NoteEvent) -> SendOutcome {
        self.note(event.pitch, event.velocity, event.duration)
    }

    /// Equal-tempered frequency of a MIDI note (A4 = 69 = 440 Hz)
    pub fn pitch_to_frequency(pitch: u8) -> f64 {
        pitch::pitch_to_frequency(pitch)
    }
}

fn send(inner: &Mutex<Inner>, message: MidiMessage) -> SendOutcome {
    if !message.is_valid() {
        warn!("Dropping out-of-range MIDI message: {}", message);
        return SendOutcome::Invalid;
    }

    let mut inner = inner.lock();
    let verbose = inner.verbose;

    let Some(selected) = inner.selected.as_mut() else {
        if verbose {
            info!("No MIDI output selected, dropping {}", message);
        }
        return SendOutcome::NoDestination;
    };

    let bytes = message.encode();
    match selected.port.send(&bytes) {
        Ok(()) => {
            if verbose {
                info!("→ {} | {} => {}", selected.port.name(), format_hex(&bytes), message);
            } else {
                trace!("→ {} | {}", selected.port.name(), format_hex(&bytes));
            }
            SendOutcome::Sent
        }
        Err(e) => {
            warn!("MIDI send to '{}' failed: {}", selected.port.name(), e);
            SendOutcome::Failed
        }
    }
}
