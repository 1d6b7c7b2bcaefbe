//! Host MIDI subsystem seam
//!
//! The dispatcher talks to the host through three traits:
//! - [`MidiAccess`]: capability probe plus access request
//! - [`OutputRegistry`]: enumerated output destinations
//! - [`OutputPort`]: one opened destination accepting bytes
//!
//! [`MidirAccess`] implements them over `midir`; [`MemoryAccess`] keeps
//! destinations in-process and records what was sent.

use async_trait::async_trait;
use midir::{MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use super::error::MidiError;
use crate::midi::format_hex;

/// Options for the access request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessOptions {
    /// Ask for system-exclusive support
    pub sysex: bool,
}

/// Host MIDI subsystem entry point
#[async_trait]
pub trait MidiAccess: Send + Sync {
    /// Request access to the output destinations.
    ///
    /// Returns [`MidiError::Unsupported`] when the host has no MIDI capability.
    async fn request_access(&self, options: AccessOptions) -> Result<Box<dyn OutputRegistry>, MidiError>;
}

/// Enumerable set of output destinations owned by the host
pub trait OutputRegistry: Send {
    /// Destination names in host enumeration order
    fn port_names(&self) -> Vec<String>;

    /// Open the destination at `index`
    fn open(&self, index: usize) -> Result<Box<dyn OutputPort>, MidiError>;
}

/// An opened output destination
pub trait OutputPort: Send {
    fn name(&self) -> &str;

    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError>;
}

/// Access to the platform MIDI stack through `midir`
#[derive(Debug, Clone)]
pub struct MidirAccess {
    client_name: String,
}

impl MidirAccess {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self { client_name: client_name.into() }
    }
}

#[async_trait]
impl MidiAccess for MidirAccess {
    async fn request_access(&self, options: AccessOptions) -> Result<Box<dyn OutputRegistry>, MidiError> {
        // midir has no per-client sysex gate on outputs; the flag is only reported
        debug!(
            "Requesting MIDI access as '{}' (sysex: {})",
            self.client_name, options.sysex
        );

        let probe = MidiOutput::new(&self.client_name)
            .map_err(|e| MidiError::Unsupported(e.to_string()))?;
        debug!("Found {} MIDI output ports", probe.port_count());

        Ok(Box::new(MidirRegistry {
            client_name: self.client_name.clone(),
        }))
    }
}

/// Output destinations as currently enumerated by `midir`
struct MidirRegistry {
    client_name: String,
}

impl OutputRegistry for MidirRegistry {
    fn port_names(&self) -> Vec<String> {
        let Ok(midi_out) = MidiOutput::new(&self.client_name) else {
            return Vec::new();
        };

        // Keep positions aligned with ports() so indices stay valid
        midi_out
            .ports()
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "unknown".to_string()))
            .collect()
    }

    fn open(&self, index: usize) -> Result<Box<dyn OutputPort>, MidiError> {
        let midi_out = MidiOutput::new(&self.client_name)
            .map_err(|e| MidiError::Unsupported(e.to_string()))?;

        let port = midi_out
            .ports()
            .into_iter()
            .nth(index)
            .ok_or(MidiError::PortUnavailable { index })?;

        let name = midi_out
            .port_name(&port)
            .unwrap_or_else(|_| "unknown".to_string());

        let connection = midi_out
            .connect(&port, &self.client_name)
            .map_err(|e| MidiError::Connect {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        debug!("MIDI output opened: '{}'", name);
        Ok(Box::new(MidirPort { name, connection }))
    }
}

struct MidirPort {
    name: String,
    connection: MidiOutputConnection,
}

impl OutputPort for MidirPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        self.connection
            .send(bytes)
            .map_err(|e| MidiError::Send(e.to_string()))
    }
}

/// Byte sequence received by an in-memory destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub port: String,
    pub bytes: Vec<u8>,
}

/// In-process destinations that record every send.
///
/// Clones share the same log, so a test can keep one handle and give the
/// other to the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    names: Vec<String>,
    log: Arc<Mutex<Vec<SentMessage>>>,
}

impl MemoryRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Everything sent so far, in order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.log.lock().clone()
    }

    /// Drain the log
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.log.lock())
    }
}

impl OutputRegistry for MemoryRegistry {
    fn port_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn open(&self, index: usize) -> Result<Box<dyn OutputPort>, MidiError> {
        let name = self
            .names
            .get(index)
            .cloned()
            .ok_or(MidiError::PortUnavailable { index })?;

        Ok(Box::new(MemoryPort {
            name,
            log: self.log.clone(),
        }))
    }
}

struct MemoryPort {
    name: String,
    log: Arc<Mutex<Vec<SentMessage>>>,
}

impl OutputPort for MemoryPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        debug!("[memory] {} | {}", self.name, format_hex(bytes));
        self.log.lock().push(SentMessage {
            port: self.name.clone(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

/// Access request that hands out a [`MemoryRegistry`], or reports no capability
#[derive(Debug, Clone)]
pub struct MemoryAccess {
    registry: Option<MemoryRegistry>,
}

impl MemoryAccess {
    pub fn new(registry: MemoryRegistry) -> Self {
        Self { registry: Some(registry) }
    }

    /// Host without MIDI capability
    pub fn unsupported() -> Self {
        Self { registry: None }
    }
}

#[async_trait]
impl MidiAccess for MemoryAccess {
    async fn request_access(&self, _options: AccessOptions) -> Result<Box<dyn OutputRegistry>, MidiError> {
        match &self.registry {
            Some(registry) => Ok(Box::new(registry.clone())),
            None => Err(MidiError::Unsupported("no MIDI subsystem".to_string())),
        }
    }
}
