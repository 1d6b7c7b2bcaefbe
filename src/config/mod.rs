//! Configuration management for GDC Kit
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every section is optional; a missing file yields the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::dispatcher::{DispatcherConfig, NoteEvent};
use crate::input::ButtonBinding;
use crate::midi::pitch::note_name_to_midi;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub notes: NoteConfig,
    #[serde(default)]
    pub input: InputConfig,
    /// Key identifier -> pitch fired when the key is pressed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keymap: BTreeMap<String, NoteSpec>,
}

/// MIDI output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Client name announced to the host MIDI subsystem
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// Substring preferred when auto-selecting an output (e.g. "IAC", "loopMIDI")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_marker: Option<String>,
    #[serde(default)]
    pub sysex: bool,
    #[serde(default)]
    pub verbose: bool,
}

/// Defaults for timed notes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NoteConfig {
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
}

/// Input tracking configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub button_binding: ButtonBinding,
}

/// Pitch given as a MIDI number or a note name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NoteSpec {
    Number(u8),
    Name(String),
}

impl NoteSpec {
    /// MIDI note number, if valid
    pub fn resolve(&self) -> Option<u8> {
        match self {
            NoteSpec::Number(n) if *n <= 127 => Some(*n),
            NoteSpec::Number(_) => None,
            NoteSpec::Name(name) => note_name_to_midi(name),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, defaults otherwise
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.midi.client_name.trim().is_empty() {
            anyhow::bail!("midi.client_name cannot be empty");
        }

        if let Some(marker) = &self.midi.port_marker {
            if marker.trim().is_empty() {
                anyhow::bail!("midi.port_marker cannot be empty (omit it instead)");
            }
        }

        if self.notes.velocity > 127 {
            anyhow::bail!("notes.velocity {} is invalid (must be 0-127)", self.notes.velocity);
        }

        for (key, spec) in &self.keymap {
            if key.is_empty() {
                anyhow::bail!("keymap contains an empty key name");
            }
            if spec.resolve().is_none() {
                anyhow::bail!("keymap entry '{}' has invalid pitch {:?}", key, spec);
            }
        }

        Ok(())
    }

    /// Settings for the MIDI dispatcher
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            port_marker: self.midi.port_marker.clone(),
            sysex: self.midi.sysex,
            verbose: self.midi.verbose,
        }
    }

    /// Keymap with every pitch resolved; invalid entries are skipped
    pub fn resolved_keymap(&self) -> BTreeMap<String, u8> {
        self.keymap
            .iter()
            .filter_map(|(key, spec)| spec.resolve().map(|p| (key.clone(), p)))
            .collect()
    }

    /// Note event for `pitch` using the configured defaults
    pub fn note_event(&self, pitch: u8) -> NoteEvent {
        NoteEvent::new(pitch)
            .with_velocity(self.notes.velocity)
            .with_duration(Duration::from_millis(self.notes.duration_ms))
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            port_marker: None,
            sysex: false,
            verbose: false,
        }
    }
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            velocity: default_velocity(),
            duration_ms: default_duration_ms(),
        }
    }
}

// Default value functions
fn default_client_name() -> String { "gdc-kit".to_string() }
fn default_velocity() -> u8 { 100 }
fn default_duration_ms() -> u64 { 200 }
