//! MIDI dispatcher errors

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MidiError {
    /// Host has no usable MIDI subsystem; terminal for the session
    #[error("MIDI is not supported on this host: {0}")]
    Unsupported(String),

    #[error("MIDI output port {index} is not available")]
    PortUnavailable { index: usize },

    #[error("failed to connect to MIDI output '{name}': {reason}")]
    Connect { name: String, reason: String },

    #[error("failed to send MIDI message: {0}")]
    Send(String),
}
