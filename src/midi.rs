//! MIDI message types and pitch utilities
//!
//! Provides the note messages the dispatcher emits, their wire encoding,
//! and conversions between MIDI note numbers, note names and frequencies.

use std::fmt;

/// Status nibble for Note Off
pub const NOTE_OFF: u8 = 0x80;

/// Status nibble for Note On
pub const NOTE_ON: u8 = 0x90;

/// Channel-voice note messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },
}

impl MidiMessage {
    /// Note On on channel 0
    pub fn note_on(note: u8, velocity: u8) -> Self {
        MidiMessage::NoteOn { channel: 0, note, velocity }
    }

    /// Note Off on channel 0 with release velocity 0
    pub fn note_off(note: u8) -> Self {
        MidiMessage::NoteOff { channel: 0, note, velocity: 0 }
    }

    /// Parse a note message from raw bytes.
    ///
    /// Note On with velocity 0 is kept as Note On; the dispatcher never
    /// emits it and callers inspecting traffic want the literal status.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }

        let status = data[0];
        let channel = status & 0x0F;
        let note = data[1] & 0x7F;
        let velocity = data[2] & 0x7F;

        match status & 0xF0 {
            NOTE_OFF => Some(MidiMessage::NoteOff { channel, note, velocity }),
            NOTE_ON => Some(MidiMessage::NoteOn { channel, note, velocity }),
            _ => None,
        }
    }

    /// Channel fits a nibble and data bytes fit 7 bits
    pub fn is_valid(&self) -> bool {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity }
            | MidiMessage::NoteOn { channel, note, velocity } => {
                channel <= 0x0F && note <= 0x7F && velocity <= 0x7F
            }
        }
    }

    /// Encode the message to MIDI bytes.
    ///
    /// Out-of-range fields are masked; check [`MidiMessage::is_valid`] first
    /// when a wrapped note would be wrong.
    pub fn encode(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                [NOTE_OFF | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                [NOTE_ON | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
        }
    }

    /// Note number carried by the message
    pub fn note(&self) -> u8 {
        match *self {
            MidiMessage::NoteOff { note, .. } | MidiMessage::NoteOn { note, .. } => note,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
        }
    }
}

/// Pitch conversions
pub mod pitch {
    /// MIDI note of A4
    pub const A4_NOTE: u8 = 69;

    /// Frequency of A4 in Hz
    pub const A4_HZ: f64 = 440.0;

    /// Natural note letters in octave 4 (middle C = 60)
    const NATURALS: [(char, u8); 7] = [
        ('C', 60),
        ('D', 62),
        ('E', 64),
        ('F', 65),
        ('G', 67),
        ('A', 69),
        ('B', 71),
    ];

    /// Convert a MIDI note number to its equal-tempered frequency in Hz
    pub fn pitch_to_frequency(pitch: u8) -> f64 {
        A4_HZ * 2f64.powf((pitch as f64 - A4_NOTE as f64) / 12.0)
    }

    /// Resolve a note name like `"C"`, `"f#"` or `"Bb"` to a MIDI note in octave 4.
    ///
    /// Returns `None` for anything else.
    pub fn note_name_to_midi(name: &str) -> Option<u8> {
        let mut chars = name.trim().chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let base = NATURALS
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, n)| *n)?;

        match (chars.next(), chars.next()) {
            (None, _) => Some(base),
            (Some('#'), None) => Some(base + 1),
            (Some('b'), None) => Some(base - 1),
            _ => None,
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
