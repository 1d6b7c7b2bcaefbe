//! GDC Kit - game-driven composition runtime
//!
//! Frame-polled keyboard/mouse edge detection plus a MIDI note dispatcher
//! with timed note-offs.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod input;
pub mod midi;
pub mod paths;
pub mod session;

pub use config::AppConfig;
pub use dispatcher::{MidiDispatcher, NoteEvent, SendOutcome};
pub use input::{InputTracker, MouseButton};
pub use session::Session;
