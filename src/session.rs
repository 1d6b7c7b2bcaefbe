//! One input + MIDI session owned by the host
//!
//! Bundles an [`InputTracker`] and a [`MidiDispatcher`] with a key-to-pitch
//! map. The host constructs one session, feeds raw events into the source it
//! was attached to, and calls [`Session::frame`] once per tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::AppConfig;
use crate::dispatcher::{MidiAccess, MidiDispatcher, MidiError, NoteEvent, Scheduler};
use crate::input::{InputSource, InputTracker};

pub struct Session {
    input: InputTracker,
    dispatcher: MidiDispatcher,
    keymap: BTreeMap<String, u8>,
    config: AppConfig,
}

impl Session {
    /// Build a session whose tracker listens to `source`
    pub fn new(config: AppConfig, source: &mut dyn InputSource, scheduler: Arc<dyn Scheduler>) -> Self {
        let input = InputTracker::attach(source, config.input.button_binding);
        let dispatcher = MidiDispatcher::new(config.dispatcher_config(), scheduler);
        let keymap = config.resolved_keymap();

        Self {
            input,
            dispatcher,
            keymap,
            config,
        }
    }

    /// Initialize the dispatcher; see [`MidiDispatcher::initialize`]
    pub async fn connect(&self, access: &dyn MidiAccess) -> Result<Option<String>, MidiError> {
        self.dispatcher.initialize(access).await
    }

    pub fn input(&self) -> &InputTracker {
        &self.input
    }

    pub fn dispatcher(&self) -> &MidiDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn keymap(&self) -> &BTreeMap<String, u8> {
        &self.keymap
    }

    /// Note event for `pitch` with the configured velocity and duration
    pub fn note_event(&self, pitch: u8) -> NoteEvent {
        self.config.note_event(pitch)
    }

    /// Run one frame.
    ///
    /// Plays a timed note for every mapped key pressed since the previous
    /// frame, then advances the input snapshot. Returns the pitches played,
    /// in key order.
    pub fn frame(&mut self) -> Vec<u8> {
        let mut played = Vec::new();

        for (key, &pitch) in &self.keymap {
            if self.input.just_pressed(key) {
                self.dispatcher.play(self.config.note_event(pitch));
                played.push(pitch);
            }
        }

        if !played.is_empty() {
            debug!("frame played {:?}", played);
        }

        self.input.advance_frame();
        played
    }
}
