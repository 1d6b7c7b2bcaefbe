//! Frame-polled key and button state with edge detection
//!
//! Raw events write into the `current` snapshot as they arrive. Once per
//! frame the host calls [`InputTracker::advance_frame`], which replaces the
//! `previous` snapshot with a copy of `current`. Edge queries compare the two.
//!
//! A key pressed and released between two `advance_frame` calls never shows
//! a press edge; resolution is one frame.
//!
//! Buttons are stored by raw host code and mapped through the binding at
//! query time, so two codes bound to the same [`MouseButton`] keep it held
//! until both are released.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

use super::buttons::{ButtonBinding, MouseButton};
use super::source::{InputEvent, InputSource};

/// Held keys and buttons at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Snapshot {
    keys: HashSet<String>,
    buttons: HashSet<u16>,
}

impl Snapshot {
    fn button_held(&self, button: MouseButton, binding: ButtonBinding) -> bool {
        self.buttons.iter().any(|&code| binding.map(code) == button)
    }

    fn apply(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.keys.insert(key.clone());
            }
            InputEvent::KeyUp(key) => {
                self.keys.remove(key);
            }
            InputEvent::ButtonDown(code) => {
                self.buttons.insert(*code);
            }
            InputEvent::ButtonUp(code) => {
                self.buttons.remove(code);
            }
        }
    }
}

/// Key/button tracker distinguishing "held" from "just changed"
pub struct InputTracker {
    /// Written by raw events, possibly from a source's handler
    current: Arc<Mutex<Snapshot>>,

    /// Copy of `current` taken by the last `advance_frame`
    previous: Snapshot,

    binding: ButtonBinding,
}

impl InputTracker {
    /// Create a tracker fed only through the `record_*` methods
    pub fn new(binding: ButtonBinding) -> Self {
        Self {
            current: Arc::new(Mutex::new(Snapshot::default())),
            previous: Snapshot::default(),
            binding,
        }
    }

    /// Create a tracker and subscribe it to `source`
    pub fn attach(source: &mut dyn InputSource, binding: ButtonBinding) -> Self {
        let tracker = Self::new(binding);

        let current = tracker.current.clone();
        source.subscribe(Arc::new(move |event: &InputEvent| {
            current.lock().apply(event);
        }));

        tracker
    }

    /// Active button binding
    pub fn binding(&self) -> ButtonBinding {
        self.binding
    }

    pub fn record_key_down(&self, key: &str) {
        self.current.lock().keys.insert(key.to_string());
    }

    pub fn record_key_up(&self, key: &str) {
        self.current.lock().keys.remove(key);
    }

    /// Record a button by identifier, stored as its canonical host code
    pub fn record_button_down(&self, button: MouseButton) {
        self.record_button_code_down(button.code());
    }

    pub fn record_button_up(&self, button: MouseButton) {
        self.record_button_code_up(button.code());
    }

    pub fn record_button_code_down(&self, code: u16) {
        self.current.lock().buttons.insert(code);
    }

    pub fn record_button_code_up(&self, code: u16) {
        self.current.lock().buttons.remove(&code);
    }

    /// Replace the previous snapshot with the current one.
    ///
    /// Call exactly once per frame, after that frame's queries. Calling it
    /// twice in a frame loses the edges of the skipped interval.
    pub fn advance_frame(&mut self) {
        let current = self.current.lock().clone();
        trace!(
            "advance frame: {} keys, {} buttons held",
            current.keys.len(),
            current.buttons.len()
        );
        self.previous = current;
    }

    /// Key is down now
    pub fn is_held(&self, key: &str) -> bool {
        self.current.lock().keys.contains(key)
    }

    /// Key was down as of the last `advance_frame`
    pub fn was_held(&self, key: &str) -> bool {
        self.previous.keys.contains(key)
    }

    pub fn just_pressed(&self, key: &str) -> bool {
        self.is_held(key) && !self.was_held(key)
    }

    pub fn just_released(&self, key: &str) -> bool {
        !self.is_held(key) && self.was_held(key)
    }

    /// Any code bound to `button` is down now
    pub fn is_button_held(&self, button: MouseButton) -> bool {
        self.current.lock().button_held(button, self.binding)
    }

    pub fn was_button_held(&self, button: MouseButton) -> bool {
        self.previous.button_held(button, self.binding)
    }

    pub fn button_just_pressed(&self, button: MouseButton) -> bool {
        self.is_button_held(button) && !self.was_button_held(button)
    }

    pub fn button_just_released(&self, button: MouseButton) -> bool {
        !self.is_button_held(button) && self.was_button_held(button)
    }

    /// Currently held keys, sorted
    pub fn held_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.current.lock().keys.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Currently held buttons after the binding, sorted and deduplicated
    pub fn held_buttons(&self) -> Vec<MouseButton> {
        let mut buttons: Vec<MouseButton> = self
            .current
            .lock()
            .buttons
            .iter()
            .map(|&code| self.binding.map(code))
            .collect();
        buttons.sort();
        buttons.dedup();
        buttons
    }

    /// Keys with a press edge this frame, sorted
    pub fn pressed_keys(&self) -> Vec<String> {
        let current = self.current.lock();
        let mut keys: Vec<String> = current
            .keys
            .difference(&self.previous.keys)
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl Default for InputTracker {
    fn default() -> Self {
        Self::new(ButtonBinding::default())
    }
}
