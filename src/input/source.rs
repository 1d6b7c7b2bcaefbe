//! Raw input events and the sources that produce them

use std::sync::Arc;
use tracing::trace;

/// Raw event as delivered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    /// Raw numeric button code, mapped by the tracker's binding
    ButtonDown(u16),
    ButtonUp(u16),
}

/// Handler invoked for every raw event a source produces
pub type InputHandler = Arc<dyn Fn(&InputEvent) + Send + Sync>;

/// Anything that can deliver raw key/button events
///
/// The tracker registers its handler once, at construction.
pub trait InputSource {
    fn subscribe(&mut self, handler: InputHandler);
}

/// Source driven explicitly by the host, or by tests
#[derive(Default)]
pub struct SyntheticSource {
    handlers: Vec<InputHandler>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every subscriber, synchronously
    pub fn emit(&self, event: InputEvent) {
        trace!("input event: {:?}", event);
        for handler in &self.handlers {
            handler(&event);
        }
    }

    pub fn key_down(&self, key: &str) {
        self.emit(InputEvent::KeyDown(key.to_string()));
    }

    pub fn key_up(&self, key: &str) {
        self.emit(InputEvent::KeyUp(key.to_string()));
    }

    pub fn button_down(&self, code: u16) {
        self.emit(InputEvent::ButtonDown(code));
    }

    pub fn button_up(&self, code: u16) {
        self.emit(InputEvent::ButtonUp(code));
    }

    /// Number of registered handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

impl InputSource for SyntheticSource {
    fn subscribe(&mut self, handler: InputHandler) {
        self.handlers.push(handler);
    }
}
