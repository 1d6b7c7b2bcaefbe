//! Keyboard and mouse input tracking
//!
//! Provides frame-polled edge detection over raw key/button events
//! delivered by an injected [`InputSource`].

pub mod buttons;
pub mod source;
pub mod tracker;

pub use buttons::{ButtonBinding, MouseButton};
pub use source::{InputEvent, InputHandler, InputSource, SyntheticSource};
pub use tracker::InputTracker;
