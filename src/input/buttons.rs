//! Mouse button identifiers and raw-code bindings
//!
//! Hosts report mouse buttons as small numeric codes (0 = left, 1 = middle,
//! 2 = right on most platforms). This module maps those codes to the
//! identifiers the tracker stores, according to a configurable binding:
//!
//! ```text
//!   code   collapsed   raw
//!   0      Primary     Primary
//!   1      Secondary   Other(1)
//!   2      Secondary   Secondary
//!   n      Secondary   Other(n)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Button identifier stored in the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MouseButton {
    Primary,
    Secondary,
    /// Any other code, only produced by [`ButtonBinding::Raw`]
    Other(u16),
}

/// How raw numeric button codes are mapped to [`MouseButton`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonBinding {
    /// 0 is primary, every other code is secondary
    #[default]
    Collapsed,
    /// 0 is primary, 2 is secondary, everything else keeps its code
    Raw,
}

impl MouseButton {
    /// Canonical host code, the inverse of [`ButtonBinding::Raw`]
    pub fn code(self) -> u16 {
        match self {
            MouseButton::Primary => 0,
            MouseButton::Secondary => 2,
            MouseButton::Other(code) => code,
        }
    }
}

impl ButtonBinding {
    /// Map a raw host button code
    pub fn map(self, code: u16) -> MouseButton {
        match (self, code) {
            (_, 0) => MouseButton::Primary,
            (ButtonBinding::Collapsed, _) => MouseButton::Secondary,
            (ButtonBinding::Raw, 2) => MouseButton::Secondary,
            (ButtonBinding::Raw, other) => MouseButton::Other(other),
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Primary => write!(f, "primary"),
            MouseButton::Secondary => write!(f, "secondary"),
            MouseButton::Other(code) => write!(f, "button{}", code),
        }
    }
}

impl FromStr for MouseButton {
    type Err = String;

    /// Accepts `left`/`primary`, `right`/`secondary` and `buttonN`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "primary" => Ok(MouseButton::Primary),
            "right" | "secondary" => Ok(MouseButton::Secondary),
            other => other
                .strip_prefix("button")
                .and_then(|n| n.parse::<u16>().ok())
                .map(MouseButton::Other)
                .ok_or_else(|| format!("unknown mouse button '{}'", s)),
        }
    }
}
