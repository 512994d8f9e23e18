#![forbid(unsafe_code)]

//! Keyboard surface of the editor frame.
//!
//! DOM `key`/`code` pairs are normalised into a closed [`Shortcut`] set. The
//! same set travels over the messaging protocol when a shortcut has to be
//! handled by the other side (for example `ctrl+s`, which only the host can
//! persist).

use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const META  = 0b1000;
    }
}

impl Modifiers {
    /// Build from the four DOM `KeyboardEvent` modifier booleans.
    #[must_use]
    pub fn from_dom(shift: bool, alt: bool, ctrl: bool, meta: bool) -> Self {
        let mut mods = Self::empty();
        mods.set(Self::SHIFT, shift);
        mods.set(Self::ALT, alt);
        mods.set(Self::CTRL, ctrl);
        mods.set(Self::META, meta);
        mods
    }
}

/// Editor shortcuts. Wire names match the `shortcut` payload of
/// `keyboardShortcut` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shortcut {
    /// Ctrl+Enter: run.
    #[serde(rename = "ctrl+enter")]
    Run,
    /// Ctrl+.: stop.
    #[serde(rename = "ctrl+period")]
    Stop,
    /// Ctrl+F: format.
    #[serde(rename = "ctrl+f")]
    Format,
    /// Ctrl+/: toggle comment.
    #[serde(rename = "ctrl+slash")]
    ToggleComment,
    /// Ctrl+,: sketch / overlay.
    #[serde(rename = "ctrl+comma")]
    ToggleSketch,
    /// Ctrl+;: debug / overlay.
    #[serde(rename = "ctrl+semicolon")]
    ToggleDebug,
    /// Ctrl+S: persisted by the host.
    #[serde(rename = "ctrl+s")]
    Save,
}

impl Shortcut {
    pub const ALL: [Self; 7] = [
        Self::Run,
        Self::Stop,
        Self::Format,
        Self::ToggleComment,
        Self::ToggleSketch,
        Self::ToggleDebug,
        Self::Save,
    ];

    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Run => "ctrl+enter",
            Self::Stop => "ctrl+period",
            Self::Format => "ctrl+f",
            Self::ToggleComment => "ctrl+slash",
            Self::ToggleSketch => "ctrl+comma",
            Self::ToggleDebug => "ctrl+semicolon",
            Self::Save => "ctrl+s",
        }
    }

    /// `true` for shortcuts the editor cannot fulfil itself.
    #[must_use]
    pub const fn is_host_bound(self) -> bool {
        matches!(self, Self::Save)
    }

    /// Match a DOM key event. Only `Ctrl` chords are shortcuts; `Alt`/`Meta`
    /// chords are left to the browser.
    #[must_use]
    pub fn from_dom(key: &str, code: &str, mods: Modifiers) -> Option<Self> {
        if !mods.contains(Modifiers::CTRL) || mods.intersects(Modifiers::ALT | Modifiers::META) {
            return None;
        }
        match key {
            "Enter" => Some(Self::Run),
            "." => Some(Self::Stop),
            "f" | "F" => Some(Self::Format),
            "/" => Some(Self::ToggleComment),
            "," => Some(Self::ToggleSketch),
            ";" => Some(Self::ToggleDebug),
            "s" | "S" => Some(Self::Save),
            // Layouts where `;` needs a different key still report the
            // physical code.
            _ if code == "Semicolon" => Some(Self::ToggleDebug),
            _ => None,
        }
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
