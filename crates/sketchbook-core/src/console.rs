#![forbid(unsafe_code)]

//! Console overlay relay for log entries forwarded by the preview frame.

use serde::{Deserialize, Serialize};

/// Console method the entry was logged with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    #[default]
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Log => "console-log",
            Self::Info => "console-info",
            Self::Warn => "console-warn",
            Self::Error => "console-error",
            Self::Debug => "console-debug",
        }
    }
}

/// One forwarded `console.*` call, arguments already stringified by the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    #[serde(default)]
    pub level: ConsoleLevel,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ConsoleEntry {
    #[must_use]
    pub fn new(level: ConsoleLevel, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            level,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Text shown in the overlay: arguments joined by a space.
    #[must_use]
    pub fn line(&self) -> String {
        self.args.join(" ")
    }
}

/// Overlay visibility plus a count of lines shown since the last clear.
#[derive(Debug, Clone, Default)]
pub struct ConsoleRelay {
    visible: bool,
    shown: usize,
}

impl ConsoleRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub const fn shown(&self) -> usize {
        self.shown
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn record(&mut self) {
        self.shown = self.shown.saturating_add(1);
    }

    pub fn clear(&mut self) {
        self.shown = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_line_joins_args() {
        let entry = ConsoleEntry::new(ConsoleLevel::Warn, ["frame", "12"]);
        assert_eq!(entry.line(), "frame 12");
        assert_eq!(entry.level.css_class(), "console-warn");
    }

    #[test]
    fn entry_deserializes_with_defaults() {
        let entry: ConsoleEntry = serde_json::from_str("{}").unwrap();
        assert_eq!(entry.level, ConsoleLevel::Log);
        assert!(entry.args.is_empty());
    }

    #[test]
    fn relay_counts_and_clears() {
        let mut relay = ConsoleRelay::new();
        relay.record();
        relay.record();
        assert_eq!(relay.shown(), 2);
        relay.clear();
        assert_eq!(relay.shown(), 0);
    }
}
