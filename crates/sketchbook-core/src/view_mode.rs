#![forbid(unsafe_code)]

//! View-mode state machine: which of editor / preview / console are visible.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::EditorSnapshot;

/// URL query parameter that reflects the active view mode.
pub const VIEW_MODE_PARAM: &str = "viewMode";

/// The closed set of view modes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Editor only.
    Code,
    /// Preview only.
    Sketch,
    /// Editor layered over the preview.
    #[default]
    Overlay,
    /// Preview plus the console overlay, editor hidden.
    Debug,
}

/// Visibility of the three containers for one view mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Visibility {
    pub editor: bool,
    pub preview: bool,
    pub console: bool,
}

impl ViewMode {
    pub const ALL: [Self; 4] = [Self::Code, Self::Sketch, Self::Overlay, Self::Debug];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Sketch => "sketch",
            Self::Overlay => "overlay",
            Self::Debug => "debug",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "code" => Some(Self::Code),
            "sketch" => Some(Self::Sketch),
            "overlay" => Some(Self::Overlay),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Overlay)
    }

    #[must_use]
    pub const fn visibility(self) -> Visibility {
        match self {
            Self::Code => Visibility {
                editor: true,
                preview: false,
                console: false,
            },
            Self::Sketch => Visibility {
                editor: false,
                preview: true,
                console: false,
            },
            Self::Overlay => Visibility {
                editor: true,
                preview: true,
                console: false,
            },
            Self::Debug => Visibility {
                editor: false,
                preview: true,
                console: true,
            },
        }
    }

    /// Value for the `viewMode` query parameter; `None` means "omit it".
    #[must_use]
    pub const fn query_value(self) -> Option<&'static str> {
        if self.is_default() {
            None
        } else {
            Some(self.as_str())
        }
    }

    /// Ring used by the single "cycle" action: Overlay → Sketch → Debug → Overlay.
    ///
    /// `Code` is not part of the ring and cycles back to Overlay.
    #[must_use]
    pub const fn cycled(self) -> Self {
        match self {
            Self::Overlay => Self::Sketch,
            Self::Sketch => Self::Debug,
            Self::Debug | Self::Code => Self::Overlay,
        }
    }

    /// Cycle from a raw wire/URL value; anything unrecognised resets to Overlay.
    #[must_use]
    pub fn cycled_from_raw(raw: &str) -> Self {
        Self::parse(raw).map_or(Self::Overlay, Self::cycled)
    }

    /// `Ctrl+,`: Sketch goes back to Overlay, every other mode goes to Sketch.
    #[must_use]
    pub const fn toggled_sketch(self) -> Self {
        match self {
            Self::Sketch => Self::Overlay,
            _ => Self::Sketch,
        }
    }

    /// `Ctrl+;`: Debug goes back to Overlay, every other mode goes to Debug.
    #[must_use]
    pub const fn toggled_debug(self) -> Self {
        match self {
            Self::Debug => Self::Overlay,
            _ => Self::Debug,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string that is not one of the four view modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModeParseError {
    pub value: String,
}

impl fmt::Display for ViewModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid view mode {:?} (expected code, sketch, overlay or debug)",
            self.value
        )
    }
}

impl std::error::Error for ViewModeParseError {}

impl FromStr for ViewMode {
    type Err = ViewModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ViewModeParseError {
            value: s.to_owned(),
        })
    }
}

/// Outcome of one explicit transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ViewMode,
    pub to: ViewMode,
    pub visibility: Visibility,
    /// Editor state to reapply because the editor became visible again.
    pub restore: Option<EditorSnapshot>,
}

/// Owns the single active [`ViewMode`] and the editor snapshot taken when the
/// editor was last hidden.
#[derive(Debug, Clone, Default)]
pub struct ViewModeMachine {
    current: ViewMode,
    saved: Option<EditorSnapshot>,
}

impl ViewModeMachine {
    #[must_use]
    pub const fn new(initial: ViewMode) -> Self {
        Self {
            current: initial,
            saved: None,
        }
    }

    #[must_use]
    pub const fn current(&self) -> ViewMode {
        self.current
    }

    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        self.current.visibility()
    }

    /// Switch to `mode`. `editor` is the live editor state, captured when this
    /// transition hides the editor.
    pub fn set(&mut self, mode: ViewMode, editor: EditorSnapshot) -> Transition {
        let from = self.current;
        let was_visible = from.visibility().editor;
        let now_visible = mode.visibility().editor;

        if was_visible && !now_visible {
            self.saved = Some(editor);
        }
        let restore = if !was_visible && now_visible {
            self.saved.take()
        } else {
            None
        };

        self.current = mode;
        Transition {
            from,
            to: mode,
            visibility: mode.visibility(),
            restore,
        }
    }

    /// Validate `raw` against the closed set before switching.
    ///
    /// On error the machine is left untouched.
    pub fn set_raw(
        &mut self,
        raw: &str,
        editor: EditorSnapshot,
    ) -> Result<Transition, ViewModeParseError> {
        let mode = raw.parse::<ViewMode>()?;
        Ok(self.set(mode, editor))
    }

    pub fn cycle(&mut self, editor: EditorSnapshot) -> Transition {
        self.set(self.current.cycled(), editor)
    }
}
