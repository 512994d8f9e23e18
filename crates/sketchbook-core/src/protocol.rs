#![forbid(unsafe_code)]

//! Cross-window messaging contract shared by the editor frame, its host page
//! (lister/manager) and the preview frame.
//!
//! Every message is a JSON object tagged by `type`. Decoding goes through
//! [`Message::from_value`], which rejects unknown types and malformed
//! payloads before any handler sees them. Who is allowed to send what is
//! decided by the receiver from the [`Sender`] classification of the DOM
//! `event.source`.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::console::{ConsoleEntry, ConsoleLevel};
use crate::preview::FrameId;
use crate::shortcut::Shortcut;
use crate::view_mode::ViewMode;

/// Closed set of protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// parent → editor: run now.
    RunSketch,
    /// parent → editor: stop now.
    StopSketch,
    /// parent → editor: advance the view-mode ring.
    CycleViewMode,
    /// Either direction: a shortcut the sender could not handle itself.
    KeyboardShortcut { shortcut: Shortcut },
    /// editor → parent: dirty flag changed.
    SketchDirty { status: bool },
    /// editor → parent: a preview frame is running.
    SketchRunning,
    /// editor → parent: the preview frame was torn down.
    SketchStopped,
    /// editor → parent: view mode changed.
    ViewModeChanged {
        #[serde(rename = "viewMode")]
        view_mode: ViewMode,
    },
    /// host → editor: buffer persisted.
    SketchSaved,
    /// host → editor: buffer (re)loaded from storage.
    SketchLoaded,
    /// preview → editor: forwarded console call.
    ConsoleEntry {
        #[serde(default)]
        level: ConsoleLevel,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Wire names of every message type.
pub const MESSAGE_TYPES: [&str; 11] = [
    "runSketch",
    "stopSketch",
    "cycleViewMode",
    "keyboardShortcut",
    "sketchDirty",
    "sketchRunning",
    "sketchStopped",
    "viewModeChanged",
    "sketchSaved",
    "sketchLoaded",
    "consoleEntry",
];

/// Message that failed boundary validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload is not a JSON object.
    NotAnObject,
    /// Object has no string `type` field.
    MissingType,
    /// `type` is not part of the protocol.
    UnknownType(String),
    /// Known `type` with a malformed payload.
    InvalidPayload { kind: String, reason: String },
    /// Payload could not be parsed as JSON at all.
    Json(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "message is not an object"),
            Self::MissingType => write!(f, "message has no string `type` field"),
            Self::UnknownType(kind) => write!(f, "unknown message type {kind:?}"),
            Self::InvalidPayload { kind, reason } => {
                write!(f, "invalid {kind} payload: {reason}")
            }
            Self::Json(reason) => write!(f, "message is not valid JSON: {reason}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl Message {
    /// Validate and decode a structured-clone payload.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !MESSAGE_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_owned()));
        }
        Self::deserialize(value).map_err(|err| ProtocolError::InvalidPayload {
            kind: kind.to_owned(),
            reason: err.to_string(),
        })
    }

    /// Decode from JSON text (the wasm layer stringifies `event.data`).
    pub fn from_json_str(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| ProtocolError::Json(err.to_string()))?;
        Self::from_value(&value)
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        // Every variant serializes to a plain object; failure is impossible.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn to_json_string(&self) -> String {
        self.to_value().to_string()
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RunSketch => "runSketch",
            Self::StopSketch => "stopSketch",
            Self::CycleViewMode => "cycleViewMode",
            Self::KeyboardShortcut { .. } => "keyboardShortcut",
            Self::SketchDirty { .. } => "sketchDirty",
            Self::SketchRunning => "sketchRunning",
            Self::SketchStopped => "sketchStopped",
            Self::ViewModeChanged { .. } => "viewModeChanged",
            Self::SketchSaved => "sketchSaved",
            Self::SketchLoaded => "sketchLoaded",
            Self::ConsoleEntry { .. } => "consoleEntry",
        }
    }

    #[must_use]
    pub fn console_entry(entry: ConsoleEntry) -> Self {
        Self::ConsoleEntry {
            level: entry.level,
            args: entry.args,
        }
    }

    /// `true` for messages the editor may act on when sent by `sender`.
    ///
    /// `current_frame` is the preview frame the editor currently owns.
    #[must_use]
    pub fn editor_accepts(&self, sender: Sender, current_frame: Option<FrameId>) -> bool {
        match self {
            Self::RunSketch
            | Self::StopSketch
            | Self::CycleViewMode
            | Self::SketchSaved
            | Self::SketchLoaded => sender == Sender::Parent,
            Self::KeyboardShortcut { .. } => {
                matches!(sender, Sender::Parent | Sender::SameWindow)
            }
            Self::ConsoleEntry { .. } => match sender {
                Sender::Preview(id) => Some(id) == current_frame,
                _ => false,
            },
            Self::SketchDirty { .. }
            | Self::SketchRunning
            | Self::SketchStopped
            | Self::ViewModeChanged { .. } => false,
        }
    }

    /// `true` for messages a host page may act on when sent by `sender`.
    #[must_use]
    pub fn host_accepts(&self, sender: Sender) -> bool {
        match self {
            Self::SketchDirty { .. }
            | Self::SketchRunning
            | Self::SketchStopped
            | Self::ViewModeChanged { .. }
            | Self::KeyboardShortcut { .. } => sender == Sender::EditorFrame,
            _ => false,
        }
    }
}

/// Classification of a message's `event.source` window, done by the wasm
/// layer with reference equality against the known counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    /// `window.parent` of the editor frame.
    Parent,
    /// The embedded editor iframe's `contentWindow`, seen from the host.
    EditorFrame,
    /// The receiving window itself.
    SameWindow,
    /// A preview iframe the editor created.
    Preview(FrameId),
    /// Any other window.
    Unknown,
}
