#![forbid(unsafe_code)]

//! `sketchbook-core` holds the in-browser sketch editor/runner logic without
//! binding to a document.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedding layer pushes text, selection, key and
//!   message events in; the session never reads the DOM.
//! - **Effects out**: every visible change (container visibility, preview
//!   frame lifecycle, URL reflection, parent notifications, fetch requests) is
//!   queued as an [`Effect`] and applied by the host in issue order.
//! - **Single owner**: one [`EditorSession`] is constructed per page and owns
//!   all editor state; there are no ambient globals.
//!
//! `sketchbook-web` wraps this crate with the `wasm-bindgen` surface.

pub mod annotator;
pub mod buffer;
pub mod config;
pub mod console;
pub mod editor;
pub mod effect;
pub mod formatter;
pub mod preview;
pub mod protocol;
pub mod shortcut;
pub mod status;
pub mod template;
pub mod view_mode;

pub use annotator::{GutterUpdate, LineAnnotator, LineInfo, LineKind};
pub use buffer::{Buffer, EditorSnapshot, Selection};
pub use config::EditorConfig;
pub use console::{ConsoleEntry, ConsoleLevel, ConsoleRelay};
pub use editor::{EditorCommand, EditorSession};
pub use effect::{Effect, Effects};
pub use formatter::{FormatOptions, TextEdit};
pub use preview::{FetchError, FrameId, PreviewController, PreviewError, SandboxPolicy};
pub use protocol::{Message, ProtocolError, Sender};
pub use shortcut::{Modifiers, Shortcut};
pub use status::{CursorPosition, StatusLine};
pub use template::{PreviewTemplate, TemplateError};
pub use view_mode::{ViewMode, ViewModeMachine, ViewModeParseError, Visibility};
