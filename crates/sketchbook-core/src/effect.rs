#![forbid(unsafe_code)]

//! Side effects queued by the editor session for the host to apply.

use std::collections::VecDeque;

use crate::annotator::GutterUpdate;
use crate::buffer::{EditorSnapshot, Selection};
use crate::console::ConsoleEntry;
use crate::preview::FrameId;
use crate::protocol::Message;
use crate::status::StatusLine;
use crate::view_mode::{ViewMode, Visibility};

/// One document mutation or outbound request.
///
/// Hosts must apply effects in the order they were drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show or hide the editor, preview and console containers.
    SetVisibility(Visibility),
    /// Rewrite the `viewMode` query parameter (`None` removes it) with
    /// `history.replaceState`.
    ReplaceViewModeParam(Option<ViewMode>),
    /// Reapply scroll offset and selection to the editor surface.
    RestoreEditor(EditorSnapshot),
    /// Replace the editor surface text (formatter, toggle, load, clear).
    ReplaceBuffer {
        text: String,
        selection: Selection,
        scroll_top: i32,
    },
    Gutter(GutterUpdate),
    Status(StatusLine),
    ConsoleClear,
    ConsoleAppend(ConsoleEntry),
    /// Remove the frame from the document and drop every reference to it.
    RemoveFrame(FrameId),
    /// Create an empty sandboxed iframe in the preview container.
    CreateFrame { id: FrameId, sandbox: String },
    /// Load `html` into the frame created for `id`.
    WriteDocument { id: FrameId, html: String },
    PostToParent(Message),
    /// Fetch the clean preview document; answer with `template_fetched`.
    FetchTemplate { url: String },
    /// Fetch the stored sketch script; answer with `source_fetched`.
    FetchSource { url: String },
    /// Give keyboard focus back to the editor surface.
    Focus,
}

impl Effect {
    /// Variant name, for logs and assertions.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetVisibility(_) => "SetVisibility",
            Self::ReplaceViewModeParam(_) => "ReplaceViewModeParam",
            Self::RestoreEditor(_) => "RestoreEditor",
            Self::ReplaceBuffer { .. } => "ReplaceBuffer",
            Self::Gutter(_) => "Gutter",
            Self::Status(_) => "Status",
            Self::ConsoleClear => "ConsoleClear",
            Self::ConsoleAppend(_) => "ConsoleAppend",
            Self::RemoveFrame(_) => "RemoveFrame",
            Self::CreateFrame { .. } => "CreateFrame",
            Self::WriteDocument { .. } => "WriteDocument",
            Self::PostToParent(_) => "PostToParent",
            Self::FetchTemplate { .. } => "FetchTemplate",
            Self::FetchSource { .. } => "FetchSource",
            Self::Focus => "Focus",
        }
    }
}

/// FIFO queue of pending effects.
#[derive(Debug, Clone, Default)]
pub struct Effects {
    queue: VecDeque<Effect>,
}

impl Effects {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.queue.push_back(effect);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.queue.iter()
    }

    /// Remove and yield every queued effect in issue order.
    pub fn drain(&mut self) -> impl Iterator<Item = Effect> + '_ {
        self.queue.drain(..)
    }

    /// Move every queued effect into a `Vec`.
    pub fn take(&mut self) -> Vec<Effect> {
        self.queue.drain(..).collect()
    }
}

impl Extend<Effect> for Effects {
    fn extend<I: IntoIterator<Item = Effect>>(&mut self, iter: I) {
        self.queue.extend(iter);
    }
}
