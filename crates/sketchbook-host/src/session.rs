#![forbid(unsafe_code)]

//! Manager and lister page state.
//!
//! Both hosts embed one editor frame and keep a play/stop toggle and a
//! view-mode breadcrumb in sync with it. The manager additionally owns the
//! member's sketch list and persists through [`SketchApi`](crate::SketchApi).
//!
//! Persistence is split into `prepare_*` / `finish_*` pairs. `prepare_*`
//! snapshots what the request needs; the web layer awaits the API call with
//! no borrow of the session held; `finish_*` re-resolves the target record
//! by slug, since the list may have changed during the await.

use serde_json::Value;
use sketchbook_core::{Message, ProtocolError, Sender, Shortcut, ViewMode};

use crate::api::{ApiError, SaveOutcome, SketchRecord};
use crate::config::HostConfig;
use crate::metadata::{MetadataDraft, SketchMetadata};

const SAVE_FAILED: &str = "Failed to save sketch. Please try again.";
const NOTHING_TO_SAVE: &str =
    "No code found to save. Please check that the sketch is loaded properly.";
const METADATA_FAILED: &str = "Failed to update metadata. Please try again.";
const NO_SKETCH_TO_DELETE: &str = "No sketch selected to delete";
const NO_SKETCH_FOR_METADATA: &str = "Please select a sketch to edit metadata.";
const DELETE_FAILED: &str = "Failed to delete sketch. Please try again.";
const LOAD_FAILED: &str = "Failed to load sketches. Please refresh the page.";
const CONFIRM_SWITCH: &str = "You have unsaved changes. Are you sure you want to switch sketches?";
const CONFIRM_NEW: &str = "You have unsaved changes. \
    Are you sure you want to create a new sketch? Your changes will be lost.";
const EMPTY_LINK: &str = "/empty-iframe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Blocking user notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// Side effect for the web layer, applied in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEffect {
    /// `postMessage` to the editor frame's `contentWindow`.
    PostToEditor(Message),
    /// Point the editor frame at a new page.
    LoadEditor { url: String },
    Notify(Notice),
    /// Leave the page.
    Redirect { url: String },
    /// Read the editor buffer and call [`SessionHost::prepare_save`].
    RequestSave,
}

/// Where a navigation goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Sketch(usize),
    New,
}

impl Target {
    /// Question asked before discarding unsaved changes.
    #[must_use]
    pub const fn confirmation_text(self) -> &'static str {
        match self {
            Self::Sketch(_) => CONFIRM_SWITCH,
            Self::New => CONFIRM_NEW,
        }
    }
}

/// Outcome of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved(Target),
    /// Unsaved changes; call `confirm_navigation`.
    NeedsConfirmation(Target),
    Unchanged,
}

/// What the host believes about the embedded editor. Last message wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EditorLink {
    running: bool,
    view_mode: ViewMode,
}

impl EditorLink {
    fn observe(&mut self, message: &Message) {
        match message {
            Message::SketchRunning => self.running = true,
            Message::SketchStopped => self.running = false,
            Message::ViewModeChanged { view_mode } => self.view_mode = *view_mode,
            _ => {}
        }
    }

    fn toggle_message(self) -> Message {
        if self.running {
            Message::StopSketch
        } else {
            Message::RunSketch
        }
    }
}

/// Label and tooltip of the play/stop toggle.
#[must_use]
pub const fn play_button(running: bool) -> (&'static str, &'static str) {
    if running {
        ("stop", "Stop sketch (Ctrl+.)")
    } else {
        ("play", "Run sketch (Ctrl+Enter)")
    }
}

fn decode(sender: Sender, value: &Value) -> Result<Option<Message>, ProtocolError> {
    let message = Message::from_value(value).inspect_err(|err| {
        tracing::warn!(error = %err, "dropping malformed editor message");
    })?;
    if message.host_accepts(sender) {
        Ok(Some(message))
    } else {
        tracing::debug!(kind = message.kind(), ?sender, "ignoring message from untrusted sender");
        Ok(None)
    }
}

fn with_view_mode(url: String, mode: ViewMode) -> String {
    match mode.query_value() {
        Some(value) => format!("{url}?{}={value}", sketchbook_core::view_mode::VIEW_MODE_PARAM),
        None => url,
    }
}

// ── Manager ──────────────────────────────────────────────────────────────

/// Snapshot for a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub member: Option<String>,
    /// `None` creates a new sketch.
    pub slug: Option<String>,
    pub source: String,
    /// Editor page the source was read from; see [`SessionHost::finish_save`].
    pub page: u64,
}

/// Snapshot for a delete or metadata request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchRef {
    pub member: String,
    pub slug: String,
}

/// Manager page: the signed-in member's sketches.
#[derive(Debug)]
pub struct SessionHost {
    config: HostConfig,
    member: Option<String>,
    records: Vec<SketchRecord>,
    current: Option<usize>,
    dirty: bool,
    editor: EditorLink,
    pending: Option<Target>,
    /// Bumped every time the editor frame is pointed at another page.
    page: u64,
    effects: Vec<HostEffect>,
}

impl SessionHost {
    pub fn new(config: HostConfig) -> Self {
        let member = config.member.clone();
        Self {
            config,
            member,
            records: Vec::new(),
            current: None,
            dirty: false,
            editor: EditorLink::default(),
            pending: None,
            page: 0,
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    #[must_use]
    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    #[must_use]
    pub fn records(&self) -> &[SketchRecord] {
        &self.records
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    #[must_use]
    pub fn current(&self) -> Option<&SketchRecord> {
        self.current.and_then(|i| self.records.get(i))
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.editor.running
    }

    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        self.editor.view_mode
    }

    pub fn drain_effects(&mut self) -> Vec<HostEffect> {
        std::mem::take(&mut self.effects)
    }

    /// Text of the status badge.
    #[must_use]
    pub fn status_label(&self) -> &str {
        if self.dirty {
            return "unsaved*";
        }
        match self.current() {
            Some(record) if !record.title.is_empty() => record.title.as_str(),
            _ => "untitled",
        }
    }

    /// Save is offered while there is something to save.
    #[must_use]
    pub fn can_save(&self) -> bool {
        self.current.is_some() || self.dirty
    }

    /// Delete and metadata editing apply to stored sketches only.
    #[must_use]
    pub fn can_modify(&self) -> bool {
        self.current().is_some_and(|record| !record.slug.is_empty())
    }

    /// Public page of the current sketch.
    #[must_use]
    pub fn sketch_link(&self) -> String {
        match (self.member.as_deref(), self.current()) {
            (Some(member), Some(record)) => {
                format!("{}/{member}/{}", self.config.sketches_base, record.slug)
            }
            _ => EMPTY_LINK.to_owned(),
        }
    }

    /// Show the empty editor when the member is already known.
    pub fn start(&mut self) {
        if self.member.is_some() {
            self.go(Target::New);
        }
    }

    // ── Sketch list ──────────────────────────────────────────────────────

    /// Member to list for; `None` means resolve `members/me` first.
    #[must_use]
    pub fn prepare_load(&self) -> Option<String> {
        self.member.clone()
    }

    pub fn finish_load(&mut self, result: Result<(String, Vec<SketchRecord>), ApiError>) {
        match result {
            Ok((member, records)) => {
                tracing::info!(member = %member, count = records.len(), "sketch list loaded");
                let first_resolution = self.member.is_none();
                let slug = self.current().map(|record| record.slug.clone());
                self.member = Some(member);
                self.records = records;
                self.current = slug.and_then(|slug| self.index_of(&slug));
                if first_resolution {
                    self.go(Target::New);
                }
            }
            Err(err) => self.report_failure(&err, LOAD_FAILED),
        }
    }

    // ── Navigation ───────────────────────────────────────────────────────

    pub fn next(&mut self) -> Navigation {
        match self.step(1) {
            Some(index) => self.navigate(Target::Sketch(index)),
            None => Navigation::Unchanged,
        }
    }

    pub fn previous(&mut self) -> Navigation {
        match self.step(-1) {
            Some(index) => self.navigate(Target::Sketch(index)),
            None => Navigation::Unchanged,
        }
    }

    pub fn select(&mut self, index: usize) -> Navigation {
        if index >= self.records.len() {
            tracing::warn!(index, len = self.records.len(), "sketch index out of range");
            return Navigation::Unchanged;
        }
        self.navigate(Target::Sketch(index))
    }

    pub fn select_slug(&mut self, slug: &str) -> Navigation {
        match self.index_of(slug) {
            Some(index) => self.navigate(Target::Sketch(index)),
            None => {
                tracing::warn!(slug, "unknown sketch");
                Navigation::Unchanged
            }
        }
    }

    pub fn new_sketch(&mut self) -> Navigation {
        self.navigate(Target::New)
    }

    /// Resolve a pending [`Navigation::NeedsConfirmation`].
    pub fn confirm_navigation(&mut self, discard: bool) -> Navigation {
        match self.pending.take() {
            Some(target) if discard => self.go(target),
            _ => Navigation::Unchanged,
        }
    }

    fn step(&self, delta: isize) -> Option<usize> {
        let len = self.records.len();
        match self.current {
            _ if len == 0 => None,
            None if delta > 0 => Some(0),
            None => Some(len - 1),
            Some(_) if len < 2 => None,
            Some(i) => Some((i as isize + delta).rem_euclid(len as isize) as usize),
        }
    }

    fn navigate(&mut self, target: Target) -> Navigation {
        let unchanged = match target {
            Target::Sketch(index) => self.current == Some(index),
            Target::New => false,
        };
        if unchanged {
            return Navigation::Unchanged;
        }
        if self.dirty && self.config.confirm_discard {
            self.pending = Some(target);
            return Navigation::NeedsConfirmation(target);
        }
        self.go(target)
    }

    fn go(&mut self, target: Target) -> Navigation {
        let Some(member) = self.member.clone() else {
            tracing::warn!("member unknown, cannot open the editor");
            return Navigation::Unchanged;
        };
        let url = match target {
            Target::Sketch(index) => match self.records.get(index) {
                Some(record) => self.config.editor_url(&member, &record.slug),
                None => return Navigation::Unchanged,
            },
            Target::New => self.config.new_editor_url(&member),
        };
        self.current = match target {
            Target::Sketch(index) => Some(index),
            Target::New => None,
        };
        self.pending = None;
        self.page += 1;
        self.dirty = false;
        self.editor.running = false;
        self.effects.push(HostEffect::LoadEditor {
            url: with_view_mode(url, self.editor.view_mode),
        });
        Navigation::Moved(target)
    }

    /// The editor frame finished loading a page.
    pub fn editor_loaded(&mut self) {
        self.dirty = false;
        self.post(Message::SketchLoaded);
    }

    // ── Editor link ──────────────────────────────────────────────────────

    pub fn toggle_play(&mut self) {
        let message = self.editor.toggle_message();
        self.post(message);
    }

    pub fn cycle_view(&mut self) {
        self.post(Message::CycleViewMode);
    }

    pub fn handle_message(&mut self, sender: Sender, value: &Value) -> Result<(), ProtocolError> {
        if let Some(message) = decode(sender, value)? {
            self.handle(message);
        }
        Ok(())
    }

    /// Apply a message already checked with [`Message::host_accepts`].
    pub fn handle(&mut self, message: Message) {
        self.editor.observe(&message);
        match message {
            Message::SketchDirty { status } => self.dirty = status,
            Message::KeyboardShortcut {
                shortcut: Shortcut::Save,
            } => {
                if self.can_save() {
                    self.effects.push(HostEffect::RequestSave);
                } else {
                    tracing::debug!("nothing to save");
                }
            }
            _ => {}
        }
    }

    fn post(&mut self, message: Message) {
        self.effects.push(HostEffect::PostToEditor(message));
    }

    // ── Save ─────────────────────────────────────────────────────────────

    /// `source` is the editor buffer as read by the web layer.
    pub fn prepare_save(&mut self, source: &str) -> Option<SaveRequest> {
        if source.trim().is_empty() {
            self.notify(Notice::error(NOTHING_TO_SAVE));
            return None;
        }
        Some(SaveRequest {
            member: self.member.clone(),
            slug: self.current().map(|record| record.slug.clone()),
            source: source.to_owned(),
            page: self.page,
        })
    }

    /// Store the outcome of a save. When the editor has moved to another
    /// page since [`prepare_save`](Self::prepare_save), the record list is
    /// still updated but the selection, the dirty flag and the loaded editor
    /// are left alone.
    pub fn finish_save(&mut self, request: &SaveRequest, result: Result<SaveOutcome, ApiError>) {
        let same_page = request.page == self.page;
        let index = match result {
            Ok(SaveOutcome::Created { member, record }) => {
                self.member.get_or_insert(member);
                self.records.push(record);
                let index = self.records.len() - 1;
                if same_page {
                    self.current = Some(index);
                }
                Some(index)
            }
            Ok(SaveOutcome::Updated { member, fields }) => {
                self.member.get_or_insert(member);
                let slug = request.slug.as_deref().unwrap_or_default();
                match self.index_of(slug) {
                    Some(index) => {
                        if let Err(err) = self.records[index].merge(&fields) {
                            tracing::warn!(error = %err, "save response not merged");
                        }
                        Some(index)
                    }
                    None => {
                        tracing::warn!(slug, "saved sketch no longer listed");
                        None
                    }
                }
            }
            Err(err) => {
                self.report_failure(&err, SAVE_FAILED);
                return;
            }
        };
        if same_page {
            self.dirty = false;
            self.post(Message::SketchSaved);
        } else {
            tracing::info!("editor moved on during save, keeping its state");
        }
        let title = index
            .and_then(|i| self.records.get(i))
            .map_or_else(String::new, |record| record.display_title().to_owned());
        tracing::info!(title = %title, "sketch saved");
        self.notify(Notice::success(format!("Sketch \"{title}\" saved successfully!")));
    }

    // ── Delete ───────────────────────────────────────────────────────────

    /// Question asked before deleting the current sketch.
    #[must_use]
    pub fn delete_confirmation(&self) -> Option<String> {
        self.current().map(|record| {
            format!(
                "Are you sure you want to delete \"{}\"? This action cannot be undone.",
                record.display_title()
            )
        })
    }

    /// Confirmation is the web layer's job; call this after it.
    pub fn prepare_delete(&mut self) -> Option<SketchRef> {
        let target = self.current_ref();
        if target.is_none() {
            self.notify(Notice::error(NO_SKETCH_TO_DELETE));
        }
        target
    }

    /// Drop the deleted record. The editor falls back to a new sketch only
    /// when it was still showing the deleted one.
    pub fn finish_delete(&mut self, target: &SketchRef, result: Result<(), ApiError>) {
        if let Err(err) = result {
            self.report_failure(&err, DELETE_FAILED);
            return;
        }
        let title = match self.index_of(&target.slug) {
            Some(index) => {
                let record = self.records.remove(index);
                match self.current {
                    Some(current) if current == index => {
                        self.current = None;
                        self.go(Target::New);
                    }
                    Some(current) if current > index => self.current = Some(current - 1),
                    _ => {}
                }
                record.display_title().to_owned()
            }
            None => target.slug.clone(),
        };
        tracing::info!(slug = %target.slug, "sketch deleted");
        self.notify(Notice::success(format!("Sketch \"{title}\" deleted successfully!")));
    }

    // ── Metadata ─────────────────────────────────────────────────────────

    /// Form contents for the current sketch.
    #[must_use]
    pub fn metadata_draft(&self) -> Option<MetadataDraft> {
        self.current().map(|record| MetadataDraft {
            title: record.title.clone(),
            description: record.description.clone(),
            keywords: record.keywords.clone(),
            tags: record.tags.join(", "),
            external_libs: record.external_libs.clone(),
        })
    }

    /// Form contents for the metadata dialog, or a notice when nothing is selected.
    pub fn open_metadata(&mut self) -> Option<MetadataDraft> {
        let draft = self.metadata_draft();
        if draft.is_none() {
            self.notify(Notice::error(NO_SKETCH_FOR_METADATA));
        }
        draft
    }

    pub fn prepare_metadata(
        &mut self,
        draft: MetadataDraft,
    ) -> Option<(SketchRef, SketchMetadata)> {
        let Some(target) = self.current_ref() else {
            self.notify(Notice::error(NO_SKETCH_FOR_METADATA));
            return None;
        };
        match draft.into_metadata() {
            Ok(metadata) => Some((target, metadata)),
            Err(err) => {
                tracing::warn!(code = err.code(), "metadata rejected");
                self.notify(Notice::error(err.to_string()));
                None
            }
        }
    }

    pub fn finish_metadata(&mut self, target: &SketchRef, result: Result<Value, ApiError>) {
        let fields = match result {
            Ok(fields) => fields,
            Err(ApiError::Validation(err)) => {
                self.notify(Notice::error(err.to_string()));
                return;
            }
            Err(err) => {
                self.report_failure(&err, METADATA_FAILED);
                return;
            }
        };
        let Some(index) = self.index_of(&target.slug) else {
            tracing::warn!(slug = %target.slug, "updated sketch no longer listed");
            return;
        };
        let record = &mut self.records[index];
        if let Err(err) = record.merge(&fields) {
            tracing::warn!(error = %err, "metadata response not merged");
        }
        let title = record.display_title().to_owned();
        self.notify(Notice::success(format!(
            "Metadata for \"{title}\" updated successfully!"
        )));
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn current_ref(&self) -> Option<SketchRef> {
        let member = self.member.clone()?;
        let record = self.current()?;
        Some(SketchRef {
            member,
            slug: record.slug.clone(),
        })
    }

    fn index_of(&self, slug: &str) -> Option<usize> {
        self.records.iter().position(|record| record.slug == slug)
    }

    fn notify(&mut self, notice: Notice) {
        self.effects.push(HostEffect::Notify(notice));
    }

    fn report_failure(&mut self, err: &ApiError, text: &str) {
        if matches!(err, ApiError::Unauthorized) {
            tracing::warn!("session expired, redirecting to sign-in");
            self.effects.push(HostEffect::Redirect {
                url: self.config.sign_in_url.clone(),
            });
            return;
        }
        tracing::error!(error = %err, "persistence request failed");
        self.notify(Notice::error(text));
    }
}

// ── Lister ───────────────────────────────────────────────────────────────

/// One browsable sketch, read from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListerEntry {
    pub member: String,
    pub slug: String,
    pub title: String,
}

/// Read-only browser over every member's sketches.
#[derive(Debug)]
pub struct ListerSession {
    config: HostConfig,
    entries: Vec<ListerEntry>,
    current: Option<usize>,
    editor: EditorLink,
    effects: Vec<HostEffect>,
}

impl ListerSession {
    pub fn new(config: HostConfig, entries: Vec<ListerEntry>) -> Self {
        Self {
            config,
            entries,
            current: None,
            editor: EditorLink::default(),
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[ListerEntry] {
        &self.entries
    }

    #[must_use]
    pub fn current(&self) -> Option<&ListerEntry> {
        self.current.and_then(|i| self.entries.get(i))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.editor.running
    }

    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        self.editor.view_mode
    }

    pub fn drain_effects(&mut self) -> Vec<HostEffect> {
        std::mem::take(&mut self.effects)
    }

    /// Public page of the current entry.
    #[must_use]
    pub fn sketch_link(&self) -> Option<String> {
        self.current()
            .map(|entry| format!("{}/{}/{}", self.config.sketches_base, entry.member, entry.slug))
    }

    /// Open the entry at `seed % len`; the web layer passes a random seed.
    pub fn start(&mut self, seed: usize) {
        if !self.entries.is_empty() {
            self.select(seed % self.entries.len());
        }
    }

    pub fn select(&mut self, index: usize) -> bool {
        let Some(entry) = self.entries.get(index) else {
            tracing::warn!(index, len = self.entries.len(), "sketch index out of range");
            return false;
        };
        let url = with_view_mode(
            self.config.editor_url(&entry.member, &entry.slug),
            self.editor.view_mode,
        );
        self.current = Some(index);
        self.editor.running = false;
        self.effects.push(HostEffect::LoadEditor { url });
        true
    }

    pub fn next(&mut self) -> bool {
        self.step(1)
    }

    pub fn previous(&mut self) -> bool {
        self.step(-1)
    }

    fn step(&mut self, delta: isize) -> bool {
        let len = self.entries.len();
        if len == 0 {
            return false;
        }
        let index = match self.current {
            Some(_) if len < 2 => return false,
            Some(i) => (i as isize + delta).rem_euclid(len as isize) as usize,
            None if delta > 0 => 0,
            None => len - 1,
        };
        self.select(index)
    }

    pub fn toggle_play(&mut self) {
        let message = self.editor.toggle_message();
        self.effects.push(HostEffect::PostToEditor(message));
    }

    pub fn cycle_view(&mut self) {
        self.effects.push(HostEffect::PostToEditor(Message::CycleViewMode));
    }

    pub fn handle_message(&mut self, sender: Sender, value: &Value) -> Result<(), ProtocolError> {
        if let Some(message) = decode(sender, value)? {
            self.editor.observe(&message);
        }
        Ok(())
    }
}
