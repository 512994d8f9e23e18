#![forbid(unsafe_code)]

//! The editor session: single owner of all editor-frame state.
//!
//! # Event flow
//!
//! ```text
//! DOM event ──> on_input / on_selection / on_key / handle_message
//!                  │
//!                  ├─ Buffer, LineAnnotator, StatusLine      (derived state)
//!                  ├─ ViewModeMachine                        (visibility + URL)
//!                  ├─ PreviewController                      (frame lifecycle)
//!                  ▼
//!               Effects queue ──> drain_effects() ──> host applies in order
//! ```
//!
//! Fetches are also effects. Their results come back through
//! [`EditorSession::template_fetched`] and [`EditorSession::source_fetched`],
//! and everything that may have changed while the fetch was in flight is
//! re-checked at that point.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::annotator::LineAnnotator;
use crate::buffer::{Buffer, Selection};
use crate::config::EditorConfig;
use crate::console::{ConsoleEntry, ConsoleRelay};
use crate::effect::{Effect, Effects};
use crate::formatter::{self, TextEdit};
use crate::preview::{FetchError, FrameId, PreviewController, PreviewError};
use crate::protocol::{Message, ProtocolError, Sender};
use crate::shortcut::{Modifiers, Shortcut};
use crate::status::StatusLine;
use crate::view_mode::{ViewMode, ViewModeMachine, ViewModeParseError, Visibility};

/// User-level editor actions, reachable from shortcuts, toolbar buttons and
/// parent messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorCommand {
    Run,
    Stop,
    Format,
    ToggleComment,
    CycleViewMode,
    /// Sketch ⇄ Overlay.
    ToggleSketch,
    /// Debug ⇄ Overlay.
    ToggleDebug,
    /// Ask the host to persist the buffer.
    Save,
    Clear,
}

impl From<Shortcut> for EditorCommand {
    fn from(shortcut: Shortcut) -> Self {
        match shortcut {
            Shortcut::Run => Self::Run,
            Shortcut::Stop => Self::Stop,
            Shortcut::Format => Self::Format,
            Shortcut::ToggleComment => Self::ToggleComment,
            Shortcut::ToggleSketch => Self::ToggleSketch,
            Shortcut::ToggleDebug => Self::ToggleDebug,
            Shortcut::Save => Self::Save,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bootstrap {
    NotStarted,
    AwaitingTemplate,
    AwaitingSource,
    Done,
}

/// Editor frame state plus the queue of effects it produced.
#[derive(Debug)]
pub struct EditorSession {
    config: EditorConfig,
    embedded: bool,
    buffer: Buffer,
    view: ViewModeMachine,
    preview: PreviewController,
    annotator: LineAnnotator,
    console: ConsoleRelay,
    status: StatusLine,
    dirty: bool,
    bootstrap: Bootstrap,
    effects: Effects,
}

impl EditorSession {
    /// Create a session. `embedded` is `true` when the editor runs inside a
    /// parent page, which enables parent notifications.
    #[must_use]
    pub fn new(config: EditorConfig, embedded: bool) -> Self {
        let preview = PreviewController::new(config.template_url.clone(), config.sandbox.clone());
        Self {
            view: ViewModeMachine::new(config.initial_view_mode),
            config,
            embedded,
            buffer: Buffer::default(),
            preview,
            annotator: LineAnnotator::new(),
            console: ConsoleRelay::new(),
            status: StatusLine::default(),
            dirty: false,
            bootstrap: Bootstrap::NotStarted,
            effects: Effects::new(),
        }
    }

    /// Seed the buffer with server-rendered text before [`Self::start`].
    /// Does not mark the buffer dirty.
    pub fn with_initial_text(mut self, text: impl Into<String>) -> Self {
        self.buffer.set_text(text);
        self
    }

    // ---- accessors ------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[must_use]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    #[must_use]
    pub const fn view_mode(&self) -> ViewMode {
        self.view.current()
    }

    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        self.view.visibility()
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.preview.is_running()
    }

    #[must_use]
    pub const fn active_frame(&self) -> Option<FrameId> {
        self.preview.active_frame()
    }

    #[must_use]
    pub fn preview(&self) -> &PreviewController {
        &self.preview
    }

    #[must_use]
    pub fn annotator(&self) -> &LineAnnotator {
        &self.annotator
    }

    #[must_use]
    pub fn console(&self) -> &ConsoleRelay {
        &self.console
    }

    #[must_use]
    pub const fn status(&self) -> StatusLine {
        self.status
    }

    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrap == Bootstrap::Done
    }

    /// Take every effect queued so far, in issue order.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.effects.take()
    }

    // ---- lifecycle ------------------------------------------------------

    /// Apply the initial view mode, render derived state and begin the
    /// template capture. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if self.bootstrap != Bootstrap::NotStarted {
            return;
        }
        let mode = self.view.current();
        info!(view_mode = %mode, embedded = self.embedded, "editor session starting");
        self.apply_visibility(self.view.visibility());
        let param = (!mode.is_default()).then_some(mode);
        self.effects.push(Effect::ReplaceViewModeParam(param));
        self.post(Message::ViewModeChanged { view_mode: mode });
        self.refresh_derived();

        self.bootstrap = Bootstrap::AwaitingTemplate;
        if !self.preview.request_capture(&mut self.effects) {
            self.finish_bootstrap();
        }
    }

    /// Result of a [`Effect::FetchTemplate`].
    pub fn template_fetched(&mut self, result: Result<String, FetchError>) {
        let captured = self.preview.capture_template(result);
        let script_path = match captured {
            Ok(template) => template.sketch_js_path().map(str::to_owned),
            Err(_) => {
                if self.bootstrap == Bootstrap::AwaitingTemplate {
                    self.bootstrap = Bootstrap::Done;
                }
                return;
            }
        };
        let pending_run = self.preview.take_run_after_capture();

        if self.bootstrap == Bootstrap::AwaitingTemplate {
            match script_path {
                Some(url) if self.buffer.is_blank() => {
                    debug!(url = %url, "fetching stored sketch source");
                    self.bootstrap = Bootstrap::AwaitingSource;
                    self.effects.push(Effect::FetchSource { url });
                    if pending_run {
                        self.preview.set_run_after_capture(true);
                    }
                    return;
                }
                _ => {
                    self.bootstrap = Bootstrap::Done;
                    if self.config.auto_run || pending_run {
                        self.run_if_not_blank();
                    }
                    return;
                }
            }
        }

        if pending_run {
            self.run();
        }
    }

    /// Result of a [`Effect::FetchSource`]. The source fills the buffer only
    /// if the user has not typed anything in the meantime.
    pub fn source_fetched(&mut self, result: Result<String, FetchError>) {
        if self.bootstrap != Bootstrap::AwaitingSource {
            debug!("ignoring unexpected sketch source");
            return;
        }
        match result {
            Ok(source) if self.buffer.is_blank() => {
                info!(len = source.len(), "loaded stored sketch source");
                self.buffer.replace(source, Selection::caret(0));
                self.buffer.set_scroll_top(0);
                self.push_buffer();
                self.refresh_derived();
            }
            Ok(_) => debug!("buffer already edited, keeping it"),
            Err(err) => warn!(error = %err, "could not fetch stored sketch source"),
        }
        self.finish_bootstrap();
    }

    fn finish_bootstrap(&mut self) {
        self.bootstrap = Bootstrap::Done;
        let pending_run = self.preview.take_run_after_capture();
        if self.config.auto_run || pending_run {
            self.run_if_not_blank();
        }
    }

    /// The host finished loading a frame's document.
    ///
    /// Returns `false` when the frame has been replaced since.
    pub fn frame_loaded(&mut self, id: FrameId) -> bool {
        if !self.preview.is_current(id) {
            debug!(frame = %id, "ignoring load of stale preview frame");
            return false;
        }
        debug!(frame = %id, "preview frame loaded");
        true
    }

    // ---- editor surface events -----------------------------------------

    /// Text changed on the editor surface.
    pub fn on_input(&mut self, text: impl Into<String>, selection: Selection) {
        self.buffer.replace(text, selection);
        self.refresh_derived();
        self.set_dirty(true);
    }

    /// Caret or selection moved without a text change.
    pub fn on_selection(&mut self, selection: Selection) {
        self.buffer.set_selection(selection);
        let status = StatusLine::compute(self.buffer.text(), self.buffer.selection().start);
        if let Some(update) = self.annotator.set_current_line(status.cursor.line - 1) {
            self.effects.push(Effect::Gutter(update));
        }
        self.push_status(status);
    }

    pub fn on_scroll(&mut self, scroll_top: i32) {
        self.buffer.set_scroll_top(scroll_top);
    }

    /// Key pressed on the editor surface. Returns `true` when the event was
    /// consumed and its default action should be prevented.
    pub fn on_key(&mut self, key: &str, code: &str, mods: Modifiers) -> bool {
        let Some(shortcut) = Shortcut::from_dom(key, code, mods) else {
            return false;
        };
        debug!(shortcut = %shortcut, "keyboard shortcut");
        self.shortcut(shortcut);
        true
    }

    fn shortcut(&mut self, shortcut: Shortcut) {
        if shortcut == Shortcut::Stop {
            self.clear_console();
        }
        self.execute(shortcut.into());
    }

    /// Run a user command.
    pub fn execute(&mut self, command: EditorCommand) {
        match command {
            EditorCommand::Run => self.run(),
            EditorCommand::Stop => self.stop(),
            EditorCommand::Format => self.format(),
            EditorCommand::ToggleComment => self.toggle_comment(),
            EditorCommand::CycleViewMode => self.cycle_view_mode(),
            EditorCommand::ToggleSketch => self.set_view_mode(self.view.current().toggled_sketch()),
            EditorCommand::ToggleDebug => self.set_view_mode(self.view.current().toggled_debug()),
            EditorCommand::Save => self.request_save(),
            EditorCommand::Clear => self.clear(),
        }
    }

    // ---- messaging ------------------------------------------------------

    /// Validate and dispatch a raw `message` event payload.
    pub fn handle_message(&mut self, sender: Sender, data: &Value) -> Result<(), ProtocolError> {
        match Message::from_value(data) {
            Ok(message) => {
                self.handle(sender, message);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, ?sender, "ignoring malformed message");
                Err(err)
            }
        }
    }

    /// Dispatch a decoded message after the trust check.
    pub fn handle(&mut self, sender: Sender, message: Message) {
        if !message.editor_accepts(sender, self.preview.active_frame()) {
            debug!(kind = message.kind(), ?sender, "ignoring message from untrusted sender");
            return;
        }
        match message {
            Message::RunSketch => self.run(),
            Message::StopSketch => self.stop(),
            Message::CycleViewMode => self.cycle_view_mode(),
            Message::KeyboardShortcut { shortcut } => {
                // A forwarded save coming back from the parent would loop.
                if shortcut.is_host_bound() && sender == Sender::Parent {
                    debug!(shortcut = %shortcut, "ignoring host-bound shortcut from parent");
                    return;
                }
                self.shortcut(shortcut);
            }
            Message::SketchSaved | Message::SketchLoaded => self.set_dirty(false),
            Message::ConsoleEntry { level, args } => {
                self.append_console(ConsoleEntry { level, args });
            }
            Message::SketchDirty { .. }
            | Message::SketchRunning
            | Message::SketchStopped
            | Message::ViewModeChanged { .. } => {}
        }
    }

    // ---- view mode ------------------------------------------------------

    /// Switch to `mode`, reflect it in the URL and notify the parent.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        let transition = self.view.set(mode, self.buffer.snapshot());
        debug!(from = %transition.from, to = %transition.to, "view mode changed");
        self.apply_visibility(transition.visibility);
        if let Some(snapshot) = transition.restore {
            self.buffer.restore(snapshot);
            self.effects.push(Effect::RestoreEditor(self.buffer.snapshot()));
            self.effects.push(Effect::Focus);
        }
        let param = (!mode.is_default()).then_some(mode);
        self.effects.push(Effect::ReplaceViewModeParam(param));
        self.post(Message::ViewModeChanged { view_mode: mode });
    }

    /// [`Self::set_view_mode`] for untrusted input. Unknown values are
    /// logged and leave every state untouched.
    pub fn set_view_mode_raw(&mut self, raw: &str) -> Result<(), ViewModeParseError> {
        match raw.parse::<ViewMode>() {
            Ok(mode) => {
                self.set_view_mode(mode);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "rejected view mode");
                Err(err)
            }
        }
    }

    /// Advance Overlay → Sketch → Debug → Overlay. With no live frame and a
    /// non-blank buffer, also starts a run so the newly shown preview is not
    /// empty.
    pub fn cycle_view_mode(&mut self) {
        self.set_view_mode(self.view.current().cycled());
        if !self.preview.is_running() && !self.buffer.is_blank() {
            self.start_run(false);
        }
    }

    fn apply_visibility(&mut self, visibility: Visibility) {
        self.console.set_visible(visibility.console);
        self.effects.push(Effect::SetVisibility(visibility));
    }

    // ---- run / stop -----------------------------------------------------

    /// Rebuild the preview frame from the captured template and the buffer,
    /// revealing it in Overlay mode.
    pub fn run(&mut self) {
        self.start_run(true);
    }

    fn run_if_not_blank(&mut self) {
        if self.buffer.is_blank() {
            debug!("buffer is blank, not running");
        } else {
            self.run();
        }
    }

    fn start_run(&mut self, reveal: bool) {
        if !self.preview.is_captured() {
            if self.preview.request_capture(&mut self.effects) || self.preview.is_fetching() {
                info!("preview template not captured yet, running once it arrives");
                self.preview.set_run_after_capture(true);
            } else {
                warn!("cannot run: no preview template available");
            }
            return;
        }

        match self.preview.start(self.buffer.text(), &mut self.effects) {
            Ok(id) => {
                self.clear_console_before(id);
                if reveal && self.view.current() != ViewMode::Overlay {
                    self.set_view_mode(ViewMode::Overlay);
                }
                info!(frame = %id, len = self.buffer.text().len(), "sketch running");
                self.post(Message::SketchRunning);
            }
            Err(PreviewError::Injection(err)) => {
                error!(error = %err, "preview template violates the injection contract");
            }
            Err(err) => warn!(error = %err, "cannot run sketch"),
        }
    }

    /// Tear down the preview frame and fall back to Code mode. No-op when
    /// nothing is running.
    pub fn stop(&mut self) {
        let Some(id) = self.preview.stop(&mut self.effects) else {
            debug!("stop requested with no running sketch");
            return;
        };
        info!(frame = %id, "sketch stopped");
        self.set_view_mode(ViewMode::Code);
        self.post(Message::SketchStopped);
    }

    // ---- buffer transforms ---------------------------------------------

    /// Re-indent the whole buffer.
    pub fn format(&mut self) {
        let formatted = formatter::format_code(self.buffer.text(), self.config.format);
        if formatted == self.buffer.text() {
            return;
        }
        let selection = self.buffer.selection();
        self.apply_edit(TextEdit {
            text: formatted,
            selection,
        });
    }

    /// Comment or uncomment the lines touched by the selection.
    pub fn toggle_comment(&mut self) {
        let edit = formatter::toggle_comment(self.buffer.text(), self.buffer.selection());
        if edit.text == self.buffer.text() {
            return;
        }
        self.apply_edit(edit);
    }

    /// Empty the buffer and silently drop any running frame.
    pub fn clear(&mut self) {
        let _ = self.preview.stop(&mut self.effects);
        self.buffer.clear();
        self.push_buffer();
        self.refresh_derived();
        self.set_dirty(true);
    }

    fn apply_edit(&mut self, edit: TextEdit) {
        let scroll_top = self.buffer.scroll_top();
        self.buffer.replace(edit.text, edit.selection);
        self.buffer.set_scroll_top(scroll_top);
        self.push_buffer();
        self.refresh_derived();
        self.set_dirty(true);
    }

    fn push_buffer(&mut self) {
        self.effects.push(Effect::ReplaceBuffer {
            text: self.buffer.text().to_owned(),
            selection: self.buffer.selection(),
            scroll_top: self.buffer.scroll_top(),
        });
    }

    fn request_save(&mut self) {
        if self.embedded {
            self.post(Message::KeyboardShortcut {
                shortcut: Shortcut::Save,
            });
        } else {
            warn!("save requested but no host page is listening");
        }
    }

    // ---- derived state --------------------------------------------------

    fn refresh_derived(&mut self) {
        let status = StatusLine::compute(self.buffer.text(), self.buffer.selection().start);
        let update = self.annotator.update(self.buffer.text(), status.cursor.line - 1);
        if !update.is_noop() {
            self.effects.push(Effect::Gutter(update));
        }
        self.push_status(status);
    }

    fn push_status(&mut self, status: StatusLine) {
        if status != self.status {
            self.status = status;
            self.effects.push(Effect::Status(status));
        }
    }

    fn set_dirty(&mut self, dirty: bool) {
        if self.dirty == dirty {
            return;
        }
        self.dirty = dirty;
        self.post(Message::SketchDirty { status: dirty });
    }

    // ---- console --------------------------------------------------------

    fn clear_console(&mut self) {
        self.console.clear();
        self.effects.push(Effect::ConsoleClear);
    }

    fn clear_console_before(&mut self, id: FrameId) {
        debug!(frame = %id, "clearing console for new run");
        self.clear_console();
    }

    fn append_console(&mut self, entry: ConsoleEntry) {
        self.console.record();
        self.effects.push(Effect::ConsoleAppend(entry));
    }

    fn post(&mut self, message: Message) {
        if self.embedded {
            self.effects.push(Effect::PostToParent(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleLevel;
    use serde_json::json;

    const TEMPLATE: &str = concat!(
        "<body data-sketch-js-path=\"/sketches/luis/snake/sketch.js\">",
        "<script id=\"sketch-source\">OLD</script></body>"
    );

    fn config() -> EditorConfig {
        EditorConfig {
            template_url: Some("/sketches/luis/snake/".into()),
            auto_run: false,
            ..EditorConfig::default()
        }
    }

    fn ready_session(text: &str) -> EditorSession {
        let mut session = EditorSession::new(config(), true).with_initial_text(text);
        session.start();
        session.template_fetched(Ok(TEMPLATE.into()));
        let _ = session.drain_effects();
        session
    }

    fn posted(effects: &[Effect]) -> Vec<Message> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::PostToParent(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_applies_visibility_and_requests_template() {
        let mut session = EditorSession::new(config(), true);
        session.start();
        let fx = session.drain_effects();
        assert_eq!(fx[0], Effect::SetVisibility(ViewMode::Overlay.visibility()));
        assert!(fx.contains(&Effect::FetchTemplate {
            url: "/sketches/luis/snake/".into()
        }));
    }

    #[test]
    fn bootstrap_fetches_source_into_blank_buffer() {
        let mut session = EditorSession::new(config(), true);
        session.start();
        session.template_fetched(Ok(TEMPLATE.into()));
        let fx = session.drain_effects();
        assert!(fx.contains(&Effect::FetchSource {
            url: "/sketches/luis/snake/sketch.js".into()
        }));
        session.source_fetched(Ok("draw();".into()));
        assert_eq!(session.text(), "draw();");
        assert!(!session.is_dirty());
        assert!(session.is_bootstrapped());
    }

    #[test]
    fn bootstrap_never_overwrites_edits() {
        let mut session = EditorSession::new(config(), true);
        session.start();
        session.template_fetched(Ok(TEMPLATE.into()));
        session.on_input("mine", Selection::caret(4));
        session.source_fetched(Ok("theirs".into()));
        assert_eq!(session.text(), "mine");
    }

    #[test]
    fn auto_run_after_bootstrap() {
        let cfg = EditorConfig {
            auto_run: true,
            ..config()
        };
        let mut session = EditorSession::new(cfg, true);
        session.start();
        session.template_fetched(Ok(TEMPLATE.into()));
        session.source_fetched(Ok("draw();".into()));
        assert!(session.is_running());
    }

    #[test]
    fn run_before_capture_waits_for_template() {
        let mut session = EditorSession::new(config(), true).with_initial_text("x");
        session.start();
        session.run();
        assert!(!session.is_running());
        session.template_fetched(Ok(TEMPLATE.into()));
        assert!(session.is_running());
    }

    #[test]
    fn failed_capture_blocks_run() {
        let mut session = EditorSession::new(config(), true).with_initial_text("x");
        session.start();
        session.run();
        session.template_fetched(Err(FetchError::Status(500)));
        assert!(!session.is_running());
        assert!(session.is_bootstrapped());
    }

    #[test]
    fn run_forces_overlay_and_announces() {
        let mut session = ready_session("x");
        session.set_view_mode(ViewMode::Code);
        let _ = session.drain_effects();
        session.run();
        assert_eq!(session.view_mode(), ViewMode::Overlay);
        let fx = session.drain_effects();
        assert_eq!(posted(&fx).last(), Some(&Message::SketchRunning));
        assert!(fx.contains(&Effect::ConsoleClear));
    }

    #[test]
    fn stop_goes_to_code_and_reports_last() {
        let mut session = ready_session("x");
        session.run();
        let _ = session.drain_effects();
        session.stop();
        assert_eq!(session.view_mode(), ViewMode::Code);
        let messages = posted(&session.drain_effects());
        assert_eq!(messages.last(), Some(&Message::SketchStopped));
    }

    #[test]
    fn stop_without_frame_is_silent() {
        let mut session = ready_session("x");
        session.stop();
        assert!(session.drain_effects().is_empty());
    }

    #[test]
    fn input_marks_dirty_once() {
        let mut session = ready_session("");
        session.on_input("a", Selection::caret(1));
        session.on_input("ab", Selection::caret(2));
        let dirty: Vec<Message> = posted(&session.drain_effects())
            .into_iter()
            .filter(|m| matches!(m, Message::SketchDirty { .. }))
            .collect();
        assert_eq!(dirty, vec![Message::SketchDirty { status: true }]);
    }

    #[test]
    fn saved_from_parent_clears_dirty() {
        let mut session = ready_session("");
        session.on_input("a", Selection::caret(1));
        session.handle(Sender::Parent, Message::SketchSaved);
        assert!(!session.is_dirty());
        session.on_input("ab", Selection::caret(2));
        session.handle(Sender::Unknown, Message::SketchLoaded);
        assert!(session.is_dirty());
    }

    #[test]
    fn run_message_from_stranger_is_ignored() {
        let mut session = ready_session("x");
        session.handle_message(Sender::Unknown, &json!({"type": "runSketch"})).unwrap();
        assert!(!session.is_running());
        session.handle_message(Sender::Parent, &json!({"type": "runSketch"})).unwrap();
        assert!(session.is_running());
    }

    #[test]
    fn malformed_message_changes_nothing() {
        let mut session = ready_session("x");
        let err = session
            .handle_message(Sender::Parent, &json!({"type": "explode"}))
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnknownType("explode".into()));
        assert!(session.drain_effects().is_empty());
    }

    #[test]
    fn save_shortcut_is_forwarded_to_parent() {
        let mut session = ready_session("x");
        assert!(session.on_key("s", "KeyS", Modifiers::CTRL));
        assert_eq!(
            posted(&session.drain_effects()),
            vec![Message::KeyboardShortcut {
                shortcut: Shortcut::Save
            }]
        );
    }

    #[test]
    fn save_shortcut_from_parent_does_not_bounce() {
        let mut session = ready_session("x");
        session.handle(
            Sender::Parent,
            Message::KeyboardShortcut {
                shortcut: Shortcut::Save,
            },
        );
        assert!(session.drain_effects().is_empty());
    }

    #[test]
    fn plain_keys_are_not_consumed() {
        let mut session = ready_session("x");
        assert!(!session.on_key("a", "KeyA", Modifiers::empty()));
    }

    #[test]
    fn cycle_starts_run_when_idle() {
        let mut session = ready_session("x");
        session.cycle_view_mode();
        assert_eq!(session.view_mode(), ViewMode::Sketch);
        assert!(session.is_running());
    }

    #[test]
    fn cycle_with_blank_buffer_does_not_run() {
        let mut session = ready_session("  ");
        session.cycle_view_mode();
        assert!(!session.is_running());
    }

    #[test]
    fn invalid_raw_view_mode_is_noop() {
        let mut session = ready_session("x");
        assert!(session.set_view_mode_raw("fullscreen").is_err());
        assert!(session.drain_effects().is_empty());
        assert_eq!(session.view_mode(), ViewMode::Overlay);
    }

    #[test]
    fn hidden_editor_state_is_restored() {
        let mut session = ready_session("hello\nworld");
        session.on_selection(Selection::new(6, 9));
        session.on_scroll(80);
        session.set_view_mode(ViewMode::Sketch);
        session.on_scroll(0);
        let _ = session.drain_effects();
        session.set_view_mode(ViewMode::Overlay);
        let fx = session.drain_effects();
        assert!(fx.iter().any(|e| matches!(
            e,
            Effect::RestoreEditor(snap)
                if snap.scroll_top == 80 && snap.selection == Selection::new(6, 9)
        )));
    }

    #[test]
    fn format_replaces_buffer_and_keeps_scroll() {
        let mut session = ready_session("if (a) {\nb();\n}");
        session.on_scroll(30);
        session.format();
        assert_eq!(session.text(), "if (a) {\n  b();\n}");
        let fx = session.drain_effects();
        assert!(fx.iter().any(|e| matches!(e, Effect::ReplaceBuffer { scroll_top: 30, .. })));
        assert!(session.is_dirty());
    }

    #[test]
    fn toggle_comment_on_current_line() {
        let mut session = ready_session("a\nb");
        session.on_selection(Selection::caret(2));
        session.toggle_comment();
        assert_eq!(session.text(), "a\n// b");
    }

    #[test]
    fn clear_drops_frame_silently() {
        let mut session = ready_session("x");
        session.run();
        let _ = session.drain_effects();
        session.clear();
        assert!(!session.is_running());
        assert_eq!(session.text(), "");
        let messages = posted(&session.drain_effects());
        assert!(!messages.contains(&Message::SketchStopped));
    }

    #[test]
    fn console_entries_only_from_current_frame() {
        let mut session = ready_session("x");
        session.run();
        let first = session.active_frame().unwrap();
        session.run();
        let second = session.active_frame().unwrap();
        let _ = session.drain_effects();

        let entry = Message::ConsoleEntry {
            level: ConsoleLevel::Log,
            args: vec!["hi".into()],
        };
        session.handle(Sender::Preview(first), entry.clone());
        assert!(session.drain_effects().is_empty());
        session.handle(Sender::Preview(second), entry);
        assert_eq!(session.console().shown(), 1);
    }

    #[test]
    fn stale_frame_load_is_rejected() {
        let mut session = ready_session("x");
        session.run();
        let first = session.active_frame().unwrap();
        session.run();
        assert!(!session.frame_loaded(first));
        assert!(session.frame_loaded(session.active_frame().unwrap()));
    }

    #[test]
    fn standalone_editor_posts_nothing() {
        let mut session = EditorSession::new(config(), false).with_initial_text("x");
        session.start();
        session.template_fetched(Ok(TEMPLATE.into()));
        session.run();
        assert!(posted(&session.drain_effects()).is_empty());
    }

    #[test]
    fn selection_moves_current_line_and_status() {
        let mut session = ready_session("a\nb\nc");
        session.on_selection(Selection::caret(4));
        assert_eq!(session.annotator().current_line(), 2);
        assert_eq!(session.status().cursor.to_string(), "Ln 3, Col 1");
    }
}
