#![forbid(unsafe_code)]

//! Editor page bindings.
//!
//! The page owns one [`EditorSession`]. DOM events are translated into
//! session calls, then every queued [`Effect`] is applied to the document in
//! order. Fetches run on `spawn_local`; no session borrow is held across an
//! `await`, and completions go back through the session, which rejects
//! stale frames.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use sketchbook_core::buffer::{char_offset_from_utf16, utf16_offset_from_char};
use sketchbook_core::view_mode::VIEW_MODE_PARAM;
use sketchbook_core::{
    ConsoleEntry, Effect, EditorConfig, EditorSession, EditorSnapshot, FrameId, GutterUpdate,
    LineInfo, Modifiers, Selection, Sender, StatusLine, ViewMode, Visibility,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, HtmlElement, HtmlIFrameElement, HtmlTextAreaElement, KeyboardEvent,
    MessageEvent, Window,
};

use crate::{dom, fetch, gutter, location};

/// Approximate monospace advance used for the current-line highlight.
const CHAR_WIDTH_PX: f64 = 8.4;

/// A preview iframe and its `load` handler, dropped together.
struct LiveFrame {
    id: FrameId,
    element: HtmlIFrameElement,
    _on_load: Closure<dyn FnMut(web_sys::Event)>,
}

struct EditorDom {
    window: Window,
    document: Document,
    code_viewport: Element,
    sketch_viewport: Element,
    console_overlay: Element,
    console_output: Element,
    code_editor: HtmlTextAreaElement,
    line_numbers: Element,
    status_bar: Element,
    frames: RefCell<Vec<LiveFrame>>,
}

impl EditorDom {
    fn bind(window: Window, document: Document) -> Result<Self, JsValue> {
        Ok(Self {
            code_viewport: dom::by_id(&document, "code-viewport")?,
            sketch_viewport: dom::by_id(&document, "sketch-viewport")?,
            console_overlay: dom::by_id(&document, "console-overlay")?,
            console_output: dom::by_id(&document, "console-output")?,
            code_editor: dom::by_id(&document, "code-editor")?,
            line_numbers: dom::by_id(&document, "line-numbers")?,
            status_bar: dom::by_id(&document, "status-bar")?,
            frames: RefCell::new(Vec::new()),
            window,
            document,
        })
    }

    fn text_and_selection(&self) -> (String, Selection) {
        let text = self.code_editor.value();
        let start = self.code_editor.selection_start().ok().flatten().unwrap_or(0);
        let end = self.code_editor.selection_end().ok().flatten().unwrap_or(start);
        let selection = Selection::new(
            char_offset_from_utf16(&text, start as usize),
            char_offset_from_utf16(&text, end as usize),
        );
        (text, selection)
    }

    fn selection(&self) -> Selection {
        self.text_and_selection().1
    }

    fn set_selection(&self, selection: Selection) {
        let text = self.code_editor.value();
        let start = utf16_offset_from_char(&text, selection.start) as u32;
        let end = utf16_offset_from_char(&text, selection.end) as u32;
        if let Err(err) = self.code_editor.set_selection_range(start, end) {
            tracing::debug!(error = ?err, "selection not applied");
        }
    }

    fn sender_of(&self, event: &MessageEvent) -> Sender {
        let source = event.source();
        let source = source.as_ref();
        if let Ok(Some(parent)) = self.window.parent()
            && !js_sys::Object::is(parent.as_ref(), self.window.as_ref())
            && dom::is_window(source, &parent)
        {
            return Sender::Parent;
        }
        if dom::is_window(source, &self.window) {
            return Sender::SameWindow;
        }
        self.frames
            .borrow()
            .iter()
            .find(|frame| {
                frame
                    .element
                    .content_window()
                    .is_some_and(|w| dom::is_window(source, &w))
            })
            .map_or(Sender::Unknown, |frame| Sender::Preview(frame.id))
    }

    fn set_visibility(&self, visibility: Visibility) {
        dom::set_hidden(&self.code_viewport, !visibility.editor);
        dom::set_hidden(&self.sketch_viewport, !visibility.preview);
        dom::set_hidden(&self.console_overlay, !visibility.console);
    }

    fn replace_view_mode_param(&self, mode: Option<ViewMode>) -> Result<(), JsValue> {
        let current = self.window.location();
        let url = location::with_query_param(
            &current.pathname()?,
            &current.search()?,
            &current.hash()?,
            VIEW_MODE_PARAM,
            mode.and_then(ViewMode::query_value),
        );
        self.window
            .history()?
            .replace_state_with_url(&JsValue::NULL, "", Some(&url))
    }

    fn restore(&self, snapshot: EditorSnapshot) {
        self.code_editor.set_scroll_top(snapshot.scroll_top);
        self.set_selection(snapshot.selection);
    }

    fn replace_text(&self, text: &str, selection: Selection, scroll_top: i32) {
        self.code_editor.set_value(text);
        self.set_selection(selection);
        self.code_editor.set_scroll_top(scroll_top);
    }

    fn gutter_row(&self, index: usize, info: LineInfo, current: bool) -> Result<Element, JsValue> {
        let row = self.document.create_element("div")?;
        row.set_text_content(Some(&(index + 1).to_string()));
        self.style_row(&row, info, current)?;
        Ok(row)
    }

    fn style_row(&self, row: &Element, info: LineInfo, current: bool) -> Result<(), JsValue> {
        row.set_class_name(&gutter::row_class(info.kind.css_class(), current));
        if current && let Some(row) = row.dyn_ref::<HtmlElement>() {
            let available = f64::from(self.code_editor.client_width()) - gutter::GUTTER_WIDTH;
            let width = gutter::highlight_width(info.char_len, CHAR_WIDTH_PX, available);
            row.style()
                .set_property("--highlight-width", &format!("{width}px"))?;
        }
        Ok(())
    }

    fn apply_gutter(&self, update: GutterUpdate) -> Result<(), JsValue> {
        match update {
            GutterUpdate::Rebuild { lines, current } => {
                self.line_numbers.set_inner_html("");
                for (index, info) in lines.into_iter().enumerate() {
                    let row = self.gutter_row(index, info, index == current)?;
                    self.line_numbers.append_child(&row)?;
                }
            }
            GutterUpdate::Patch { rows } => {
                let children = self.line_numbers.children();
                for change in rows {
                    match children.item(change.index as u32) {
                        Some(row) => self.style_row(&row, change.info, change.current)?,
                        None => tracing::debug!(index = change.index, "gutter row missing"),
                    }
                }
            }
        }
        Ok(())
    }

    fn show_status(&self, status: StatusLine) {
        let text = format!("{} | {}", status.cursor, status.size_label());
        self.status_bar.set_text_content(Some(&text));
    }

    fn append_console(&self, entry: &ConsoleEntry) -> Result<(), JsValue> {
        let line = self.document.create_element("div")?;
        line.set_class_name(&format!("console-entry {}", entry.level.css_class()));
        line.set_text_content(Some(&entry.line()));
        self.console_output.append_child(&line)?;
        self.console_output
            .set_scroll_top(self.console_output.scroll_height());
        Ok(())
    }

    fn remove_frame(&self, id: FrameId) {
        let removed: Vec<LiveFrame> = {
            let mut frames = self.frames.borrow_mut();
            let (removed, kept) = frames.drain(..).partition(|frame| frame.id == id);
            *frames = kept;
            removed
        };
        for frame in removed {
            frame.element.remove();
        }
    }

    fn frame(&self, id: FrameId) -> Option<HtmlIFrameElement> {
        self.frames
            .borrow()
            .iter()
            .find(|frame| frame.id == id)
            .map(|frame| frame.element.clone())
    }

    fn post_to_parent(&self, message: &sketchbook_core::Message) {
        match self.window.parent() {
            Ok(Some(parent)) => dom::post(&parent, message),
            _ => tracing::debug!(kind = message.kind(), "no parent window"),
        }
    }
}

struct Shared {
    session: RefCell<EditorSession>,
    dom: EditorDom,
}

impl Shared {
    /// Run `f` against the session, then apply whatever it queued.
    fn with_session<R>(self: &Rc<Self>, f: impl FnOnce(&mut EditorSession) -> R) -> R {
        let result = f(&mut self.session.borrow_mut());
        self.flush();
        result
    }

    fn flush(self: &Rc<Self>) {
        loop {
            let effects = self.session.borrow_mut().drain_effects();
            if effects.is_empty() {
                break;
            }
            for effect in effects {
                let name = effect.name();
                if let Err(err) = self.apply(effect) {
                    tracing::warn!(effect = name, error = ?err, "effect failed");
                }
            }
        }
    }

    fn apply(self: &Rc<Self>, effect: Effect) -> Result<(), JsValue> {
        let dom = &self.dom;
        match effect {
            Effect::SetVisibility(visibility) => dom.set_visibility(visibility),
            Effect::ReplaceViewModeParam(mode) => dom.replace_view_mode_param(mode)?,
            Effect::RestoreEditor(snapshot) => dom.restore(snapshot),
            Effect::ReplaceBuffer {
                text,
                selection,
                scroll_top,
            } => dom.replace_text(&text, selection, scroll_top),
            Effect::Gutter(update) => dom.apply_gutter(update)?,
            Effect::Status(status) => dom.show_status(status),
            Effect::ConsoleClear => dom.console_output.set_inner_html(""),
            Effect::ConsoleAppend(entry) => dom.append_console(&entry)?,
            Effect::RemoveFrame(id) => dom.remove_frame(id),
            Effect::CreateFrame { id, sandbox } => self.create_frame(id, &sandbox)?,
            Effect::WriteDocument { id, html } => match dom.frame(id) {
                Some(frame) => frame.set_srcdoc(&html),
                None => tracing::warn!(frame = id.get(), "document for a missing frame"),
            },
            Effect::PostToParent(message) => dom.post_to_parent(&message),
            Effect::FetchTemplate { url } => self.spawn_fetch(url, EditorSession::template_fetched),
            Effect::FetchSource { url } => self.spawn_fetch(url, EditorSession::source_fetched),
            Effect::Focus => dom.code_editor.focus()?,
        }
        Ok(())
    }

    fn create_frame(self: &Rc<Self>, id: FrameId, sandbox: &str) -> Result<(), JsValue> {
        let frame: HtmlIFrameElement = self.dom.document.create_element("iframe")?.dyn_into()?;
        frame.set_attribute("sandbox", sandbox)?;
        frame.set_attribute("data-frame-id", &id.get().to_string())?;
        frame.set_class_name("sketch-frame");
        let weak: Weak<Self> = Rc::downgrade(self);
        let on_load = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
            if let Some(shared) = weak.upgrade() {
                shared.with_session(|session| {
                    session.frame_loaded(id);
                });
            }
        });
        frame.add_event_listener_with_callback("load", on_load.as_ref().unchecked_ref())?;
        self.dom.sketch_viewport.append_child(&frame)?;
        self.dom.frames.borrow_mut().push(LiveFrame {
            id,
            element: frame,
            _on_load: on_load,
        });
        Ok(())
    }

    fn spawn_fetch(
        self: &Rc<Self>,
        url: String,
        complete: fn(&mut EditorSession, Result<String, sketchbook_core::FetchError>),
    ) {
        let shared = Rc::clone(self);
        wasm_bindgen_futures::spawn_local(async move {
            let result = fetch::fetch_text(&url).await;
            shared.with_session(|session| complete(session, result));
        });
    }

    fn install_listeners(self: &Rc<Self>) -> Result<(), JsValue> {
        let editor = &self.dom.code_editor;

        let shared = Rc::clone(self);
        dom::listen(editor, "input", move |_: web_sys::Event| {
            let (text, selection) = shared.dom.text_and_selection();
            shared.with_session(|session| session.on_input(text, selection));
        })?;

        for event in ["keyup", "click", "select", "focus"] {
            let shared = Rc::clone(self);
            dom::listen(editor, event, move |_: web_sys::Event| {
                let selection = shared.dom.selection();
                shared.with_session(|session| session.on_selection(selection));
            })?;
        }

        let shared = Rc::clone(self);
        dom::listen(editor, "scroll", move |_: web_sys::Event| {
            let top = shared.dom.code_editor.scroll_top();
            shared.session.borrow_mut().on_scroll(top);
        })?;

        let shared = Rc::clone(self);
        dom::listen(&self.dom.document, "keydown", move |event: KeyboardEvent| {
            let mods = Modifiers::from_dom(
                event.shift_key(),
                event.alt_key(),
                event.ctrl_key(),
                event.meta_key(),
            );
            let key = event.key();
            let code = event.code();
            if shared.with_session(|session| session.on_key(&key, &code, mods)) {
                event.prevent_default();
            }
        })?;

        let shared = Rc::clone(self);
        dom::listen(&self.dom.window, "message", move |event: MessageEvent| {
            let sender = shared.dom.sender_of(&event);
            let Some(data) = dom::event_json(&event) else {
                tracing::debug!(?sender, "ignoring non-JSON message");
                return;
            };
            let handled = shared.with_session(|session| session.handle_message(sender, &data));
            if let Err(err) = handled {
                tracing::debug!(?sender, error = %err, "message rejected");
            }
        })?;
        Ok(())
    }
}

/// Editor page surface.
#[wasm_bindgen]
pub struct SketchEditorWeb {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl SketchEditorWeb {
    /// Bind the page elements and resolve configuration. Call `start` next.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<SketchEditorWeb, JsValue> {
        let window = dom::window()?;
        let document = dom::document()?;
        let root = document.body().map(Element::from);
        let search = window.location().search()?;
        let config = EditorConfig::from_lookup_with(location::query_then(search, |key| {
            root.as_ref().and_then(|root| root.get_attribute(key))
        }));
        let embedded = match window.parent() {
            Ok(Some(parent)) => !js_sys::Object::is(parent.as_ref(), window.as_ref()),
            _ => false,
        };
        let dom = EditorDom::bind(window, document)?;
        let initial = dom.code_editor.value();
        tracing::info!(view_mode = %config.initial_view_mode, embedded, "editor bound");
        let session = EditorSession::new(config, embedded).with_initial_text(initial);
        Ok(Self {
            shared: Rc::new(Shared {
                session: RefCell::new(session),
                dom,
            }),
        })
    }

    /// Install listeners, apply the initial view and fetch the template.
    pub fn start(&self) -> Result<(), JsValue> {
        self.shared.install_listeners()?;
        self.shared.with_session(EditorSession::start);
        Ok(())
    }

    pub fn run(&self) {
        self.shared.with_session(EditorSession::run);
    }

    pub fn stop(&self) {
        self.shared.with_session(EditorSession::stop);
    }

    pub fn format(&self) {
        self.shared.with_session(EditorSession::format);
    }

    #[wasm_bindgen(js_name = toggleComment)]
    pub fn toggle_comment(&self) {
        self.shared.with_session(EditorSession::toggle_comment);
    }

    #[wasm_bindgen(js_name = cycleViewMode)]
    pub fn cycle_view_mode(&self) {
        self.shared.with_session(EditorSession::cycle_view_mode);
    }

    /// Invalid modes are logged and ignored.
    #[wasm_bindgen(js_name = setViewMode)]
    pub fn set_view_mode(&self, mode: &str) {
        let result = self.shared.with_session(|session| session.set_view_mode_raw(mode));
        if let Err(err) = result {
            tracing::warn!(error = %err, "view mode not changed");
        }
    }

    /// Empty the buffer after asking the user.
    pub fn clear(&self) {
        if dom::confirm("Clear the editor? Unsaved changes will be lost.") {
            self.shared.with_session(EditorSession::clear);
        }
    }

    #[wasm_bindgen(getter, js_name = isDirty)]
    pub fn is_dirty(&self) -> bool {
        self.shared.session.borrow().is_dirty()
    }

    #[wasm_bindgen(getter, js_name = viewMode)]
    pub fn view_mode(&self) -> String {
        self.shared.session.borrow().view_mode().as_str().to_owned()
    }
}
