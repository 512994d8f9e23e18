#![forbid(unsafe_code)]

//! Manager and lister page bindings.
//!
//! Both pages embed the editor in an iframe and drive a host session from
//! `sketchbook-host`. Persistence runs on `spawn_local` against
//! [`SketchApi`]; the session is only borrowed before and after each request.

use std::cell::RefCell;
use std::rc::Rc;

use sketchbook_core::{Modifiers, Sender, Shortcut};
use sketchbook_host::metadata::MAX_EXTERNAL_LIBS;
use sketchbook_host::{
    HostConfig, HostEffect, ListerEntry, ListerSession, MetadataDraft, Navigation, SessionHost,
    SketchApi, play_button,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, Event, HtmlAnchorElement, HtmlElement, HtmlIFrameElement,
    HtmlInputElement, HtmlOptionElement, HtmlSelectElement, HtmlTextAreaElement, KeyboardEvent,
    MessageEvent, Window,
};

use crate::dom;
use crate::fetch::BrowserTransport;

const LIB_PLACEHOLDER: &str = "https://cdn.jsdelivr.net/npm/package@version/file.js";

fn body_lookup(document: &Document) -> impl Fn(&str) -> Option<String> {
    let body = document.body().map(Element::from);
    move |key| body.as_ref().and_then(|body| body.get_attribute(key))
}

fn field_value(element: &Element) -> String {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        input.value()
    } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
        area.value()
    } else {
        String::new()
    }
}

fn set_field_value(element: &Element, value: &str) {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        input.set_value(value);
    } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
        area.set_value(value);
    }
}

fn set_play_button(button: &Element, running: bool) {
    let (label, title) = play_button(running);
    button.set_inner_html(label);
    if let Err(err) = button.set_attribute("title", title) {
        tracing::warn!(error = ?err, "play button title not set");
    }
}

/// Classify a message source against the embedded editor.
fn frame_sender(frame: &HtmlIFrameElement, event: &MessageEvent) -> Sender {
    match frame.content_window() {
        Some(editor) if dom::is_window(event.source().as_ref(), &editor) => Sender::EditorFrame,
        _ => Sender::Unknown,
    }
}

// ── Manager ──────────────────────────────────────────────────────────────

struct MetadataForm {
    dialog: Element,
    overlay: Element,
    cancel: Element,
    save: Element,
    title: Element,
    description: Element,
    keywords: Element,
    tags: Element,
    libs: Element,
    add_lib: HtmlElement,
}

impl MetadataForm {
    fn bind(document: &Document) -> Result<Self, JsValue> {
        Ok(Self {
            dialog: dom::by_id(document, "metadata-dialog")?,
            overlay: dom::by_id(document, "metadata-overlay")?,
            cancel: dom::by_id(document, "metadata-cancel")?,
            save: dom::by_id(document, "metadata-save")?,
            title: dom::by_id(document, "metadata-title")?,
            description: dom::by_id(document, "metadata-description")?,
            keywords: dom::by_id(document, "metadata-keywords")?,
            tags: dom::by_id(document, "metadata-tags")?,
            libs: dom::by_id(document, "external-libs-container")?,
            add_lib: dom::by_id(document, "add-external-lib")?,
        })
    }

    fn show(&self, document: &Document, draft: &MetadataDraft) -> Result<(), JsValue> {
        set_field_value(&self.title, &draft.title);
        set_field_value(&self.description, &draft.description);
        set_field_value(&self.keywords, &draft.keywords);
        set_field_value(&self.tags, &draft.tags);
        self.libs.set_inner_html("");
        for url in &draft.external_libs {
            self.add_lib_input(document, url)?;
        }
        if draft.external_libs.is_empty() {
            self.add_lib_input(document, "")?;
        }
        dom::set_hidden(&self.dialog, false);
        dom::set_hidden(&self.overlay, false);
        Ok(())
    }

    fn hide(&self) {
        dom::set_hidden(&self.dialog, true);
        dom::set_hidden(&self.overlay, true);
    }

    fn lib_rows(&self) -> u32 {
        self.libs
            .query_selector_all(".external-lib-input")
            .map_or(0, |rows| rows.length())
    }

    /// Append one library row; rows after the first get a remove button.
    fn add_lib_input(&self, document: &Document, value: &str) -> Result<(), JsValue> {
        let rows = self.lib_rows();
        if rows as usize >= MAX_EXTERNAL_LIBS {
            dom::alert(&format!("Maximum {MAX_EXTERNAL_LIBS} external libraries allowed"));
            return Ok(());
        }
        let row = document.create_element("div")?;
        row.set_class_name("external-lib-input mb-2 flex items-center");
        let input: HtmlInputElement = document.create_element("input")?.dyn_into()?;
        input.set_type("url");
        input.set_class_name(
            "external-lib-url flex-1 p-2 border border-base-300 rounded bg-base-100",
        );
        input.set_placeholder(LIB_PLACEHOLDER);
        input.set_value(value);
        row.append_child(&input)?;
        if rows > 0 {
            let remove = document.create_element("button")?;
            remove.set_attribute("type", "button")?;
            remove.set_class_name("ml-2 px-2 py-1 text-xs text-red-600 hover:text-red-800");
            remove.set_text_content(Some("✕"));
            let target = row.clone();
            let add_lib = self.add_lib.clone();
            let container = self.libs.clone();
            dom::listen(&remove, "click", move |_: Event| {
                target.remove();
                let rows = container
                    .query_selector_all(".external-lib-input")
                    .map_or(0, |rows| rows.length());
                show_add_lib(&add_lib, rows as usize);
            })?;
            row.append_child(&remove)?;
        }
        self.libs.append_child(&row)?;
        show_add_lib(&self.add_lib, rows as usize + 1);
        Ok(())
    }

    fn draft(&self) -> MetadataDraft {
        let mut external_libs = Vec::new();
        if let Ok(inputs) = self.libs.query_selector_all(".external-lib-url") {
            for i in 0..inputs.length() {
                if let Some(input) = inputs.get(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                    external_libs.push(field_value(&input));
                }
            }
        }
        MetadataDraft {
            title: field_value(&self.title),
            description: field_value(&self.description),
            keywords: field_value(&self.keywords),
            tags: field_value(&self.tags),
            external_libs,
        }
    }
}

fn show_add_lib(button: &HtmlElement, rows: usize) {
    let display = if rows >= MAX_EXTERNAL_LIBS { "none" } else { "inline" };
    if let Err(err) = button.style().set_property("display", display) {
        tracing::warn!(error = ?err, "add-library button not updated");
    }
}

struct ManagerDom {
    window: Window,
    document: Document,
    frame: HtmlIFrameElement,
    selector: HtmlSelectElement,
    status: Element,
    save: Element,
    new: Element,
    edit_metadata: Element,
    delete: Element,
    prev: Element,
    next: Element,
    cycle: Element,
    play: Element,
    link: HtmlAnchorElement,
    metadata: MetadataForm,
}

impl ManagerDom {
    fn bind(window: Window, document: Document) -> Result<Self, JsValue> {
        Ok(Self {
            frame: dom::by_id(&document, "sketch-viewport")?,
            selector: dom::by_id(&document, "sketch-selector")?,
            status: dom::by_id(&document, "sketch-status")?,
            save: dom::by_id(&document, "save-button")?,
            new: dom::by_id(&document, "new-button")?,
            edit_metadata: dom::by_id(&document, "edit-metadata-button")?,
            delete: dom::by_id(&document, "delete-button")?,
            prev: dom::by_id(&document, "prev-sketch")?,
            next: dom::by_id(&document, "next-sketch")?,
            cycle: dom::by_id(&document, "cycle-view")?,
            play: dom::by_id(&document, "play-stop-sketch")?,
            link: dom::by_id(&document, "sketch-link")?,
            metadata: MetadataForm::bind(&document)?,
            window,
            document,
        })
    }

    /// The editor textarea inside the same-origin iframe.
    fn editor_source(&self) -> Option<String> {
        let editor = self
            .frame
            .content_document()?
            .get_element_by_id("code-editor")?
            .dyn_into::<HtmlTextAreaElement>()
            .ok()?;
        Some(editor.value())
    }

    fn fill_selector(&self, host: &SessionHost) -> Result<(), JsValue> {
        self.selector.set_inner_html("");
        let placeholder = HtmlOptionElement::new_with_text_and_value("Select a sketch...", "")?;
        self.selector.append_child(&placeholder)?;
        for record in host.records() {
            let option =
                HtmlOptionElement::new_with_text_and_value(record.display_title(), &record.slug)?;
            self.selector.append_child(&option)?;
        }
        self.selector
            .set_value(host.current().map_or("", |record| record.slug.as_str()));
        Ok(())
    }

    fn render(&self, host: &SessionHost) {
        if let Err(err) = self.fill_selector(host) {
            tracing::warn!(error = ?err, "sketch selector not rebuilt");
        }
        self.status.set_text_content(Some(host.status_label()));
        dom::set_hidden(&self.status, false);
        dom::set_hidden(&self.save, !host.can_save());
        dom::set_hidden(&self.edit_metadata, !host.can_modify());
        dom::set_hidden(&self.delete, !host.can_modify());
        set_play_button(&self.play, host.is_running());
        self.link.set_href(&host.sketch_link());
    }
}

struct Manager {
    host: RefCell<SessionHost>,
    api: SketchApi<BrowserTransport>,
    dom: ManagerDom,
}

impl Manager {
    fn with_host<R>(self: &Rc<Self>, f: impl FnOnce(&mut SessionHost) -> R) -> R {
        let result = f(&mut self.host.borrow_mut());
        self.flush();
        result
    }

    fn flush(self: &Rc<Self>) {
        loop {
            let effects = self.host.borrow_mut().drain_effects();
            if effects.is_empty() {
                break;
            }
            for effect in effects {
                self.apply(effect);
            }
        }
        self.dom.render(&self.host.borrow());
    }

    fn apply(self: &Rc<Self>, effect: HostEffect) {
        match effect {
            HostEffect::PostToEditor(message) => match self.dom.frame.content_window() {
                Some(editor) => dom::post(&editor, &message),
                None => tracing::debug!(kind = message.kind(), "no editor window to post to"),
            },
            HostEffect::LoadEditor { url } => {
                tracing::debug!(%url, "loading editor");
                self.dom.frame.set_src(&url);
            }
            HostEffect::Notify(notice) => dom::alert(&notice.text),
            HostEffect::Redirect { url } => {
                if let Err(err) = self.dom.window.location().set_href(&url) {
                    tracing::error!(%url, error = ?err, "redirect failed");
                }
            }
            HostEffect::RequestSave => self.save(),
        }
    }

    /// Follow a navigation outcome, asking before discarding edits.
    fn navigate(self: &Rc<Self>, outcome: Navigation) {
        if let Navigation::NeedsConfirmation(target) = outcome {
            let discard = dom::confirm(target.confirmation_text());
            self.with_host(|host| host.confirm_navigation(discard));
        } else {
            self.flush();
        }
    }

    fn load(self: &Rc<Self>) {
        let member = self.host.borrow().prepare_load();
        let manager = Rc::clone(self);
        spawn_local(async move {
            let result = manager.api.member_sketches(member.as_deref()).await;
            manager.with_host(|host| host.finish_load(result));
        });
    }

    fn save(self: &Rc<Self>) {
        let source = self.dom.editor_source().unwrap_or_default();
        let Some(request) = self.with_host(|host| host.prepare_save(&source)) else {
            return;
        };
        let manager = Rc::clone(self);
        spawn_local(async move {
            let result = manager
                .api
                .save(request.member.as_deref(), request.slug.as_deref(), &request.source)
                .await;
            manager.with_host(|host| host.finish_save(&request, result));
        });
    }

    fn delete(self: &Rc<Self>) {
        let question = self.host.borrow().delete_confirmation();
        if question.is_some_and(|text| !dom::confirm(&text)) {
            return;
        }
        let Some(target) = self.with_host(SessionHost::prepare_delete) else {
            return;
        };
        let manager = Rc::clone(self);
        spawn_local(async move {
            let result = manager.api.delete_sketch(&target.member, &target.slug).await;
            manager.with_host(|host| host.finish_delete(&target, result));
        });
    }

    fn open_metadata(self: &Rc<Self>) {
        let Some(draft) = self.with_host(SessionHost::open_metadata) else {
            return;
        };
        if let Err(err) = self.dom.metadata.show(&self.dom.document, &draft) {
            tracing::error!(error = ?err, "metadata dialog not shown");
        }
    }

    fn save_metadata(self: &Rc<Self>) {
        let draft = self.dom.metadata.draft();
        let Some((target, metadata)) = self.with_host(|host| host.prepare_metadata(draft)) else {
            return;
        };
        self.dom.metadata.hide();
        let manager = Rc::clone(self);
        spawn_local(async move {
            let result = manager
                .api
                .update_metadata(&target.member, &target.slug, &metadata)
                .await;
            manager.with_host(|host| host.finish_metadata(&target, result));
        });
    }

    fn on_click(self: &Rc<Self>, element: &Element, action: fn(&Rc<Self>)) -> Result<(), JsValue> {
        let manager = Rc::clone(self);
        dom::listen(element, "click", move |_: Event| action(&manager))
    }

    fn install_listeners(self: &Rc<Self>) -> Result<(), JsValue> {
        let d = &self.dom;
        self.on_click(&d.prev, |m| {
            let outcome = m.host.borrow_mut().previous();
            m.navigate(outcome);
        })?;
        self.on_click(&d.next, |m| {
            let outcome = m.host.borrow_mut().next();
            m.navigate(outcome);
        })?;
        self.on_click(&d.new, |m| {
            let outcome = m.host.borrow_mut().new_sketch();
            m.navigate(outcome);
        })?;
        self.on_click(&d.save, Self::save)?;
        self.on_click(&d.delete, Self::delete)?;
        self.on_click(&d.edit_metadata, Self::open_metadata)?;
        self.on_click(&d.metadata.save, Self::save_metadata)?;
        self.on_click(&d.metadata.cancel, |m| m.dom.metadata.hide())?;
        self.on_click(&d.metadata.overlay, |m| m.dom.metadata.hide())?;
        self.on_click(&d.metadata.add_lib, |m| {
            if let Err(err) = m.dom.metadata.add_lib_input(&m.dom.document, "") {
                tracing::warn!(error = ?err, "library row not added");
            }
        })?;
        self.on_click(&d.cycle, |m| m.with_host(SessionHost::cycle_view))?;
        self.on_click(&d.play, |m| m.with_host(SessionHost::toggle_play))?;

        let manager = Rc::clone(self);
        dom::listen(&d.selector, "change", move |_: Event| {
            let slug = manager.dom.selector.value();
            let outcome = {
                let mut host = manager.host.borrow_mut();
                if slug.is_empty() {
                    host.new_sketch()
                } else {
                    host.select_slug(&slug)
                }
            };
            manager.navigate(outcome);
        })?;

        let manager = Rc::clone(self);
        dom::listen(&d.frame, "load", move |_: Event| {
            manager.with_host(SessionHost::editor_loaded);
        })?;

        let manager = Rc::clone(self);
        dom::listen(&d.document, "keydown", move |event: KeyboardEvent| {
            let mods = Modifiers::from_dom(
                event.shift_key(),
                event.alt_key(),
                event.ctrl_key(),
                event.meta_key(),
            );
            if Shortcut::from_dom(&event.key(), &event.code(), mods) == Some(Shortcut::Save) {
                event.prevent_default();
                if manager.host.borrow().can_save() {
                    manager.save();
                }
            }
        })?;

        let manager = Rc::clone(self);
        dom::listen(&d.window, "message", move |event: MessageEvent| {
            let sender = frame_sender(&manager.dom.frame, &event);
            let Some(data) = dom::event_json(&event) else {
                tracing::debug!(?sender, "ignoring non-JSON message");
                return;
            };
            let handled = manager.with_host(|host| host.handle_message(sender, &data));
            if let Err(err) = handled {
                tracing::debug!(?sender, error = %err, "message rejected");
            }
        })?;
        Ok(())
    }
}

/// Manager page surface: the signed-in member's sketches.
#[wasm_bindgen]
pub struct SketchManagerWeb {
    manager: Rc<Manager>,
}

#[wasm_bindgen]
impl SketchManagerWeb {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<SketchManagerWeb, JsValue> {
        let window = dom::window()?;
        let document = dom::document()?;
        let config = HostConfig::from_lookup_with(body_lookup(&document));
        tracing::info!(api = %config.api_base, member = ?config.member, "manager bound");
        let api = SketchApi::new(BrowserTransport, config.api_base.clone());
        let dom = ManagerDom::bind(window, document)?;
        Ok(Self {
            manager: Rc::new(Manager {
                host: RefCell::new(SessionHost::new(config)),
                api,
                dom,
            }),
        })
    }

    /// Install listeners, show the empty editor and list the member's sketches.
    pub fn start(&self) -> Result<(), JsValue> {
        self.manager.install_listeners()?;
        self.manager.with_host(SessionHost::start);
        self.manager.load();
        Ok(())
    }

    pub fn save(&self) {
        self.manager.save();
    }

    #[wasm_bindgen(getter, js_name = isDirty)]
    pub fn is_dirty(&self) -> bool {
        self.manager.host.borrow().is_dirty()
    }
}

// ── Lister ───────────────────────────────────────────────────────────────

struct ListerDom {
    window: Window,
    buttons: Vec<Element>,
    frame: HtmlIFrameElement,
    link: HtmlAnchorElement,
    prev: Element,
    next: Element,
    cycle: Element,
    play: Element,
}

impl ListerDom {
    fn bind(window: Window, document: &Document) -> Result<(Self, Vec<ListerEntry>), JsValue> {
        let list: Element = dom::by_id(document, "sketch-lister")?;
        let nodes = list.query_selector_all("button.ccb-link[data-alias][data-page]")?;
        let mut buttons = Vec::new();
        let mut entries = Vec::new();
        for i in 0..nodes.length() {
            let Some(button) = nodes.get(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
                continue;
            };
            let (Some(member), Some(slug)) =
                (button.get_attribute("data-alias"), button.get_attribute("data-page"))
            else {
                continue;
            };
            if member.is_empty() || slug.is_empty() {
                tracing::warn!(index = i, "sketch button without alias or page");
                continue;
            }
            let title = button
                .get_attribute("data-title")
                .or_else(|| button.text_content())
                .unwrap_or_default();
            entries.push(ListerEntry {
                member,
                slug,
                title: title.trim().to_owned(),
            });
            buttons.push(button);
        }
        let dom = Self {
            buttons,
            frame: dom::by_id(document, "sketch-view")?,
            link: dom::by_id(document, "sketch-link")?,
            prev: dom::by_id(document, "prev-sketch")?,
            next: dom::by_id(document, "next-sketch")?,
            cycle: dom::by_id(document, "cycle-view")?,
            play: dom::by_id(document, "play-stop-sketch")?,
            window,
        };
        Ok((dom, entries))
    }

    fn mark_active(&self, current: Option<usize>) {
        for (i, button) in self.buttons.iter().enumerate() {
            let active = current == Some(i);
            let (current, selected) = if active { ("page", "true") } else { ("false", "false") };
            let result = button
                .class_list()
                .toggle_with_force("ccb-active", active)
                .and_then(|_| button.set_attribute("aria-current", current))
                .and_then(|()| button.set_attribute("aria-selected", selected));
            if let Err(err) = result {
                tracing::warn!(index = i, error = ?err, "sketch button not updated");
            }
        }
    }
}

struct Lister {
    session: RefCell<ListerSession>,
    dom: ListerDom,
}

impl Lister {
    fn with_session<R>(self: &Rc<Self>, f: impl FnOnce(&mut ListerSession) -> R) -> R {
        let result = f(&mut self.session.borrow_mut());
        self.flush();
        result
    }

    fn flush(self: &Rc<Self>) {
        let effects = self.session.borrow_mut().drain_effects();
        for effect in effects {
            match effect {
                HostEffect::PostToEditor(message) => match self.dom.frame.content_window() {
                    Some(editor) => dom::post(&editor, &message),
                    None => tracing::debug!(kind = message.kind(), "no editor window to post to"),
                },
                HostEffect::LoadEditor { url } => {
                    tracing::debug!(%url, "loading sketch");
                    self.dom.frame.set_src(&url);
                }
                other => tracing::debug!(?other, "effect has no lister surface"),
            }
        }
        let session = self.session.borrow();
        self.dom.mark_active(session.entries().iter().position(|e| Some(e) == session.current()));
        if let Some(link) = session.sketch_link() {
            self.dom.link.set_href(&link);
        }
        set_play_button(&self.dom.play, session.is_running());
    }

    fn install_listeners(self: &Rc<Self>) -> Result<(), JsValue> {
        for (index, button) in self.dom.buttons.iter().enumerate() {
            let lister = Rc::clone(self);
            dom::listen(button, "click", move |_: Event| {
                lister.with_session(|session| session.select(index));
            })?;
        }
        let lister = Rc::clone(self);
        dom::listen(&self.dom.prev, "click", move |_: Event| {
            lister.with_session(ListerSession::previous);
        })?;
        let lister = Rc::clone(self);
        dom::listen(&self.dom.next, "click", move |_: Event| {
            lister.with_session(ListerSession::next);
        })?;
        let lister = Rc::clone(self);
        dom::listen(&self.dom.cycle, "click", move |_: Event| {
            lister.with_session(ListerSession::cycle_view);
        })?;
        let lister = Rc::clone(self);
        dom::listen(&self.dom.play, "click", move |_: Event| {
            lister.with_session(ListerSession::toggle_play);
        })?;
        let lister = Rc::clone(self);
        dom::listen(&self.dom.window, "message", move |event: MessageEvent| {
            let sender = frame_sender(&lister.dom.frame, &event);
            let Some(data) = dom::event_json(&event) else {
                return;
            };
            let handled = lister.with_session(|session| session.handle_message(sender, &data));
            if let Err(err) = handled {
                tracing::debug!(?sender, error = %err, "message rejected");
            }
        })?;
        Ok(())
    }
}

/// Lister page surface: browse every member's sketches read-only.
#[wasm_bindgen]
pub struct SketchListerWeb {
    lister: Rc<Lister>,
}

#[wasm_bindgen]
impl SketchListerWeb {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<SketchListerWeb, JsValue> {
        let window = dom::window()?;
        let document = dom::document()?;
        let config = HostConfig::from_lookup_with(body_lookup(&document));
        let (dom, entries) = ListerDom::bind(window, &document)?;
        tracing::info!(sketches = entries.len(), "lister bound");
        Ok(Self {
            lister: Rc::new(Lister {
                session: RefCell::new(ListerSession::new(config, entries)),
                dom,
            }),
        })
    }

    /// Install listeners and open a random sketch.
    pub fn start(&self) -> Result<(), JsValue> {
        self.lister.install_listeners()?;
        let len = self.lister.session.borrow().entries().len();
        if len == 0 {
            tracing::info!("no sketches to list");
        }
        let seed = (js_sys::Math::random() * len as f64) as usize;
        self.lister.with_session(|session| session.start(seed));
        Ok(())
    }
}
