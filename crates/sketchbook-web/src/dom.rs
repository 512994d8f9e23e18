#![forbid(unsafe_code)]

//! Small DOM helpers shared by the editor and host bindings.

use js_sys::{JSON, Object};
use serde_json::Value;
use sketchbook_core::Message;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::convert::FromWasmAbi;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, EventTarget, MessageEvent, Window};

pub(crate) fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

pub(crate) fn document() -> Result<Document, JsValue> {
    window()?
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))
}

/// Element by id, cast to `T`.
pub(crate) fn by_id<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("missing #{id}")))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("#{id} has an unexpected element type")))
}

/// Toggle the `hidden` class.
pub(crate) fn set_hidden(element: &Element, hidden: bool) {
    if let Err(err) = element.class_list().toggle_with_force("hidden", hidden) {
        tracing::warn!(id = %element.id(), error = ?err, "class toggle failed");
    }
}

/// Attach `handler` for `event` on `target` for the lifetime of the page.
pub(crate) fn listen<E, F>(target: &EventTarget, event: &str, handler: F) -> Result<(), JsValue>
where
    E: FromWasmAbi + 'static,
    F: FnMut(E) + 'static,
{
    let closure = Closure::<dyn FnMut(E)>::new(handler);
    target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

/// `true` when `source` is the same window object as `window`.
pub(crate) fn is_window(source: Option<&Object>, window: &Window) -> bool {
    source.is_some_and(|source| Object::is(source, window.as_ref()))
}

/// Message payload as JSON, via the structured clone's JSON form.
pub(crate) fn event_json(event: &MessageEvent) -> Option<Value> {
    let text = JSON::stringify(&event.data()).ok()?.as_string()?;
    serde_json::from_str(&text).ok()
}

/// Post a protocol message to `target`, restricted to this page's origin.
pub(crate) fn post(target: &Window, message: &Message) {
    let result = window()
        .and_then(|own| own.location().origin())
        .and_then(|origin| {
            let payload = JSON::parse(&message.to_json_string())?;
            target.post_message(&payload, &origin)
        });
    if let Err(err) = result {
        tracing::warn!(kind = message.kind(), error = ?err, "postMessage failed");
    }
}

/// `alert()`; failures only logged.
pub(crate) fn alert(text: &str) {
    if let Err(err) = window().and_then(|w| w.alert_with_message(text)) {
        tracing::warn!(error = ?err, "alert failed");
    }
}

/// `confirm()`; an unavailable dialog counts as "no".
pub(crate) fn confirm(text: &str) -> bool {
    window()
        .and_then(|w| w.confirm_with_message(text))
        .unwrap_or(false)
}
