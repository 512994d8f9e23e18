#![forbid(unsafe_code)]

//! WASM frontend for the sketch editor and its host pages.
//!
//! Three page surfaces are exported through `wasm-bindgen`:
//! - [`SketchEditorWeb`] drives the editor page around an
//!   `sketchbook_core::EditorSession`,
//! - [`SketchManagerWeb`] drives the member's sketch manager,
//! - [`SketchListerWeb`] drives the read-only sketch browser.
//!
//! All behavior lives in `sketchbook-core` and `sketchbook-host`; this crate
//! binds DOM elements and applies queued effects. The geometry, query-string
//! and logging helpers are target-independent and tested natively.

pub mod gutter;
pub mod location;
pub mod logging;

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod editor;
#[cfg(target_arch = "wasm32")]
mod fetch;
#[cfg(target_arch = "wasm32")]
mod host;

#[cfg(target_arch = "wasm32")]
pub use editor::SketchEditorWeb;
#[cfg(target_arch = "wasm32")]
pub use host::{SketchListerWeb, SketchManagerWeb};

/// Route `tracing` output to the browser console. `level` is a tracing level
/// filter such as `"debug"`; unknown or missing values mean `info`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(js_name = initLogging)]
pub fn init_browser_logging(level: Option<String>) {
    let max_level = level
        .and_then(|level| level.parse().ok())
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);
    logging::init_logging(max_level);
}

/// Native builds compile this crate as a stub so `cargo check --workspace` stays
/// green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct SketchEditorWeb;

#[cfg(not(target_arch = "wasm32"))]
impl SketchEditorWeb {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct SketchManagerWeb;

#[cfg(not(target_arch = "wasm32"))]
impl SketchManagerWeb {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct SketchListerWeb;

#[cfg(not(target_arch = "wasm32"))]
impl SketchListerWeb {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}
