#![forbid(unsafe_code)]

//! Tracing layer that routes formatted events to the browser console.
//!
//! [`BrowserConsoleLayer`] formats each event into one line and hands it to a
//! [`LogSink`] together with its level, so errors land in `console.error`,
//! warnings in `console.warn` and so on. The formatting is target-independent
//! and tested natively with a capturing sink.
//!
//! ```ignore
//! sketchbook_web::logging::init_logging(LevelFilter::INFO);
//! ```

use std::fmt::{self, Write as FmtWrite};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// What each formatted line includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLayerConfig {
    /// Show a `HH:MM:SS` timestamp. Default: false (the console has its own).
    pub show_time: bool,
    /// Show the level. Default: true.
    pub show_level: bool,
    /// Show the tracing target (module path). Default: true.
    pub show_target: bool,
    /// Show structured fields beyond `message`. Default: true.
    pub show_fields: bool,
}

impl Default for ConsoleLayerConfig {
    fn default() -> Self {
        Self {
            show_time: false,
            show_level: true,
            show_target: true,
            show_fields: true,
        }
    }
}

/// Destination for formatted records.
pub trait LogSink: Send + Sync {
    fn write(&self, level: Level, line: &str);
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN ",
        Level::INFO => "INFO ",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// Extracts message and structured fields from a tracing event.
#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = strip_debug_quotes(&format!("{value:?}"));
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.push((field.name().to_string(), rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }
}

fn strip_debug_quotes(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn timestamp_now() -> String {
    let since_epoch = web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = since_epoch.as_secs();
    let h = (secs / 3600) % 24;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// A `tracing_subscriber::Layer` writing one line per event to a [`LogSink`].
pub struct BrowserConsoleLayer<S> {
    sink: S,
    config: ConsoleLayerConfig,
}

impl<S: LogSink> BrowserConsoleLayer<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, ConsoleLayerConfig::default())
    }

    pub fn with_config(sink: S, config: ConsoleLayerConfig) -> Self {
        Self { sink, config }
    }

    #[must_use]
    pub fn show_time(mut self, show: bool) -> Self {
        self.config.show_time = show;
        self
    }

    #[must_use]
    pub fn show_target(mut self, show: bool) -> Self {
        self.config.show_target = show;
        self
    }

    #[must_use]
    pub fn show_fields(mut self, show: bool) -> Self {
        self.config.show_fields = show;
        self
    }

    fn format_event(&self, event: &Event<'_>) -> String {
        let metadata = event.metadata();
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut line = String::new();
        if self.config.show_time {
            line.push_str(&timestamp_now());
            line.push(' ');
        }
        if self.config.show_level {
            line.push_str(level_str(*metadata.level()));
            line.push(' ');
        }
        if self.config.show_target {
            let _ = write!(line, "{}: ", metadata.target());
        }
        line.push_str(visitor.message.as_deref().unwrap_or_default());
        if self.config.show_fields {
            for (key, value) in &visitor.fields {
                let _ = write!(line, " {key}={value}");
            }
        }
        line
    }
}

impl<S, Sub> Layer<Sub> for BrowserConsoleLayer<S>
where
    S: LogSink + 'static,
    Sub: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        let line = self.format_event(event);
        self.sink.write(*event.metadata().level(), &line);
    }
}

/// Install `sink` as the global subscriber at `max_level`.
///
/// Returns `false` when a global subscriber was already set; the first
/// installation wins.
pub fn init_with<S: LogSink + 'static>(sink: S, max_level: LevelFilter) -> bool {
    let subscriber = tracing_subscriber::registry()
        .with(BrowserConsoleLayer::new(sink))
        .with(max_level);
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::{Level, LogSink};
    use wasm_bindgen::JsValue;

    /// Writes to `console.error` / `warn` / `info` / `debug`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WebConsoleSink;

    impl LogSink for WebConsoleSink {
        fn write(&self, level: Level, line: &str) {
            let line = JsValue::from_str(line);
            match level {
                Level::ERROR => web_sys::console::error_1(&line),
                Level::WARN => web_sys::console::warn_1(&line),
                Level::INFO => web_sys::console::info_1(&line),
                Level::DEBUG | Level::TRACE => web_sys::console::debug_1(&line),
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::WebConsoleSink;

/// Route `tracing` to the browser console. Safe to call more than once.
#[cfg(target_arch = "wasm32")]
pub fn init_logging(max_level: LevelFilter) {
    init_with(WebConsoleSink, max_level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture {
        lines: Arc<Mutex<Vec<(Level, String)>>>,
    }

    impl Capture {
        fn snapshot(&self) -> Vec<(Level, String)> {
            self.lines.lock().expect("capture lock").clone()
        }
    }

    impl LogSink for Capture {
        fn write(&self, level: Level, line: &str) {
            self.lines
                .lock()
                .expect("capture lock")
                .push((level, line.to_string()));
        }
    }

    fn capture_with(
        config: ConsoleLayerConfig,
        filter: LevelFilter,
        emit: impl FnOnce(),
    ) -> Vec<(Level, String)> {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry()
            .with(BrowserConsoleLayer::with_config(capture.clone(), config))
            .with(filter);
        let dispatch = tracing::Dispatch::new(subscriber);
        tracing::dispatcher::with_default(&dispatch, emit);
        capture.snapshot()
    }

    #[test]
    fn default_config() {
        let cfg = ConsoleLayerConfig::default();
        assert!(!cfg.show_time);
        assert!(cfg.show_level);
        assert!(cfg.show_target);
        assert!(cfg.show_fields);
    }

    #[test]
    fn formats_level_target_message_and_fields() {
        let lines = capture_with(ConsoleLayerConfig::default(), LevelFilter::TRACE, || {
            tracing::warn!(view_mode = "tiled", len = 3, "invalid view mode");
        });
        assert_eq!(lines.len(), 1);
        let (level, line) = &lines[0];
        assert_eq!(*level, Level::WARN);
        assert!(line.starts_with("WARN  sketchbook_web"), "line: {line}");
        assert!(line.contains("invalid view mode"), "line: {line}");
        assert!(line.ends_with("view_mode=tiled len=3"), "line: {line}");
    }

    #[test]
    fn bare_message_when_everything_is_off() {
        let config = ConsoleLayerConfig {
            show_time: false,
            show_level: false,
            show_target: false,
            show_fields: false,
        };
        let lines = capture_with(config, LevelFilter::TRACE, || {
            tracing::error!(frame = 4, "marker missing");
        });
        assert_eq!(lines, vec![(Level::ERROR, "marker missing".to_string())]);
    }

    #[test]
    fn respects_level_filter() {
        let lines = capture_with(ConsoleLayerConfig::default(), LevelFilter::INFO, || {
            tracing::debug!("debug drop");
            tracing::info!("info keep");
        });
        assert_eq!(lines.len(), 1);
        assert!(lines[0].1.contains("info keep"));
    }

    #[test]
    fn builder_toggles() {
        let layer = BrowserConsoleLayer::new(Capture::default())
            .show_time(true)
            .show_target(false)
            .show_fields(false);
        assert!(layer.config.show_time);
        assert!(!layer.config.show_target);
        assert!(!layer.config.show_fields);
    }

    #[test]
    fn strip_debug_quotes_basic() {
        assert_eq!(strip_debug_quotes("\"hello\""), "hello");
        assert_eq!(strip_debug_quotes("plain"), "plain");
        assert_eq!(strip_debug_quotes("\""), "\"");
    }

    #[test]
    fn timestamp_format_valid() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 8);
        assert_eq!(&ts[2..3], ":");
        assert_eq!(&ts[5..6], ":");
    }

    #[test]
    fn level_str_fixed_width() {
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            assert_eq!(level_str(level).len(), 5);
        }
    }
}
