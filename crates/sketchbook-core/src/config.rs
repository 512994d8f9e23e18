#![forbid(unsafe_code)]

//! Editor configuration, resolved from a key lookup.
//!
//! The web layer answers lookups from the URL query string first and the
//! editor root's `data-*` attributes second. Invalid values fall back to the
//! defaults with a warning; configuration never fails.

use crate::formatter::FormatOptions;
use crate::preview::SandboxPolicy;
use crate::view_mode::{VIEW_MODE_PARAM, ViewMode};

/// Server-rendered view-mode hint, used when the query has none.
pub const KEY_VIEW_MODE_HINT: &str = "data-view-mode";
/// URL of the clean preview document.
pub const KEY_SKETCH_SRC: &str = "data-sketch-src";
/// Extra sandbox tokens, space separated.
pub const KEY_SANDBOX: &str = "data-sandbox";
/// Run once the bootstrap source is loaded.
pub const KEY_AUTO_RUN: &str = "data-auto-run";
/// Spaces per indent level for the formatter.
pub const KEY_INDENT_WIDTH: &str = "data-indent-width";

const MAX_INDENT_WIDTH: usize = 8;

/// Resolved editor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    pub initial_view_mode: ViewMode,
    pub template_url: Option<String>,
    pub sandbox: SandboxPolicy,
    pub auto_run: bool,
    pub format: FormatOptions,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            initial_view_mode: ViewMode::default(),
            template_url: None,
            sandbox: SandboxPolicy::default(),
            auto_run: true,
            format: FormatOptions::default(),
        }
    }
}

impl EditorConfig {
    /// Resolve every setting through `lookup`.
    pub fn from_lookup_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            initial_view_mode: detect_view_mode(&lookup),
            template_url: lookup(KEY_SKETCH_SRC)
                .map(|url| url.trim().to_owned())
                .filter(|url| !url.is_empty()),
            sandbox: lookup(KEY_SANDBOX)
                .map_or_else(SandboxPolicy::default, |extra| SandboxPolicy::with_extra(&extra)),
            auto_run: lookup_bool(&lookup, KEY_AUTO_RUN).unwrap_or(defaults.auto_run),
            format: FormatOptions {
                indent_width: detect_indent_width(&lookup).unwrap_or(defaults.format.indent_width),
            },
        }
    }
}

fn detect_view_mode<F>(lookup: &F) -> ViewMode
where
    F: Fn(&str) -> Option<String>,
{
    for key in [VIEW_MODE_PARAM, KEY_VIEW_MODE_HINT] {
        let Some(raw) = lookup(key) else {
            continue;
        };
        match ViewMode::parse(&raw) {
            Some(mode) => return mode,
            None => tracing::warn!(key, value = %raw, "invalid view mode, ignoring"),
        }
    }
    ViewMode::default()
}

fn detect_indent_width<F>(lookup: &F) -> Option<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(KEY_INDENT_WIDTH)?;
    match raw.trim().parse::<usize>() {
        Ok(width) if (1..=MAX_INDENT_WIDTH).contains(&width) => Some(width),
        _ => {
            tracing::warn!(value = %raw, "invalid indent width, using default");
            None
        }
    }
}

/// Lenient boolean used by every `data-*` flag.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn lookup_bool<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let parsed = parse_bool(&raw);
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "invalid boolean, using default");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn lookup<'a>(map: &'a HashMap<String, String>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_lookup_gives_defaults() {
        let env = map(&[]);
        assert_eq!(EditorConfig::from_lookup_with(lookup(&env)), EditorConfig::default());
    }

    #[test]
    fn query_wins_over_server_hint() {
        let env = map(&[(VIEW_MODE_PARAM, "debug"), (KEY_VIEW_MODE_HINT, "code")]);
        let config = EditorConfig::from_lookup_with(lookup(&env));
        assert_eq!(config.initial_view_mode, ViewMode::Debug);
    }

    #[test]
    fn invalid_query_falls_back_to_hint() {
        let env = map(&[(VIEW_MODE_PARAM, "tiled"), (KEY_VIEW_MODE_HINT, "code")]);
        let config = EditorConfig::from_lookup_with(lookup(&env));
        assert_eq!(config.initial_view_mode, ViewMode::Code);
    }

    #[test]
    fn invalid_everything_falls_back_to_overlay() {
        let env = map(&[(VIEW_MODE_PARAM, "x"), (KEY_VIEW_MODE_HINT, "y")]);
        let config = EditorConfig::from_lookup_with(lookup(&env));
        assert_eq!(config.initial_view_mode, ViewMode::Overlay);
    }

    #[test]
    fn reads_template_url_and_sandbox() {
        let env = map(&[
            (KEY_SKETCH_SRC, " /sketches/luis/snake/ "),
            (KEY_SANDBOX, "allow-modals"),
        ]);
        let config = EditorConfig::from_lookup_with(lookup(&env));
        assert_eq!(config.template_url.as_deref(), Some("/sketches/luis/snake/"));
        assert_eq!(config.sandbox.attribute_value(), "allow-scripts allow-modals");
    }

    #[test]
    fn blank_template_url_is_none() {
        let env = map(&[(KEY_SKETCH_SRC, "  ")]);
        assert_eq!(EditorConfig::from_lookup_with(lookup(&env)).template_url, None);
    }

    #[test]
    fn auto_run_and_indent_parse() {
        let env = map(&[(KEY_AUTO_RUN, "off"), (KEY_INDENT_WIDTH, "4")]);
        let config = EditorConfig::from_lookup_with(lookup(&env));
        assert!(!config.auto_run);
        assert_eq!(config.format.indent_width, 4);
    }

    #[test]
    fn bad_values_use_defaults() {
        let env = map(&[(KEY_AUTO_RUN, "maybe"), (KEY_INDENT_WIDTH, "0")]);
        let config = EditorConfig::from_lookup_with(lookup(&env));
        assert!(config.auto_run);
        assert_eq!(config.format.indent_width, 2);
    }

    #[test]
    fn parse_bool_truthy_and_falsy() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("garbage"), None);
    }
}
