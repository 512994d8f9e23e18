#![forbid(unsafe_code)]

//! Host page configuration from the page root's `data-*` attributes.

use sketchbook_core::config::parse_bool;

/// API prefix.
pub const KEY_API_BASE: &str = "data-api-base";
/// Where an unauthenticated manager is sent.
pub const KEY_SIGN_IN_URL: &str = "data-sign-in-url";
/// Prefix of editor page URLs.
pub const KEY_SKETCHES_BASE: &str = "data-sketches-base";
/// Member alias rendered by the server, when known.
pub const KEY_MEMBER: &str = "data-member";
/// Ask before leaving a sketch with unsaved changes.
pub const KEY_CONFIRM_DISCARD: &str = "data-confirm-discard";

/// Resolved host settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub api_base: String,
    pub sign_in_url: String,
    pub sketches_base: String,
    pub member: Option<String>,
    pub confirm_discard: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_base: "/api".into(),
            sign_in_url: "/sign-in".into(),
            sketches_base: "/sketches".into(),
            member: None,
            confirm_discard: true,
        }
    }
}

impl HostConfig {
    pub fn from_lookup_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let confirm_discard = match lookup(KEY_CONFIRM_DISCARD) {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "invalid boolean, using default");
                defaults.confirm_discard
            }),
            None => defaults.confirm_discard,
        };
        Self {
            api_base: text(KEY_API_BASE)
                .map(|base| base.trim_end_matches('/').to_owned())
                .unwrap_or(defaults.api_base),
            sign_in_url: text(KEY_SIGN_IN_URL).unwrap_or(defaults.sign_in_url),
            sketches_base: text(KEY_SKETCHES_BASE)
                .map(|base| base.trim_end_matches('/').to_owned())
                .unwrap_or(defaults.sketches_base),
            member: text(KEY_MEMBER),
            confirm_discard,
        }
    }

    /// Editor page for an existing sketch.
    #[must_use]
    pub fn editor_url(&self, member: &str, slug: &str) -> String {
        format!("{}/{member}/{slug}/edit", self.sketches_base)
    }

    /// Empty editor page for a member.
    #[must_use]
    pub fn new_editor_url(&self, member: &str) -> String {
        self.editor_url(member, "new")
    }
}
