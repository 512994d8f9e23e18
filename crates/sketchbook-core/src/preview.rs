#![forbid(unsafe_code)]

//! Preview frame lifecycle.
//!
//! The controller owns the captured template and the identity of the one live
//! preview frame. It never touches a document: `start`/`stop` queue
//! [`Effect`]s whose order (remove old, create new, write document) is what
//! keeps at most one frame alive. Every frame gets a fresh [`FrameId`] so that
//! callbacks from a torn-down frame can be recognised and dropped.

use core::fmt;

use crate::effect::{Effect, Effects};
use crate::template::{PreviewTemplate, TemplateError};

/// Identity of one created preview frame. Ids are never reused in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u64);

impl FrameId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame-{}", self.0)
    }
}

/// Sandbox tokens a frame may be granted.
pub const KNOWN_SANDBOX_TOKENS: [&str; 12] = [
    "allow-downloads",
    "allow-forms",
    "allow-modals",
    "allow-orientation-lock",
    "allow-pointer-lock",
    "allow-popups",
    "allow-popups-to-escape-sandbox",
    "allow-presentation",
    "allow-same-origin",
    "allow-scripts",
    "allow-top-navigation",
    "allow-top-navigation-by-user-activation",
];

/// `sandbox` attribute for preview frames.
///
/// Always contains `allow-scripts`. Anything beyond that has to be opted into
/// through configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    tokens: Vec<String>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            tokens: vec!["allow-scripts".to_owned()],
        }
    }
}

impl SandboxPolicy {
    /// Default posture plus the space-separated `extra` tokens.
    ///
    /// Unknown tokens are dropped with a warning.
    #[must_use]
    pub fn with_extra(extra: &str) -> Self {
        let mut policy = Self::default();
        for token in extra.split_ascii_whitespace() {
            if !KNOWN_SANDBOX_TOKENS.contains(&token) {
                tracing::warn!(token, "ignoring unknown sandbox token");
                continue;
            }
            if !policy.tokens.iter().any(|t| t == token) {
                policy.tokens.push(token.to_owned());
            }
        }
        policy
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn allows(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    #[must_use]
    pub fn attribute_value(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Template fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Non-2xx response.
    Status(u16),
    /// Request never produced a response.
    Network(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "server answered HTTP {status}"),
            Self::Network(reason) => write!(f, "network error: {reason}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// A run could not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewError {
    /// No template has been captured yet.
    TemplateNotCaptured,
    /// The last capture attempt failed.
    CaptureFailed(FetchError),
    /// The captured template breaks the injection contract.
    Injection(TemplateError),
}

impl fmt::Display for PreviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplateNotCaptured => write!(f, "preview template has not been captured"),
            Self::CaptureFailed(err) => write!(f, "preview template capture failed: {err}"),
            Self::Injection(err) => write!(f, "cannot inject sketch source: {err}"),
        }
    }
}

impl std::error::Error for PreviewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TemplateNotCaptured => None,
            Self::CaptureFailed(err) => Some(err),
            Self::Injection(err) => Some(err),
        }
    }
}

impl From<TemplateError> for PreviewError {
    fn from(err: TemplateError) -> Self {
        Self::Injection(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateState {
    Missing,
    Fetching,
    Captured(PreviewTemplate),
    Failed(FetchError),
}

/// Owner of the captured template and the live preview frame.
#[derive(Debug, Clone)]
pub struct PreviewController {
    template_url: Option<String>,
    template: TemplateState,
    sandbox: SandboxPolicy,
    active: Option<FrameId>,
    next_id: u64,
    run_after_capture: bool,
}

impl PreviewController {
    #[must_use]
    pub fn new(template_url: Option<String>, sandbox: SandboxPolicy) -> Self {
        Self {
            template_url,
            template: TemplateState::Missing,
            sandbox,
            active: None,
            next_id: 1,
            run_after_capture: false,
        }
    }

    #[must_use]
    pub fn template_url(&self) -> Option<&str> {
        self.template_url.as_deref()
    }

    #[must_use]
    pub fn template(&self) -> Option<&PreviewTemplate> {
        match &self.template {
            TemplateState::Captured(template) => Some(template),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_captured(&self) -> bool {
        matches!(self.template, TemplateState::Captured(_))
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        matches!(self.template, TemplateState::Fetching)
    }

    #[must_use]
    pub fn sandbox(&self) -> &SandboxPolicy {
        &self.sandbox
    }

    #[must_use]
    pub const fn active_frame(&self) -> Option<FrameId> {
        self.active
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// `true` when `id` is the live frame.
    #[must_use]
    pub fn is_current(&self, id: FrameId) -> bool {
        self.active == Some(id)
    }

    /// Queue a template fetch unless one is in flight or already succeeded.
    ///
    /// Returns `true` when a fetch was queued.
    pub fn request_capture(&mut self, effects: &mut Effects) -> bool {
        if self.is_fetching() || self.is_captured() {
            return false;
        }
        let Some(url) = self.template_url.clone() else {
            tracing::warn!("no preview template url configured");
            return false;
        };
        tracing::debug!(url = %url, "capturing preview template");
        self.template = TemplateState::Fetching;
        effects.push(Effect::FetchTemplate { url });
        true
    }

    /// Store the outcome of a template fetch.
    pub fn capture_template(
        &mut self,
        result: Result<String, FetchError>,
    ) -> Result<&PreviewTemplate, PreviewError> {
        match result {
            Ok(html) => {
                let template = PreviewTemplate::new(html);
                if let Err(err) = template.validate() {
                    // Stored anyway; the contract violation surfaces on run.
                    tracing::error!(error = %err, "captured preview template is unusable");
                }
                tracing::info!(len = template.len(), "preview template captured");
                self.template = TemplateState::Captured(template);
                match &self.template {
                    TemplateState::Captured(template) => Ok(template),
                    _ => Err(PreviewError::TemplateNotCaptured),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "preview template capture failed");
                self.run_after_capture = false;
                self.template = TemplateState::Failed(err.clone());
                Err(PreviewError::CaptureFailed(err))
            }
        }
    }

    /// Arm or disarm the run that follows a pending capture.
    pub fn set_run_after_capture(&mut self, armed: bool) {
        self.run_after_capture = armed;
    }

    /// Disarm and report whether a run was waiting on the capture.
    pub fn take_run_after_capture(&mut self) -> bool {
        core::mem::take(&mut self.run_after_capture)
    }

    /// Replace the live frame with a fresh one running `source`.
    ///
    /// The document is rendered before anything is torn down, so a template
    /// that breaks the injection contract leaves the current frame alone.
    pub fn start(&mut self, source: &str, effects: &mut Effects) -> Result<FrameId, PreviewError> {
        let template = match &self.template {
            TemplateState::Captured(template) => template,
            TemplateState::Failed(err) => return Err(PreviewError::CaptureFailed(err.clone())),
            TemplateState::Missing | TemplateState::Fetching => {
                return Err(PreviewError::TemplateNotCaptured);
            }
        };
        let html = template.render(source)?;

        if let Some(old) = self.active.take() {
            effects.push(Effect::RemoveFrame(old));
        }
        let id = FrameId(self.next_id);
        self.next_id += 1;
        effects.push(Effect::CreateFrame {
            id,
            sandbox: self.sandbox.attribute_value(),
        });
        effects.push(Effect::WriteDocument { id, html });
        self.active = Some(id);
        tracing::debug!(frame = %id, "preview frame started");
        Ok(id)
    }

    /// Tear down the live frame. Returns the removed id; `None` is a no-op.
    pub fn stop(&mut self, effects: &mut Effects) -> Option<FrameId> {
        let id = self.active.take()?;
        effects.push(Effect::RemoveFrame(id));
        tracing::debug!(frame = %id, "preview frame stopped");
        Some(id)
    }
}
