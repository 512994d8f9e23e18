#![forbid(unsafe_code)]

//! Session host for the embedded sketch editor.
//!
//! Manager and lister pages embed the editor frame, navigate between
//! sketches, keep a play/stop toggle in sync with the editor, and (manager
//! only) persist sketches through the members API. Everything here is
//! DOM-free. Like the editor session, hosts queue [`HostEffect`]s for the web
//! layer and expose async persistence as prepare/finish pairs around an
//! [`HttpTransport`], so no state borrow is held across an `await`.

pub mod api;
pub mod config;
pub mod metadata;
pub mod session;

pub use api::{
    ApiError, ApiRequest, ApiResponse, HttpTransport, Member, Method, SaveOutcome, SketchApi,
    SketchRecord,
};
pub use config::HostConfig;
pub use metadata::{MetadataDraft, MetadataError, SketchMetadata};
pub use session::{
    HostEffect, ListerEntry, ListerSession, Navigation, Notice, NoticeKind, SaveRequest,
    SessionHost, SketchRef, Target, play_button,
};
