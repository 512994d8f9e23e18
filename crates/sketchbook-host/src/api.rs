#![forbid(unsafe_code)]

//! Members/sketches persistence API client.
//!
//! | call | request |
//! |---|---|
//! | [`SketchApi::current_member`] | `GET {base}/members/me` |
//! | [`SketchApi::list_sketches`] | `GET {base}/sketches/{member}` |
//! | [`SketchApi::create_sketch`] | `POST {base}/sketches/{member}/new` `{source_code}` |
//! | [`SketchApi::update_source`] | `PUT {base}/sketches/{member}/{slug}` `{source_code}` |
//! | [`SketchApi::update_metadata`] | `PATCH {base}/sketches/{member}/{slug}` metadata |
//! | [`SketchApi::delete_sketch`] | `DELETE {base}/sketches/{member}/{slug}` |
//!
//! The transport carries session credentials; a 401 from any call becomes
//! [`ApiError::Unauthorized`].

use core::fmt;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::metadata::{MetadataError, SketchMetadata};

/// HTTP method subset used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// One request; `body` is JSON when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
}

/// Raw response as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Persistence failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401: the session is missing or expired.
    Unauthorized,
    /// Any other non-2xx response.
    Status { status: u16, body: String },
    /// No response at all.
    Network(String),
    /// 2xx response with an unexpected body.
    Decode(String),
    /// Rejected before sending.
    Validation(MetadataError),
    /// Member or slug cannot be used as a path segment.
    InvalidPath(String),
}

impl ApiError {
    /// Server-provided `{"error": "..."}` message, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<String> {
        let Self::Status { body, .. } = self else {
            return None;
        };
        serde_json::from_str::<Value>(body)
            .ok()?
            .get("error")?
            .as_str()
            .map(str::to_owned)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "not signed in"),
            Self::Status { status, .. } => match self.server_message() {
                Some(message) => write!(f, "server answered HTTP {status}: {message}"),
                None => write!(f, "server answered HTTP {status}"),
            },
            Self::Network(reason) => write!(f, "network error: {reason}"),
            Self::Decode(reason) => write!(f, "unexpected response: {reason}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidPath(segment) => write!(f, "invalid path segment {segment:?}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        Self::Validation(err)
    }
}

/// Sends requests with the page's session credentials.
pub trait HttpTransport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse, ApiError>>;
}

/// The signed-in member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub id: i64,
    pub name: String,
}

/// A stored sketch as listed by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SketchRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub external_libs: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl SketchRecord {
    /// Overlay the fields present in `update` (a JSON object from a write
    /// response) onto this record.
    pub fn merge(&mut self, update: &Value) -> Result<(), ApiError> {
        let Some(fields) = update.as_object() else {
            return Err(ApiError::Decode("expected a JSON object".into()));
        };
        let mut merged =
            serde_json::to_value(&*self).map_err(|err| ApiError::Decode(err.to_string()))?;
        if let Some(target) = merged.as_object_mut() {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        *self = serde_json::from_value(merged).map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(())
    }

    /// Name shown in selectors and notices.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.slug
        } else {
            &self.title
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Serialize)]
struct SourceBody<'a> {
    source_code: &'a str,
}

/// Result of [`SketchApi::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// A new record was created.
    Created { member: String, record: SketchRecord },
    /// An existing record was updated; `fields` is the response object.
    Updated { member: String, fields: Value },
}

/// Typed client over an [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct SketchApi<T> {
    transport: T,
    base: String,
}

impl<T: HttpTransport> SketchApi<T> {
    /// `base` is the API prefix, e.g. `/api`.
    pub fn new(transport: T, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_owned();
        Self { transport, base }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn current_member(&self) -> Result<Member, ApiError> {
        let path = format!("{}/members/me", self.base);
        self.json(Method::Get, path, None).await
    }

    pub async fn list_sketches(&self, member: &str) -> Result<Vec<SketchRecord>, ApiError> {
        let path = format!("{}/sketches/{}", self.base, segment(member)?);
        let list: Option<Vec<SketchRecord>> = self.json(Method::Get, path, None).await?;
        Ok(list.unwrap_or_default())
    }

    /// Sketches of `member`, resolving the signed-in member when `None`.
    pub async fn member_sketches(
        &self,
        member: Option<&str>,
    ) -> Result<(String, Vec<SketchRecord>), ApiError> {
        let member = match member {
            Some(name) => name.to_owned(),
            None => self.current_member().await?.name,
        };
        let sketches = self.list_sketches(&member).await?;
        Ok((member, sketches))
    }

    pub async fn create_sketch(
        &self,
        member: &str,
        source: &str,
    ) -> Result<SketchRecord, ApiError> {
        let path = format!("{}/sketches/{}/new", self.base, segment(member)?);
        let body = encode(&SourceBody {
            source_code: source,
        })?;
        self.json(Method::Post, path, Some(body)).await
    }

    /// Returns the response object for merging into the local record.
    pub async fn update_source(
        &self,
        member: &str,
        slug: &str,
        source: &str,
    ) -> Result<Value, ApiError> {
        let path = self.sketch_path(member, slug)?;
        let body = encode(&SourceBody {
            source_code: source,
        })?;
        self.json(Method::Put, path, Some(body)).await
    }

    /// Validates before sending; an invalid payload never reaches the server.
    pub async fn update_metadata(
        &self,
        member: &str,
        slug: &str,
        metadata: &SketchMetadata,
    ) -> Result<Value, ApiError> {
        metadata.validate()?;
        let path = self.sketch_path(member, slug)?;
        let body = encode(metadata)?;
        self.json(Method::Patch, path, Some(body)).await
    }

    pub async fn delete_sketch(&self, member: &str, slug: &str) -> Result<(), ApiError> {
        let path = self.sketch_path(member, slug)?;
        self.call(Method::Delete, path, None).await.map(|_| ())
    }

    /// Persist `source`: update when `slug` names an existing sketch, create
    /// otherwise. `member` is resolved through the API when unknown.
    pub async fn save(
        &self,
        member: Option<&str>,
        slug: Option<&str>,
        source: &str,
    ) -> Result<SaveOutcome, ApiError> {
        let member = match member {
            Some(name) => name.to_owned(),
            None => self.current_member().await?.name,
        };
        match slug.filter(|slug| !slug.is_empty()) {
            Some(slug) => {
                let fields = self.update_source(&member, slug, source).await?;
                Ok(SaveOutcome::Updated { member, fields })
            }
            None => {
                let record = self.create_sketch(&member, source).await?;
                Ok(SaveOutcome::Created { member, record })
            }
        }
    }

    fn sketch_path(&self, member: &str, slug: &str) -> Result<String, ApiError> {
        Ok(format!(
            "{}/sketches/{}/{}",
            self.base,
            segment(member)?,
            segment(slug)?
        ))
    }

    async fn call(
        &self,
        method: Method,
        path: String,
        body: Option<String>,
    ) -> Result<ApiResponse, ApiError> {
        tracing::debug!(method = method.as_str(), path = %path, "api request");
        let response = self.transport.send(ApiRequest { method, path, body }).await?;
        match response.status {
            401 => Err(ApiError::Unauthorized),
            _ if response.is_success() => Ok(response),
            status => {
                let err = ApiError::Status {
                    status,
                    body: response.body,
                };
                tracing::error!(method = method.as_str(), error = %err, "api request failed");
                Err(err)
            }
        }
    }

    async fn json<R: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        body: Option<String>,
    ) -> Result<R, ApiError> {
        let response = self.call(method, path, body).await?;
        serde_json::from_str(&response.body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

fn segment(value: &str) -> Result<&str, ApiError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value
            .chars()
            .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control());
    if valid {
        Ok(value)
    } else {
        Err(ApiError::InvalidPath(value.to_owned()))
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|err| ApiError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeTransport {
        sent: RefCell<Vec<ApiRequest>>,
        replies: RefCell<VecDeque<Result<ApiResponse, ApiError>>>,
    }

    impl FakeTransport {
        fn replying(replies: Vec<Result<ApiResponse, ApiError>>) -> Self {
            Self {
                sent: RefCell::default(),
                replies: RefCell::new(replies.into()),
            }
        }
    }

    impl HttpTransport for FakeTransport {
        fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse, ApiError>> {
            self.sent.borrow_mut().push(request);
            let reply = self
                .replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Network("no reply queued".into())));
            std::future::ready(reply)
        }
    }

    fn status(code: u16, body: &str) -> Result<ApiResponse, ApiError> {
        Ok(ApiResponse {
            status: code,
            body: body.into(),
        })
    }

    #[test]
    fn current_member_decodes() {
        let api = SketchApi::new(
            FakeTransport::replying(vec![Ok(ApiResponse::ok(r#"{"id":3,"name":"luis"}"#))]),
            "/api/",
        );
        let member = block_on(api.current_member()).unwrap();
        assert_eq!(member.name, "luis");
        assert_eq!(api.transport().sent.borrow()[0].path, "/api/members/me");
    }

    #[test]
    fn null_list_is_empty() {
        let api = SketchApi::new(
            FakeTransport::replying(vec![Ok(ApiResponse::ok("null"))]),
            "/api",
        );
        assert!(block_on(api.list_sketches("luis")).unwrap().is_empty());
    }

    #[test]
    fn list_tolerates_null_arrays() {
        let body = r#"[{
            "id": 1, "slug": "2024-05-01", "title": "Rain", "description": "",
            "keywords": "", "tags": null, "external_libs": null,
            "created_at": "", "updated_at": ""
        }]"#;
        let api = SketchApi::new(FakeTransport::replying(vec![Ok(ApiResponse::ok(body))]), "/api");
        let list = block_on(api.list_sketches("ana")).unwrap();
        assert_eq!(list[0].slug, "2024-05-01");
        assert!(list[0].tags.is_empty());
    }

    #[test]
    fn unauthorized_maps_to_variant() {
        let api = SketchApi::new(
            FakeTransport::replying(vec![status(401, r#"{"error":"Authentication required"}"#)]),
            "/api",
        );
        assert_eq!(block_on(api.current_member()), Err(ApiError::Unauthorized));
    }

    #[test]
    fn non_success_keeps_server_message() {
        let api = SketchApi::new(
            FakeTransport::replying(vec![status(
                403,
                r#"{"error":"You can only update your own sketches"}"#,
            )]),
            "/api",
        );
        let err = block_on(api.update_source("ana", "rain", "x")).unwrap_err();
        assert_eq!(
            err.server_message().as_deref(),
            Some("You can only update your own sketches")
        );
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn save_creates_without_slug() {
        let api = SketchApi::new(
            FakeTransport::replying(vec![
                Ok(ApiResponse::ok(r#"{"name":"ana"}"#)),
                Ok(ApiResponse::ok(r#"{"id":9,"slug":"2024-05-01","title":"2024-05-01"}"#)),
            ]),
            "/api",
        );
        let outcome = block_on(api.save(None, None, "draw();")).unwrap();
        let SaveOutcome::Created { member, record } = outcome else {
            panic!("expected create");
        };
        assert_eq!(member, "ana");
        assert_eq!(record.id, 9);
        let sent = api.transport().sent.borrow();
        assert_eq!(sent[1].method, Method::Post);
        assert_eq!(sent[1].path, "/api/sketches/ana/new");
        assert_eq!(sent[1].body.as_deref(), Some(r#"{"source_code":"draw();"}"#));
    }

    #[test]
    fn save_updates_with_slug() {
        let api = SketchApi::new(
            FakeTransport::replying(vec![Ok(ApiResponse::ok(r#"{"updated_at":"now"}"#))]),
            "/api",
        );
        let outcome = block_on(api.save(Some("ana"), Some("rain"), "x")).unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Updated {
                member: "ana".into(),
                fields: json!({"updated_at": "now"})
            }
        );
        assert_eq!(api.transport().sent.borrow()[0].method, Method::Put);
    }

    #[test]
    fn invalid_metadata_is_never_sent() {
        let api = SketchApi::new(FakeTransport::default(), "/api");
        let metadata = SketchMetadata::default();
        let err = block_on(api.update_metadata("ana", "rain", &metadata)).unwrap_err();
        assert_eq!(err, ApiError::Validation(MetadataError::TitleRequired));
        assert!(api.transport().sent.borrow().is_empty());
    }

    #[test]
    fn hostile_segments_are_rejected() {
        let api = SketchApi::new(FakeTransport::default(), "/api");
        let err = block_on(api.delete_sketch("ana", "../members")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidPath(_)));
        assert!(api.transport().sent.borrow().is_empty());
    }

    #[test]
    fn delete_sends_delete() {
        let api = SketchApi::new(FakeTransport::replying(vec![Ok(ApiResponse::ok(""))]), "/api");
        block_on(api.delete_sketch("ana", "rain")).unwrap();
        let sent = api.transport().sent.borrow();
        assert_eq!(sent[0].method, Method::Delete);
        assert_eq!(sent[0].path, "/api/sketches/ana/rain");
    }

    #[test]
    fn merge_overlays_present_fields() {
        let mut record = SketchRecord {
            slug: "rain".into(),
            title: "Rain".into(),
            tags: vec!["weather".into()],
            ..SketchRecord::default()
        };
        record
            .merge(&json!({"title": "Heavy rain", "updated_at": "2024-05-02"}))
            .unwrap();
        assert_eq!(record.title, "Heavy rain");
        assert_eq!(record.slug, "rain");
        assert_eq!(record.tags, vec!["weather".to_owned()]);
        assert!(record.merge(&json!([1, 2])).is_err());
    }

    #[test]
    fn display_title_falls_back_to_slug() {
        let record = SketchRecord {
            slug: "2024-05-01".into(),
            ..SketchRecord::default()
        };
        assert_eq!(record.display_title(), "2024-05-01");
    }
}
