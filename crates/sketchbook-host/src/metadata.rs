#![forbid(unsafe_code)]

//! Sketch metadata validation.
//!
//! The same rules are enforced by the server; checking them here lets the
//! manager report problems before any request is made.

use core::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_KEYWORDS_LEN: usize = 200;
pub const MAX_TAGS: usize = 10;
pub const MAX_EXTERNAL_LIBS: usize = 5;

/// Metadata rule violation. Each variant has a stable [`code`](Self::code)
/// and a plain-language `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    TitleRequired,
    TitleTooLong,
    TitleInvalid,
    DescriptionTooLong,
    DescriptionInvalid,
    KeywordsTooLong,
    KeywordsInvalid,
    TooManyTags,
    TagInvalid(String),
    TooManyLibraries,
    LibraryEmpty,
    LibraryInvalidUrl(String),
    LibraryNotHttps(String),
}

impl MetadataError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TitleRequired => "title_required",
            Self::TitleTooLong => "title_too_long",
            Self::TitleInvalid => "title_invalid",
            Self::DescriptionTooLong => "description_too_long",
            Self::DescriptionInvalid => "description_invalid",
            Self::KeywordsTooLong => "keywords_too_long",
            Self::KeywordsInvalid => "keywords_invalid",
            Self::TooManyTags => "too_many_tags",
            Self::TagInvalid(_) => "tag_invalid",
            Self::TooManyLibraries => "too_many_libraries",
            Self::LibraryEmpty => "library_empty",
            Self::LibraryInvalidUrl(_) => "library_invalid_url",
            Self::LibraryNotHttps(_) => "library_not_https",
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TitleRequired => write!(f, "Title is required"),
            Self::TitleTooLong => {
                write!(f, "Title must be {MAX_TITLE_LEN} characters or less")
            }
            Self::TitleInvalid => write!(f, "Title contains invalid characters"),
            Self::DescriptionTooLong => {
                write!(f, "Description must be {MAX_DESCRIPTION_LEN} characters or less")
            }
            Self::DescriptionInvalid => write!(f, "Description contains invalid characters"),
            Self::KeywordsTooLong => {
                write!(f, "Keywords must be {MAX_KEYWORDS_LEN} characters or less")
            }
            Self::KeywordsInvalid => write!(f, "Keywords contains invalid characters"),
            Self::TooManyTags => write!(f, "Maximum {MAX_TAGS} tags allowed"),
            Self::TagInvalid(tag) => write!(
                f,
                "Tag \"{tag}\" contains invalid characters \
                 (only alphanumeric, hyphens, and underscores allowed)"
            ),
            Self::TooManyLibraries => {
                write!(f, "Maximum {MAX_EXTERNAL_LIBS} external libraries allowed")
            }
            Self::LibraryEmpty => write!(f, "External library URLs cannot be empty"),
            Self::LibraryInvalidUrl(url) => write!(f, "Invalid URL format: {url}"),
            Self::LibraryNotHttps(url) => {
                write!(f, "External library URLs must use HTTPS: {url}")
            }
        }
    }
}

impl std::error::Error for MetadataError {}

/// Validated metadata, the body of a `PATCH` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SketchMetadata {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub tags: Vec<String>,
    pub external_libs: Vec<String>,
}

impl SketchMetadata {
    /// Check every rule, reporting the first violation in field order.
    pub fn validate(&self) -> Result<(), MetadataError> {
        validate_title(&self.title)?;
        validate_description(&self.description)?;
        validate_keywords(&self.keywords)?;
        validate_tags(&self.tags)?;
        validate_external_libs(&self.external_libs)
    }
}

/// Raw metadata form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataDraft {
    pub title: String,
    pub description: String,
    pub keywords: String,
    /// Comma-separated tag list.
    pub tags: String,
    /// One entry per library input; blank inputs are ignored.
    pub external_libs: Vec<String>,
}

impl MetadataDraft {
    /// Trim and split the form fields, then validate.
    pub fn into_metadata(self) -> Result<SketchMetadata, MetadataError> {
        let metadata = SketchMetadata {
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            keywords: self.keywords.trim().to_owned(),
            tags: split_tags(&self.tags),
            external_libs: self
                .external_libs
                .iter()
                .map(|url| url.trim())
                .filter(|url| !url.is_empty())
                .map(str::to_owned)
                .collect(),
        };
        metadata.validate()?;
        Ok(metadata)
    }
}

/// Split a comma-separated tag string, dropping blanks.
#[must_use]
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

fn is_text_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_ascii_whitespace()
        || matches!(c, '-' | '_' | '.' | ',' | ':' | ';' | '!' | '?' | '(' | ')')
}

fn is_keyword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || matches!(c, ',' | '-' | '_')
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_')
}

fn validate_title(title: &str) -> Result<(), MetadataError> {
    if title.trim().is_empty() {
        return Err(MetadataError::TitleRequired);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(MetadataError::TitleTooLong);
    }
    if !title.chars().all(is_text_char) {
        return Err(MetadataError::TitleInvalid);
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), MetadataError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(MetadataError::DescriptionTooLong);
    }
    if !description.chars().all(is_text_char) {
        return Err(MetadataError::DescriptionInvalid);
    }
    Ok(())
}

fn validate_keywords(keywords: &str) -> Result<(), MetadataError> {
    if keywords.chars().count() > MAX_KEYWORDS_LEN {
        return Err(MetadataError::KeywordsTooLong);
    }
    if !keywords.chars().all(is_keyword_char) {
        return Err(MetadataError::KeywordsInvalid);
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), MetadataError> {
    if tags.len() > MAX_TAGS {
        return Err(MetadataError::TooManyTags);
    }
    for tag in tags {
        if tag.is_empty() || !tag.chars().all(is_tag_char) {
            return Err(MetadataError::TagInvalid(tag.clone()));
        }
    }
    Ok(())
}

fn validate_external_libs(libs: &[String]) -> Result<(), MetadataError> {
    if libs.len() > MAX_EXTERNAL_LIBS {
        return Err(MetadataError::TooManyLibraries);
    }
    for lib in libs {
        if lib.trim().is_empty() {
            return Err(MetadataError::LibraryEmpty);
        }
        let parsed =
            url::Url::parse(lib).map_err(|_| MetadataError::LibraryInvalidUrl(lib.clone()))?;
        if parsed.scheme() != "https" || !lib.starts_with("https://") {
            return Err(MetadataError::LibraryNotHttps(lib.clone()));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(MetadataError::LibraryInvalidUrl(lib.clone()));
        }
    }
    Ok(())
}
