//! Media reference normalization.
//!
//! `media_urls` has been stored in two shapes over time: a list of plain URL
//! strings, and a list of `{url, type}` objects. Everything past this module
//! sees only [`MediaReference`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static VIDEO_EXTENSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\.(mp4|webm|mov|m4v|ogv|ogg|avi|mkv|3gp)$").ok());

/// Kind of attached media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Guess the kind from a URL, looking at the path extension only.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if VIDEO_EXTENSION
            .as_ref()
            .is_some_and(|re| re.is_match(path))
        {
            Self::Video
        } else {
            Self::Image
        }
    }

    /// Kind for an uploaded file's MIME type.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video/") {
            Self::Video
        } else {
            Self::Image
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "image" | "photo" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Canonical media attachment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaReference {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

impl MediaReference {
    /// Build a reference, inferring the kind from the URL.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = MediaKind::from_url(&url);
        Self { url, kind }
    }
}

/// Normalize a stored `media_urls` value.
///
/// Entries that are neither a non-empty string nor an object with a non-empty
/// `url` are dropped. Anything that is not an array yields no media.
#[must_use]
pub fn normalize_media(value: &Value) -> Vec<MediaReference> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(url) if !url.trim().is_empty() => Some(MediaReference::from_url(url.trim())),
            Value::Object(obj) => {
                let url = obj.get("url").and_then(Value::as_str)?.trim();
                if url.is_empty() {
                    return None;
                }
                let kind = obj
                    .get("type")
                    .or_else(|| obj.get("kind"))
                    .and_then(Value::as_str)
                    .and_then(MediaKind::parse)
                    .unwrap_or_else(|| MediaKind::from_url(url));
                Some(MediaReference {
                    url: url.to_string(),
                    kind,
                })
            }
            _ => None,
        })
        .collect()
}

/// Serialize references in the canonical object shape for storage.
#[must_use]
pub fn media_to_value(media: &[MediaReference]) -> Value {
    serde_json::to_value(media).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// URLs of every reference, in order.
#[must_use]
pub fn media_urls(media: &[MediaReference]) -> Vec<String> {
    media.iter().map(|m| m.url.clone()).collect()
}
