//! Posts as stored in the content directory.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Date, OffsetDateTime, format_description::FormatItem, macros::format_description};

use super::error::DraftError;
use super::slug::{derive_key, url_escape};

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");

pub fn format_human_date(date: Date) -> String {
    date.format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// A single post loaded from, or written to, the content directory.
///
/// Posts are written with PascalCase keys and RFC 3339 timestamps. `file_name`
/// and `key` are derived when the post is loaded and never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Post {
    #[serde(skip)]
    file_name: String,
    #[serde(with = "time::serde::rfc3339")]
    created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated: OffsetDateTime,
    title: String,
    summary: String,
    body: String,
    #[serde(skip)]
    key: String,
}

/// Stored payload as read back. Keys are matched case-insensitively and
/// every field is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
struct StoredPost {
    #[serde(default = "unix_epoch", with = "time::serde::rfc3339")]
    created: OffsetDateTime,
    #[serde(default = "unix_epoch", with = "time::serde::rfc3339")]
    updated: OffsetDateTime,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    body: String,
}

fn unix_epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// Lowercase the keys of a top-level object. When two keys fold to the same
/// name, the one that sorts last wins.
fn fold_keys(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

impl Post {
    pub fn new(title: impl Into<String>, created: OffsetDateTime) -> Self {
        let title = title.into();
        Self {
            file_name: String::new(),
            created,
            updated: created,
            key: derive_key(&title),
            title,
            summary: String::new(),
            body: String::new(),
        }
    }

    /// Decode a stored payload. `file_name` is the on-disk name of the entry.
    pub fn from_json(
        file_name: impl Into<String>,
        payload: &[u8],
    ) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(payload)?;
        let stored: StoredPost = serde_json::from_value(fold_keys(value))?;
        Ok(Self {
            file_name: file_name.into(),
            created: stored.created,
            updated: stored.updated,
            key: derive_key(&stored.title),
            title: stored.title,
            summary: stored.summary,
            body: stored.body,
        })
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_updated(mut self, updated: OffsetDateTime) -> Self {
        self.updated = updated;
        self
    }

    /// Replace the title and recompute the key.
    pub fn retitle(&mut self, title: String) {
        self.key = derive_key(&title);
        self.title = title;
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn created(&self) -> OffsetDateTime {
        self.created
    }

    pub fn updated(&self) -> OffsetDateTime {
        self.updated
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Raw HTML body, rendered verbatim.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the post detail page.
    pub fn url_path(&self) -> String {
        format!("/posts/{}", url_escape(&self.key))
    }
}

/// Presentation order: newest first, ties broken by file name ascending.
pub fn presentation_order(a: &Post, b: &Post) -> Ordering {
    b.created
        .cmp(&a.created)
        .then_with(|| a.file_name.cmp(&b.file_name))
}

/// Input for authoring a new post.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    pub summary: String,
    pub body: String,
    pub created: Option<OffsetDateTime>,
}

impl PostDraft {
    /// Validate the draft and stamp it with `now`.
    ///
    /// `created` falls back to `now` when absent; `updated` is always `now`.
    pub fn into_post(self, now: OffsetDateTime) -> Result<Post, DraftError> {
        if self.title.trim().is_empty() {
            return Err(DraftError::EmptyTitle);
        }

        let created = self.created.unwrap_or(now);
        Ok(Post::new(self.title, created)
            .with_summary(self.summary)
            .with_body(self.body)
            .with_updated(now))
    }
}
