//! Authoring side of the content directory.

use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::domain::error::DraftError;
use crate::domain::posts::PostDraft;

const SOURCE: &str = "infra::posts";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error("failed to encode post: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cannot write post file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to move post into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Writes new posts as `<created unix seconds>.<extension>`.
///
/// The payload is staged in a hidden temp file in the same directory and
/// renamed into place, so the watcher never observes a half-written post.
#[derive(Debug, Clone)]
pub struct PostWriter {
    root: PathBuf,
    extension: String,
}

impl PostWriter {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// Validate, stamp, and persist a draft. Returns the path written.
    pub fn save(&self, draft: PostDraft) -> Result<PathBuf, WriteError> {
        self.save_at(draft, OffsetDateTime::now_utc())
    }

    fn save_at(&self, draft: PostDraft, now: OffsetDateTime) -> Result<PathBuf, WriteError> {
        let post = draft.into_post(now)?;
        let payload = serde_json::to_vec_pretty(&post)?;

        let file_name = format!("{}.{}", post.created().unix_timestamp(), self.extension);
        let target = self.root.join(&file_name);

        let mut staged = tempfile::Builder::new()
            .prefix(".folio-")
            .suffix(".tmp")
            .tempfile_in(&self.root)?;
        staged.write_all(&payload)?;
        staged.as_file().sync_all()?;
        staged.persist_noclobber(&target)?;

        info!(
            target = SOURCE,
            path = %target.display(),
            key = post.key(),
            "Saved post"
        );
        Ok(target)
    }
}
