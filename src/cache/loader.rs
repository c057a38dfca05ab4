//! Reads the content directory into a [`Snapshot`].

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::posts::Post;

use super::config::CacheConfig;
use super::snapshot::Snapshot;

const SOURCE: &str = "cache::loader";

/// The directory itself could not be enumerated. Nothing is published.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read content directory `{}`: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single entry was left out of a snapshot.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("failed to read file: {0}")]
    Read(#[source] io::Error),
    #[error("failed to decode post payload: {0}")]
    Parse(#[source] serde_json::Error),
}

#[derive(Debug)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// A built snapshot plus the entries that did not make it in.
#[derive(Debug)]
pub struct LoadOutcome {
    pub snapshot: Snapshot,
    pub skipped: Vec<SkippedEntry>,
}

/// Anything that can produce a complete snapshot on demand.
///
/// Implementations are invoked from a blocking thread and may take arbitrarily long.
pub trait SnapshotSource: Send + Sync + 'static {
    fn load(&self) -> Result<LoadOutcome, LoadError>;
}

/// Loads every payload file directly under one directory.
#[derive(Debug, Clone)]
pub struct StoreLoader {
    root: PathBuf,
    extension: String,
}

impl StoreLoader {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.posts_dir.clone(), config.extension.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_payload(&self, path: &Path) -> bool {
        path.extension().and_then(OsStr::to_str) == Some(self.extension.as_str())
    }

    /// Build a snapshot from the directory's current contents.
    ///
    /// Entries are visited in file name order so key collisions resolve the
    /// same way on every load. Unreadable or malformed files are skipped and
    /// reported in [`LoadOutcome::skipped`].
    pub fn load(&self) -> Result<LoadOutcome, LoadError> {
        let read_dir_error = |source| LoadError::ReadDir {
            path: self.root.clone(),
            source,
        };

        let mut candidates = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(read_dir_error)? {
            let entry = entry.map_err(read_dir_error)?;
            if entry.file_type().is_ok_and(|kind| kind.is_dir()) {
                continue;
            }
            let path = entry.path();
            if self.is_payload(&path) {
                candidates.push((entry.file_name().to_string_lossy().into_owned(), path));
            }
        }
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let mut builder = Snapshot::builder();
        let mut skipped = Vec::new();
        for (file_name, path) in candidates {
            let payload = match fs::read(&path) {
                Ok(payload) => payload,
                Err(err) => {
                    skipped.push(SkippedEntry {
                        path,
                        reason: SkipReason::Read(err),
                    });
                    continue;
                }
            };

            match Post::from_json(file_name, &payload) {
                Ok(post) => {
                    let key = builder.insert(post);
                    debug!(target = SOURCE, path = %path.display(), key = %key, "Loaded post");
                }
                Err(err) => skipped.push(SkippedEntry {
                    path,
                    reason: SkipReason::Parse(err),
                }),
            }
        }

        Ok(LoadOutcome {
            snapshot: builder.finish(),
            skipped,
        })
    }
}

impl SnapshotSource for StoreLoader {
    fn load(&self) -> Result<LoadOutcome, LoadError> {
        StoreLoader::load(self)
    }
}

/// Log skipped entries and record load metrics. Load errors are reported by the caller.
pub fn record_load(result: Result<&LoadOutcome, &LoadError>, elapsed: Duration) {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    match result {
        Ok(outcome) => {
            for entry in &outcome.skipped {
                warn!(
                    target = SOURCE,
                    path = %entry.path.display(),
                    error = %entry.reason,
                    "Skipped content file"
                );
            }
            counter!("folio_cache_skipped_files_total").increment(outcome.skipped.len() as u64);
            histogram!("folio_cache_load_ms", "result" => "ok").record(elapsed_ms);
            info!(
                target = SOURCE,
                posts = outcome.snapshot.len(),
                skipped = outcome.skipped.len(),
                elapsed_ms,
                "Loaded content snapshot"
            );
        }
        Err(_) => {
            histogram!("folio_cache_load_ms", "result" => "error").record(elapsed_ms);
        }
    }
}
