//! Change notifications emitted by the watcher.

use std::path::PathBuf;

/// What the filesystem reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    Renamed,
    /// The backend lost track of changes (overflow, error); contents are unknown.
    Rescan,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Renamed => "renamed",
            Self::Rescan => "rescan",
        }
    }
}

/// A signal that the content directory may have changed.
///
/// Events carry no payload the coordinator depends on; every event simply
/// restarts the quiet window.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub paths: Vec<PathBuf>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, paths: Vec<PathBuf>) -> Self {
        Self { kind, paths }
    }

    pub fn rescan() -> Self {
        Self::new(ChangeKind::Rescan, Vec::new())
    }
}
