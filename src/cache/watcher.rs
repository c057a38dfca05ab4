//! Bridges filesystem notifications into the async debounce loop.
//!
//! The notify callback runs on the backend's own thread and forwards a
//! [`ChangeEvent`] per relevant notification through an unbounded channel.
//! Sending never blocks, so the filesystem side can never stall on a busy
//! coordinator.
//!
//! Watches are tied to the directory inode, so the parent directory is
//! watched too. When the content directory is removed and created again,
//! [`ChangeWatcher::supervise`] registers the new directory before
//! forwarding the event.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use metrics::counter;
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::config::WatchMode;
use super::events::{ChangeEvent, ChangeKind};

const SOURCE: &str = "cache::watcher";

pub type ChangeStream = mpsc::UnboundedReceiver<ChangeEvent>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize filesystem watcher: {0}")]
    Init(#[source] notify::Error),
    #[error("failed to watch `{}`: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Keeps the platform watcher alive. Dropping it stops notifications and
/// closes the paired [`ChangeStream`].
pub struct ChangeWatcher {
    root: PathBuf,
    filter: EventFilter,
    inner: Box<dyn Watcher + Send>,
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher").field("root", &self.root).finish()
    }
}

impl ChangeWatcher {
    /// Begin watching `root` (non-recursively) for changes to payload files.
    pub fn start(
        root: &Path,
        extension: &str,
        mode: WatchMode,
    ) -> Result<(Self, ChangeStream), WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let filter = EventFilter::new(root, extension);
        let handler_filter = filter.clone();

        let handler = move |result: notify::Result<Event>| {
            let change = match result {
                Ok(event) => match handler_filter.translate(&event) {
                    Some(change) => change,
                    None => {
                        trace!(target = SOURCE, kind = ?event.kind, "Ignored filesystem event");
                        return;
                    }
                },
                Err(err) => {
                    warn!(target = SOURCE, error = %err, "Filesystem watcher reported an error");
                    ChangeEvent::rescan()
                }
            };

            counter!("folio_watcher_events_total", "kind" => change.kind.as_str()).increment(1);
            debug!(target = SOURCE, kind = change.kind.as_str(), paths = ?change.paths, "Content change observed");
            // The receiver is gone only during shutdown.
            let _ = tx.send(change);
        };

        let mut inner: Box<dyn Watcher + Send> = match mode {
            WatchMode::Native => Box::new(
                RecommendedWatcher::new(handler, Config::default()).map_err(WatchError::Init)?,
            ),
            WatchMode::Poll(interval) => Box::new(
                PollWatcher::new(handler, Config::default().with_poll_interval(interval))
                    .map_err(WatchError::Init)?,
            ),
        };

        inner
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: root.to_path_buf(),
                source,
            })?;

        if let Some(parent) = filter.parent() {
            if let Err(err) = inner.watch(parent, RecursiveMode::NonRecursive) {
                warn!(
                    target = SOURCE,
                    parent = %parent.display(),
                    error = %err,
                    "Cannot watch parent directory; a recreated content directory will go unnoticed"
                );
            }
        }

        info!(target = SOURCE, root = %root.display(), mode = ?mode, "Watching content directory");

        Ok((
            Self {
                root: root.to_path_buf(),
                filter,
                inner,
            },
            rx,
        ))
    }

    /// Move the watcher into a relay task that forwards `events` and
    /// re-registers the content directory whenever it reappears.
    ///
    /// The watcher lives until `cancel` fires; the returned stream closes
    /// with it.
    pub fn supervise(
        mut self,
        mut events: ChangeStream,
        cancel: CancellationToken,
    ) -> (JoinHandle<()>, ChangeStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            loop {
                let change = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    change = events.recv() => match change {
                        Some(change) => change,
                        None => break,
                    },
                };

                if self.filter.touches_root(&change) && self.root.is_dir() {
                    self.rewatch();
                }

                if tx.send(change).is_err() {
                    break;
                }
            }
            trace!(target = SOURCE, "Watcher relay stopped");
        });
        (handle, rx)
    }

    fn rewatch(&mut self) {
        // The stale registration points at the removed inode.
        let _ = self.inner.unwatch(&self.root);
        match self.inner.watch(&self.root, RecursiveMode::NonRecursive) {
            Ok(()) => info!(target = SOURCE, root = %self.root.display(), "Content directory watched again"),
            Err(err) => warn!(
                target = SOURCE,
                root = %self.root.display(),
                error = %err,
                "Failed to watch recreated content directory"
            ),
        }
    }
}

/// Decides which raw notifications matter to the content directory.
#[derive(Debug, Clone)]
struct EventFilter {
    roots: Vec<PathBuf>,
    extension: String,
}

impl EventFilter {
    fn new(root: &Path, extension: &str) -> Self {
        let mut roots = vec![root.to_path_buf()];
        match root.canonicalize() {
            Ok(canonical) if canonical.as_path() != root => roots.push(canonical),
            _ => {}
        }
        Self {
            roots,
            extension: extension.to_string(),
        }
    }

    fn translate(&self, event: &Event) -> Option<ChangeEvent> {
        if event.need_rescan() {
            return Some(ChangeEvent::new(ChangeKind::Rescan, event.paths.clone()));
        }

        let kind = classify(&event.kind)?;
        if !event.paths.is_empty() && !event.paths.iter().any(|path| self.is_relevant(path)) {
            return None;
        }

        Some(ChangeEvent::new(kind, event.paths.clone()))
    }

    fn is_relevant(&self, path: &Path) -> bool {
        if self.is_root(path) {
            return true;
        }
        path.parent().is_some_and(|parent| self.is_root(parent))
            && path.extension().and_then(OsStr::to_str) == Some(self.extension.as_str())
    }

    fn is_root(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| root == path)
    }

    /// The directory holding the content directory, as resolved on disk.
    fn parent(&self) -> Option<&Path> {
        self.roots.last().and_then(|root| root.parent())
    }

    /// Whether the content directory itself appeared or was replaced.
    fn touches_root(&self, change: &ChangeEvent) -> bool {
        change.kind != ChangeKind::Removed && change.paths.iter().any(|path| self.is_root(path))
    }
}

/// Map a notify event kind onto a change kind.
///
/// Reads and metadata-only updates are dropped: the loader's own reads must
/// never schedule another reload. Unknown kinds count as modifications.
fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(ChangeKind::Modified),
        EventKind::Access(_) => None,
        EventKind::Any | EventKind::Other => Some(ChangeKind::Modified),
    }
}
