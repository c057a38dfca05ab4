//! In-memory content cache backed by a watched directory.
//!
//! - [`StoreLoader`] reads every payload file into an immutable [`Snapshot`].
//! - [`ChangeWatcher`] forwards filesystem notifications as [`ChangeEvent`]s.
//! - [`DebounceCoordinator`] collapses bursts of events into serialized reloads.
//! - [`PostCache`] publishes each new snapshot with a single pointer swap.
//!
//! [`ContentCache`] wires these together for the server.

mod config;
mod debounce;
mod events;
mod loader;
mod lock;
mod snapshot;
mod store;
mod watcher;

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::posts::Post;

pub use config::{CacheConfig, WatchMode};
pub use debounce::{DebounceCoordinator, DebounceState};
pub use events::{ChangeEvent, ChangeKind};
pub use loader::{LoadError, LoadOutcome, SkipReason, SkippedEntry, SnapshotSource, StoreLoader};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use store::PostCache;
pub use watcher::{ChangeStream, ChangeWatcher, WatchError};

pub use loader::record_load;

const SOURCE: &str = "cache";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("initial content load failed: {0}")]
    InitialLoad(#[from] LoadError),
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// A running cache: the published snapshot plus the background reload task.
#[derive(Debug)]
pub struct ContentCache {
    config: CacheConfig,
    store: Arc<PostCache>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    relay: JoinHandle<()>,
}

impl ContentCache {
    /// Watch the content directory, load it once, and start reloading on change.
    ///
    /// The watcher is registered before the initial load so no change made
    /// during startup is missed. A failed initial load is fatal. Must be
    /// called from within a Tokio runtime.
    pub fn start(config: CacheConfig) -> Result<Self, CacheError> {
        let (watcher, events) =
            ChangeWatcher::start(&config.posts_dir, &config.extension, config.watch_mode)?;

        let loader = Arc::new(StoreLoader::from_config(&config));
        let started = Instant::now();
        let outcome = loader.load();
        record_load(outcome.as_ref(), started.elapsed());
        let outcome = outcome?;

        let store = Arc::new(PostCache::new(outcome.snapshot));
        let cancel = CancellationToken::new();
        let (relay, events) = watcher.supervise(events, cancel.clone());
        let task = DebounceCoordinator::new(
            loader,
            Arc::clone(&store),
            config.debounce,
            events,
            cancel.clone(),
        )
        .spawn();

        info!(
            target = SOURCE,
            posts_dir = %config.posts_dir.display(),
            posts = store.read().len(),
            "Content cache ready"
        );

        Ok(Self {
            config,
            store,
            cancel,
            task,
            relay,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PostCache> {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.read()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Post>> {
        self.store.get(key)
    }

    /// Stop the reload task and release the watcher.
    ///
    /// The watcher is owned by the relay task and dropped when it exits.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            warn!(target = SOURCE, error = %err, "Debounce coordinator ended abnormally");
        }
        if let Err(err) = self.relay.await {
            warn!(target = SOURCE, error = %err, "Watcher relay ended abnormally");
        }
        info!(target = SOURCE, "Content cache stopped");
    }
}
