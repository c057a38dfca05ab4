//! Content cache configuration.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POSTS_DIR: &str = "posts";
const DEFAULT_EXTENSION: &str = "json";
const DEFAULT_DEBOUNCE_MS: u64 = 100;
const DEFAULT_RECENT_POSTS: usize = 5;

/// How the change watcher observes the content directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Platform notification backend (inotify, FSEvents, ...).
    Native,
    /// Periodic directory scans, for filesystems without notifications.
    Poll(Duration),
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding one payload file per post.
    pub posts_dir: PathBuf,
    /// File extension (without the dot) that marks a payload file.
    pub extension: String,
    /// Quiet window that must elapse after the last change before reloading.
    pub debounce: Duration,
    /// Number of posts returned by the "recent" view.
    pub recent_posts: usize,
    pub watch_mode: WatchMode,
}

impl CacheConfig {
    pub fn new(posts_dir: impl Into<PathBuf>) -> Self {
        Self {
            posts_dir: posts_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_watch_mode(mut self, watch_mode: WatchMode) -> Self {
        self.watch_mode = watch_mode;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            posts_dir: PathBuf::from(DEFAULT_POSTS_DIR),
            extension: DEFAULT_EXTENSION.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            recent_posts: DEFAULT_RECENT_POSTS,
            watch_mode: WatchMode::Native,
        }
    }
}

impl From<&crate::config::Settings> for CacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        let content = &settings.content;
        Self {
            posts_dir: content.posts_dir.clone(),
            extension: content.extension.clone(),
            debounce: content.debounce,
            recent_posts: settings.site.recent_posts.get(),
            watch_mode: content
                .poll_interval
                .map_or(WatchMode::Native, WatchMode::Poll),
        }
    }
}
