//! The published snapshot.
//!
//! Readers clone the current `Arc<Snapshot>` under a short read lock and then
//! work without any lock held. A publish swaps the pointer under the write
//! lock, so every reader observes either the old snapshot or the new one,
//! never a mixture.

use std::sync::{Arc, RwLock};

use metrics::gauge;
use tokio::sync::watch;
use tracing::debug;

use crate::domain::posts::Post;

use super::lock::{read_slot, write_slot};
use super::snapshot::Snapshot;

const SOURCE: &str = "cache::store";

pub struct PostCache {
    current: RwLock<Arc<Snapshot>>,
    generation: watch::Sender<u64>,
}

impl std::fmt::Debug for PostCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostCache")
            .field("generation", &self.generation())
            .field("posts", &self.read().len())
            .finish()
    }
}

impl PostCache {
    pub fn new(initial: Snapshot) -> Self {
        gauge!("folio_cache_posts").set(initial.len() as f64);
        let (generation, _) = watch::channel(0);
        Self {
            current: RwLock::new(Arc::new(initial)),
            generation,
        }
    }

    /// The currently published snapshot.
    pub fn read(&self) -> Arc<Snapshot> {
        Arc::clone(&read_slot(&self.current, "read"))
    }

    /// Replace the published snapshot and return the new generation.
    pub fn publish(&self, snapshot: Snapshot) -> u64 {
        let posts = snapshot.len();
        let next = Arc::new(snapshot);
        let previous = {
            let mut current = write_slot(&self.current, "publish");
            std::mem::replace(&mut *current, next)
        };
        drop(previous);

        self.generation.send_modify(|generation| *generation += 1);
        let generation = self.generation();
        gauge!("folio_cache_posts").set(posts as f64);
        debug!(target = SOURCE, generation, posts, "Published content snapshot");
        generation
    }

    /// Number of publishes since construction.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receiver that is notified after every publish.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Post>> {
        self.read().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use time::macros::datetime;

    use super::*;

    fn snapshot(prefix: &str, count: usize) -> Snapshot {
        let mut builder = Snapshot::builder();
        for index in 0..count {
            builder.insert(
                Post::new(format!("{prefix} {index}"), datetime!(2024-01-01 0:00 UTC))
                    .with_file_name(format!("{prefix}-{index:03}.json")),
            );
        }
        builder.finish()
    }

    #[test]
    fn publish_replaces_snapshot_and_bumps_generation() {
        let cache = PostCache::new(snapshot("old", 2));
        assert_eq!(cache.generation(), 0);
        assert!(cache.get("old-0").is_some());

        assert_eq!(cache.publish(snapshot("new", 3)), 1);
        assert_eq!(cache.generation(), 1);
        assert!(cache.get("old-0").is_none());
        assert_eq!(cache.read().len(), 3);
    }

    #[test]
    fn held_snapshot_survives_publish() {
        let cache = PostCache::new(snapshot("old", 2));
        let held = cache.read();

        cache.publish(Snapshot::default());

        assert_eq!(held.len(), 2);
        assert!(held.get("old-1").is_some());
        assert!(cache.read().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_each_publish() {
        let cache = PostCache::new(Snapshot::default());
        let mut changes = cache.subscribe();

        cache.publish(snapshot("a", 1));
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), 1);
    }

    #[test]
    fn concurrent_readers_never_see_a_mixed_snapshot() {
        let cache = Arc::new(PostCache::new(snapshot("alpha", 40)));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let current = cache.read();
                        let posts = current.posts();
                        assert_eq!(posts.len(), 40);

                        let prefix = posts[0].key().split('-').next().unwrap().to_string();
                        for post in posts {
                            assert!(post.key().starts_with(&prefix));
                            assert!(current.get(post.key()).is_some());
                        }
                    }
                })
            })
            .collect();

        for round in 0..200 {
            let prefix = if round % 2 == 0 { "beta" } else { "alpha" };
            cache.publish(snapshot(prefix, 40));
        }

        for reader in readers {
            reader.join().expect("reader panicked");
        }
        assert_eq!(cache.generation(), 200);
    }
}
