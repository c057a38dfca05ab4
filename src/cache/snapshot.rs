//! Immutable, fully built views of the content directory.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::posts::{Post, presentation_order};
use crate::domain::slug::disambiguate_title;

/// A complete set of posts with its key index.
///
/// Snapshots are never mutated once built; a reload produces a new one.
#[derive(Debug, Default)]
pub struct Snapshot {
    posts: Vec<Arc<Post>>,
    by_key: HashMap<String, Arc<Post>>,
}

impl Snapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// All posts in presentation order.
    pub fn posts(&self) -> &[Arc<Post>] {
        &self.posts
    }

    /// The first `count` posts in presentation order.
    pub fn recent(&self, count: usize) -> &[Arc<Post>] {
        &self.posts[..count.min(self.posts.len())]
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Post>> {
        self.by_key.get(key)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Accumulates posts, resolving key collisions in insertion order.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    posts: Vec<Arc<Post>>,
    by_key: HashMap<String, Arc<Post>>,
}

impl SnapshotBuilder {
    /// Add a post. A post whose key is already taken is retitled with the
    /// collision marker until its key is free. Returns the key it was stored under.
    pub fn insert(&mut self, mut post: Post) -> String {
        if self.by_key.contains_key(post.key()) {
            let title = disambiguate_title(post.title(), |key| self.by_key.contains_key(key));
            post.retitle(title);
        }

        let key = post.key().to_string();
        let post = Arc::new(post);
        self.by_key.insert(key.clone(), Arc::clone(&post));
        self.posts.push(post);
        key
    }

    pub fn finish(mut self) -> Snapshot {
        self.posts.sort_by(|a, b| presentation_order(a, b));
        Snapshot {
            posts: self.posts,
            by_key: self.by_key,
        }
    }
}
