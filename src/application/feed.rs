use std::sync::Arc;

use time::format_description::well_known::Rfc3339;

use crate::cache::PostCache;
use crate::domain::posts::{Post, format_human_date};
use crate::presentation::views::{PostCard, PostDetailContext, PostListContext};

/// Builds page contexts from the currently published snapshot.
///
/// Each call reads one snapshot, so a page never mixes two generations.
pub struct FeedService {
    posts: Arc<PostCache>,
    recent: usize,
}

impl FeedService {
    pub fn new(posts: Arc<PostCache>, recent: usize) -> Self {
        Self { posts, recent }
    }

    /// The newest posts, for the home page.
    pub fn home(&self) -> PostListContext {
        let snapshot = self.posts.read();
        PostListContext {
            heading: "Recent posts".to_string(),
            posts: snapshot.recent(self.recent).iter().map(|post| card(post)).collect(),
            show_archive_link: snapshot.len() > self.recent,
        }
    }

    /// Every post, newest first.
    pub fn archive(&self) -> PostListContext {
        let snapshot = self.posts.read();
        PostListContext {
            heading: "All posts".to_string(),
            posts: snapshot.posts().iter().map(|post| card(post)).collect(),
            show_archive_link: false,
        }
    }

    pub fn post(&self, key: &str) -> Option<PostDetailContext> {
        let post = self.posts.get(key)?;
        let published = format_human_date(post.created().date());
        let updated = format_human_date(post.updated().date());

        Some(PostDetailContext {
            title: post.title().to_string(),
            summary: post.summary().to_string(),
            body_html: post.body().to_string(),
            iso_date: iso_date(&post),
            updated: if post.updated().date() > post.created().date() {
                updated
            } else {
                String::new()
            },
            published,
        })
    }
}

fn card(post: &Post) -> PostCard {
    PostCard {
        title: post.title().to_string(),
        href: post.url_path(),
        summary: post.summary().to_string(),
        published: format_human_date(post.created().date()),
        iso_date: iso_date(post),
    }
}

fn iso_date(post: &Post) -> String {
    post.created().format(&Rfc3339).unwrap_or_default()
}
