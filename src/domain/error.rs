use thiserror::Error;

/// Why a draft cannot become a post.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    /// Untitled posts are only tolerated when loaded from disk; new ones need a title.
    #[error("post title must not be empty")]
    EmptyTitle,
}
