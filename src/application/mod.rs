//! Application services between the cache and the HTTP surface.

pub mod error;
pub mod feed;
