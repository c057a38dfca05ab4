//! folio serves a blog from a directory of JSON post files.
//!
//! Posts are held in an in-memory [`cache::ContentCache`] that reloads the
//! directory whenever it changes, after a short quiet window.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
