//! Static files served from the assets directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tracing::{error, warn};

use crate::application::error::HttpError;

const SOURCE: &str = "infra::assets";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid asset path")]
    InvalidPath,
    #[error("asset not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read-only view of a directory of static files.
#[derive(Debug, Clone)]
pub struct AssetDirectory {
    root: PathBuf,
}

impl AssetDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read a file below the root. Directories and missing files are `NotFound`.
    ///
    /// Symlinks are followed only while their target stays inside the root.
    pub async fn read(&self, relative: &str) -> Result<Bytes, AssetError> {
        let requested = self.resolve(relative)?;
        let absolute = match fs::canonicalize(&requested).await {
            Ok(path) => path,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(AssetError::NotFound),
            Err(err) => return Err(err.into()),
        };
        let root = fs::canonicalize(&self.root).await?;
        if !absolute.starts_with(&root) {
            warn!(
                target = SOURCE,
                path = %relative,
                resolved = %absolute.display(),
                "Asset resolves outside the assets directory"
            );
            return Err(AssetError::InvalidPath);
        }

        let metadata = fs::metadata(&absolute).await?;
        if !metadata.is_file() {
            return Err(AssetError::NotFound);
        }

        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, AssetError> {
        let candidate = Path::new(relative.trim_start_matches('/'));
        if candidate.as_os_str().is_empty()
            || candidate
                .components()
                .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(AssetError::InvalidPath);
        }

        Ok(self.root.join(candidate))
    }

    /// Serve `relative` as an HTTP response.
    pub async fn respond(&self, relative: &str) -> Response {
        match self.read(relative).await {
            Ok(bytes) => asset_response(relative, bytes),
            Err(AssetError::InvalidPath | AssetError::NotFound) => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Asset not found",
                format!("asset `{relative}` is not available"),
            )
            .into_response(),
            Err(err) => {
                error!(target = SOURCE, path = %relative, error = %err, "failed to read asset");
                HttpError::from_error(
                    SOURCE,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to read asset",
                    &err,
                )
                .into_response()
            }
        }
    }
}

fn asset_response(path: &str, bytes: Bytes) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );

    response
}
