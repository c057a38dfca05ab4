use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the process plumbing around the content cache.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server stopped: {0}")]
    Serve(#[source] std::io::Error),
    #[error("cannot read post body from `{}`: {source}", path.display())]
    ReadBody {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("log subscriber setup failed: {0}")]
    Telemetry(String),
}
