//! Infrastructure adapters: filesystem, HTTP, telemetry.

pub mod assets;
pub mod error;
pub mod http;
pub mod posts;
pub mod telemetry;
