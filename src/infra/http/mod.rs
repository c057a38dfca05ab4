mod middleware;
mod public;
pub mod rate_limit;

pub use public::{HttpState, NOT_FOUND_PATH, build_router};
pub use rate_limit::RequestRateLimiter;
