use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::Telemetry(err.to_string())
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_histogram!(
            "folio_cache_load_ms",
            Unit::Milliseconds,
            "Time spent reading the content directory into a snapshot."
        );
        describe_counter!(
            "folio_cache_reload_total",
            Unit::Count,
            "Debounced reloads, labelled by result."
        );
        describe_counter!(
            "folio_cache_skipped_files_total",
            Unit::Count,
            "Content files left out of a snapshot because they could not be read or decoded."
        );
        describe_gauge!(
            "folio_cache_posts",
            Unit::Count,
            "Number of posts in the published snapshot."
        );
        describe_counter!(
            "folio_watcher_events_total",
            Unit::Count,
            "Filesystem change events forwarded to the debounce coordinator."
        );
        describe_counter!(
            "folio_http_throttled_total",
            Unit::Count,
            "Requests rejected by the per-client rate limiter."
        );
    });
}
