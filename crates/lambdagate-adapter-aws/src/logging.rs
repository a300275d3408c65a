use std::sync::OnceLock;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::settings::{LogFormat, LoggingSettings};

static LOGGER_INSTALLED: OnceLock<bool> = OnceLock::new();

/// Install the process-wide `tracing` subscriber, once per process.
///
/// Output goes to stdout without timestamps since CloudWatch stamps every line on ingestion.
/// A subscriber the host installed first is kept, so this never fails startup. Returns whether
/// the adapter's own subscriber is the global default; later calls repeat the first answer.
pub fn init_logger(settings: &LoggingSettings) -> bool {
    *LOGGER_INSTALLED.get_or_init(|| install(settings))
}

fn install(settings: &LoggingSettings) -> bool {
    if tracing::dispatcher::has_been_set() {
        tracing::debug!("keeping the tracing subscriber installed by the host");
        return false;
    }

    let builder = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(settings.level))
        .with_target(false)
        .without_time()
        .with_span_events(FmtSpan::CLOSE);

    let result = match settings.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("keeping existing tracing subscriber: {}", err);
            false
        }
    }
}
