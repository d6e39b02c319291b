//! Tracing setup for structured logging.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Used when neither `RUST_LOG` nor the given filter parses.
pub const DEFAULT_FILTER: &str = "info,rskafka=warn,hyper=warn";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, one line per event
    #[default]
    Pretty,
    /// JSON lines with file, line and thread id
    Json,
}

/// Installs the global subscriber.
///
/// A second call is a no-op: the first installed subscriber stays.
pub fn init_tracing(filter: &str, format: LogFormat, span_events: bool) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let spans = if span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(spans)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_span_events(spans).with_target(true))
            .try_init(),
    };

    if installed.is_ok() {
        tracing::info!(filter = %filter, format = ?format, "Tracing initialized");
    }
}

/// Installs the global subscriber from `RUST_LOG`, `LOG_JSON` and `LOG_SPANS`.
pub fn init_tracing_from_env() {
    let (filter, format, span_events) = settings_from(|name| std::env::var(name).ok());
    init_tracing(&filter, format, span_events);
}

fn settings_from(var: impl Fn(&str) -> Option<String>) -> (String, LogFormat, bool) {
    let flag = |name: &str| {
        var(name).is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    };

    let filter = var("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string());
    let format = if flag("LOG_JSON") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    (filter, format, flag("LOG_SPANS"))
}
