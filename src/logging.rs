use std::env;

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG: &str = "FINCENT_LOG";
pub const ENV_LOG_FORMAT: &str = "FINCENT_LOG_FORMAT";
pub const DEFAULT_FILTER: &str = "fincent=info";

/// Filter directive and the variable it came from (`None` for the default).
pub fn resolve_filter() -> (String, Option<&'static str>) {
    if let Some(value) = env::var("RUST_LOG").ok().filter(|v| !v.trim().is_empty()) {
        return (value, Some("RUST_LOG"));
    }
    if let Some(value) = env::var(ENV_LOG).ok().filter(|v| !v.trim().is_empty()) {
        return (value, Some(ENV_LOG));
    }
    (DEFAULT_FILTER.to_string(), None)
}

/// Installs the global subscriber, writing to stderr. Safe to call more than
/// once; later calls are ignored.
pub fn init_logging() {
    let (filter, source) = resolve_filter();
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = env::var(ENV_LOG_FORMAT)
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let installed = if json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    };
    if installed.is_ok() {
        tracing::debug!(
            target: "fincent",
            event = "logging_initialised",
            filter_source = source.unwrap_or("default"),
            json
        );
    }
}
