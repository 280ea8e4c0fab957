//! Tracing bootstrap for the daemon.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,pushover_desktop=debug";

/// Initialize the global tracing subscriber.
///
/// Filter precedence: `RUST_LOG`, then `PUSHOVER_LOG`, then a default
/// that keeps this crate at debug and everything else at info.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(filter_from_env())
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if let Some(filter) = env::var("PUSHOVER_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
    {
        return filter;
    }

    EnvFilter::new(DEFAULT_FILTER)
}
