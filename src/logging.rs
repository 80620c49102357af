// src/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber: `RUST_LOG` if set, else `info`, with a
/// timing event whenever a stage span closes.
pub fn init() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
}

/// Subscriber for tests; output is captured per test. Safe to call repeatedly.
pub fn init_for_tests() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
