//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Install a compact fmt subscriber filtered by `RUST_LOG`.
///
/// Panics if a global subscriber is already set; see [`try_init_tracing`].
pub fn init_tracing() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).with_target(false).compact().init();
}

/// Like [`init_tracing`], but returns `false` instead of panicking when a
/// subscriber is already installed. Output goes through the test harness
/// capture, so this is the entry point for tests.
pub fn try_init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init()
        .is_ok()
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
