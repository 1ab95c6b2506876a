//! Diagnostic output for glint, routed through `tracing`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "debug,wgpu_core=info,wgpu_hal=info,naga=info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
///
/// Panics if a global subscriber is already set; use [`try_init`] where that
/// can happen (tests, embedding applications).
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(filter()).init();
}

/// Like [`init`], but returns `false` instead of panicking when a subscriber
/// already exists.
pub fn try_init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_test_writer()
        .try_init()
        .is_ok()
}
