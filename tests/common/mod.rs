//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ordinal::AtomicSequencingMetrics;
use ordinal::Coordinator;
use ordinal::OrdinalConfig;
use ordinal_testing::InMemoryEnsemble;

/// Config with short timeouts and retry delays.
pub fn fast_config(retry_count: u32) -> OrdinalConfig {
    let mut config = OrdinalConfig::default();
    config.session.connection_timeout_ms = 200;
    config.clock.retry_count = retry_count;
    config.clock.retry_delay_ms = 1;
    config
}

/// A fresh ensemble and a coordinator connected to it through counting metrics.
pub fn coordinator(retry_count: u32) -> (InMemoryEnsemble, Coordinator, Arc<AtomicSequencingMetrics>) {
    ordinal::telemetry::try_init_tracing();
    let ensemble = InMemoryEnsemble::new();
    let metrics = Arc::new(AtomicSequencingMetrics::new());
    let coordinator = Coordinator::with_metrics(&fast_config(retry_count), ensemble.connector(), metrics.clone());
    (ensemble, coordinator, metrics)
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
