//! Explicit process context tying the recipes to one session.

use std::sync::Arc;

use ordinal_coordination::Clock;
use ordinal_coordination::DistributedLock;
use ordinal_coordination::LockError;
use ordinal_coordination::LockProvider;
use ordinal_coordination::NoopMetrics;
use ordinal_coordination::SequenceClock;
use ordinal_coordination::SequencingMetrics;
use ordinal_coordination::SessionManager;
use ordinal_coordination::SessionState;
use ordinal_store::SessionConnector;
use ordinal_zookeeper::ZooKeeperConnector;
use tracing::info;

use crate::config::OrdinalConfig;

/// Owns the shared session and the components built on it.
///
/// Construct one per process (or per test) and pass it, or the pieces it
/// hands out, to whatever needs sequencing or locking.
pub struct Coordinator {
    session: Arc<SessionManager>,
    clock: Arc<SequenceClock>,
    locks: LockProvider,
}

impl Coordinator {
    pub fn new(config: &OrdinalConfig, connector: Arc<dyn SessionConnector>) -> Self {
        Self::with_metrics(config, connector, Arc::new(NoopMetrics))
    }

    /// A coordinator backed by a live ZooKeeper ensemble.
    ///
    /// Nothing connects until the clock or a lock is first used.
    pub fn zookeeper(config: &OrdinalConfig) -> Self {
        Self::new(config, Arc::new(ZooKeeperConnector))
    }

    pub fn with_metrics(
        config: &OrdinalConfig,
        connector: Arc<dyn SessionConnector>,
        metrics: Arc<dyn SequencingMetrics>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(connector, config.session.to_session_config()));
        let clock = SequenceClock::new(session.clone())
            .with_retry(config.clock.retry_policy())
            .with_metrics(metrics);
        info!(
            retry_count = config.clock.retry_count,
            retry_delay_ms = config.clock.retry_delay_ms,
            "coordinator created"
        );
        Self {
            locks: LockProvider::new(session.clone()),
            clock: Arc::new(clock),
            session,
        }
    }

    /// The sequence clock; cheap to clone and share.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// A new lock instance for `key` on the current session.
    pub async fn lock(&self, key: &str) -> Result<DistributedLock, LockError> {
        self.locks.get_lock(key).await
    }

    pub fn lock_provider(&self) -> LockProvider {
        self.locks.clone()
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Drop the cached session and ensemble list; the next use reconnects.
    pub fn reset(&self) {
        self.session.reset();
    }
}

#[cfg(test)]
mod tests {
    use ordinal_testing::InMemoryEnsemble;

    use super::*;

    #[tokio::test]
    async fn clock_and_locks_share_one_session() {
        let ensemble = InMemoryEnsemble::new();
        let coordinator = Coordinator::new(&OrdinalConfig::default(), ensemble.connector());
        assert_eq!(coordinator.session_state(), SessionState::Disconnected);

        assert_eq!(coordinator.clock().get_next_sequence("orders").await.unwrap(), 0);
        let lock = coordinator.lock("orders").await.unwrap();
        let guard = lock.try_lock().await.unwrap().expect("free lock");
        assert_eq!(guard.request_path(), "/orders/lock/a0000000000");
        assert_eq!(ensemble.connect_count(), 1);
        assert_eq!(coordinator.session_state(), SessionState::Connected);
        guard.release().await.unwrap();

        coordinator.reset();
        assert_eq!(coordinator.session_state(), SessionState::Disconnected);
        assert_eq!(coordinator.clock().get_sequence("orders").await.unwrap(), 0);
        assert_eq!(ensemble.connect_count(), 2);
    }

    #[tokio::test]
    async fn zookeeper_coordinator_connects_lazily() {
        let mut config = OrdinalConfig::default();
        config.session.default_servers = "127.0.0.1:1".to_string();
        config.session.connection_timeout_ms = 500;
        let coordinator = Coordinator::zookeeper(&config);
        assert_eq!(coordinator.session_state(), SessionState::Disconnected);

        let err = coordinator.clock().get_next_sequence("orders").await.unwrap_err();
        assert!(matches!(err, ordinal_coordination::SequencingError::Session { .. }));
        assert_eq!(coordinator.session_state(), SessionState::Disconnected);
    }
}
