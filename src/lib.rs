//! Distributed sequence clock and queue lock over a ZooKeeper-style
//! coordination store.
//!
//! The building blocks live in the workspace crates and are re-exported here:
//!
//! - [`ordinal_store`] - store model, error classification, client traits
//! - [`ordinal_coordination`] - session manager, sequence clock, distributed lock
//! - [`ordinal_zookeeper`] - connector for a live ZooKeeper ensemble
//!
//! This crate adds layered configuration, tracing setup, and the
//! [`Coordinator`] context that wires a connector to both recipes.
//!
//! ```ignore
//! let config = OrdinalConfig::load_with_layers()?;
//! let coordinator = Coordinator::new(&config, connector);
//!
//! let id = coordinator.clock().get_next_sequence("orders").await?;
//! let lock = coordinator.lock("inventory").await?;
//! ```

pub mod config;
mod context;
pub mod telemetry;

pub use config::ConfigError;
pub use config::OrdinalConfig;
pub use context::Coordinator;
pub use ordinal_constants as constants;
pub use ordinal_coordination::AtomicSequencingMetrics;
pub use ordinal_coordination::CancellationToken;
pub use ordinal_coordination::Clock;
pub use ordinal_coordination::DistributedLock;
pub use ordinal_coordination::LockError;
pub use ordinal_coordination::LockGuard;
pub use ordinal_coordination::LockProvider;
pub use ordinal_coordination::MetricsSnapshot;
pub use ordinal_coordination::NoopMetrics;
pub use ordinal_coordination::RetryPolicy;
pub use ordinal_coordination::SequenceClock;
pub use ordinal_coordination::SequencingError;
pub use ordinal_coordination::SequencingMetrics;
pub use ordinal_coordination::SessionConfig;
pub use ordinal_coordination::SessionError;
pub use ordinal_coordination::SessionManager;
pub use ordinal_coordination::SessionState;
pub use ordinal_store::CoordinationStore;
pub use ordinal_store::SessionConnector;
pub use ordinal_store::StoreError;
pub use ordinal_zookeeper::ZooKeeperConnector;
