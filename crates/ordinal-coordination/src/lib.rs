//! Sequence clock and queue lock built on a ZooKeeper-style coordination store.
//!
//! - `SessionManager` - lazily connected, expiry-aware session shared by every recipe
//! - `SequenceClock` - duplicate-free, monotonically increasing integers per key
//! - `DistributedLock` - FIFO mutual exclusion with ephemeral sequential requests
//! - `LockProvider` - lock instances bound to the shared session
//!
//! The store itself is reached through [`ordinal_store::CoordinationStore`];
//! the only write primitive used is a version-checked single-node write and the
//! only synchronization primitive is node existence plus one-shot watches.
//!
//! ## Clock Example
//!
//! ```ignore
//! use ordinal_coordination::{Clock, SequenceClock, SessionConfig, SessionManager};
//!
//! let session = Arc::new(SessionManager::new(connector, SessionConfig::default()));
//! let clock = SequenceClock::new(session);
//!
//! let first = clock.get_next_sequence("orders").await?; // 0 on a fresh key
//! assert_eq!(clock.get_sequence("orders").await?, first);
//! ```
//!
//! ## Lock Example
//!
//! ```ignore
//! use ordinal_coordination::{CancellationToken, LockProvider};
//!
//! let lock = LockProvider::new(session).get_lock("inventory").await?;
//! let guard = lock.lock_interruptibly(&CancellationToken::new()).await?;
//!
//! // Protected critical section
//!
//! guard.release().await?;
//! ```

mod clock;
mod error;
mod lock;
mod metrics;
mod nodes;
mod retry;
mod session;

pub use clock::Clock;
pub use clock::SequenceClock;
pub use clock::decode_counter;
pub use clock::encode_counter;
pub use error::LockError;
pub use error::SequencingError;
pub use error::SessionError;
pub use lock::DistributedLock;
pub use lock::LockGuard;
pub use lock::LockProvider;
pub use metrics::AtomicSequencingMetrics;
pub use metrics::MetricsSnapshot;
pub use metrics::NoopMetrics;
pub use metrics::SequencingMetrics;
pub use nodes::key_path;
pub use retry::RetryPolicy;
pub use session::SessionConfig;
pub use session::SessionManager;
pub use session::SessionState;
pub use tokio_util::sync::CancellationToken;
