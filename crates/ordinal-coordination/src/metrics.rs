//! Metrics sink for the sequence clock.
//!
//! The clock reports events through [`SequencingMetrics`]; exporting them is
//! left to whatever owns the sink.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Hooks invoked by the clock at each notable event.
///
/// Every hook defaults to a no-op so sinks implement only what they export.
pub trait SequencingMetrics: Send + Sync {
    /// A compare-and-swap lost to a concurrent writer.
    fn on_key_collision(&self) {}
    /// A counter node was provisioned.
    fn on_key_created(&self) {}
    /// The session expired mid-operation.
    fn on_session_expired(&self) {}
    /// The connection dropped mid-operation.
    fn on_connection_loss(&self) {}
    /// An in-flight request was abandoned with an unknown outcome.
    fn on_interrupted(&self) {}
    /// Any other store failure.
    fn on_store_error(&self) {}
}

/// Sink that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl SequencingMetrics for NoopMetrics {}

/// Point-in-time counter values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub key_collisions: u64,
    pub key_creations: u64,
    pub session_expired_events: u64,
    pub connection_loss_events: u64,
    pub interrupted_events: u64,
    pub store_errors: u64,
}

/// Counter-backed sink.
///
/// `take_*` getters return the count since the previous take, so a poller
/// sees per-interval rates. Connection losses and session expiries also
/// count as store errors.
#[derive(Debug, Default)]
pub struct AtomicSequencingMetrics {
    key_collisions: AtomicU64,
    key_creations: AtomicU64,
    session_expired_events: AtomicU64,
    connection_loss_events: AtomicU64,
    interrupted_events: AtomicU64,
    store_errors: AtomicU64,
}

impl AtomicSequencingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current values, without resetting.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            key_collisions: self.key_collisions.load(Ordering::Relaxed),
            key_creations: self.key_creations.load(Ordering::Relaxed),
            session_expired_events: self.session_expired_events.load(Ordering::Relaxed),
            connection_loss_events: self.connection_loss_events.load(Ordering::Relaxed),
            interrupted_events: self.interrupted_events.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }

    /// Current values, resetting every counter to zero.
    pub fn take_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            key_collisions: self.take_key_collisions(),
            key_creations: self.take_key_creations(),
            session_expired_events: self.take_session_expired_events(),
            connection_loss_events: self.take_connection_loss_events(),
            interrupted_events: self.take_interrupted_events(),
            store_errors: self.take_store_errors(),
        }
    }

    pub fn take_key_collisions(&self) -> u64 {
        self.key_collisions.swap(0, Ordering::Relaxed)
    }

    pub fn take_key_creations(&self) -> u64 {
        self.key_creations.swap(0, Ordering::Relaxed)
    }

    pub fn take_session_expired_events(&self) -> u64 {
        self.session_expired_events.swap(0, Ordering::Relaxed)
    }

    pub fn take_connection_loss_events(&self) -> u64 {
        self.connection_loss_events.swap(0, Ordering::Relaxed)
    }

    pub fn take_interrupted_events(&self) -> u64 {
        self.interrupted_events.swap(0, Ordering::Relaxed)
    }

    pub fn take_store_errors(&self) -> u64 {
        self.store_errors.swap(0, Ordering::Relaxed)
    }
}

impl SequencingMetrics for AtomicSequencingMetrics {
    fn on_key_collision(&self) {
        self.key_collisions.fetch_add(1, Ordering::Relaxed);
    }

    fn on_key_created(&self) {
        self.key_creations.fetch_add(1, Ordering::Relaxed);
    }

    fn on_session_expired(&self) {
        self.session_expired_events.fetch_add(1, Ordering::Relaxed);
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn on_connection_loss(&self) {
        self.connection_loss_events.fetch_add(1, Ordering::Relaxed);
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn on_interrupted(&self) {
        self.interrupted_events.fetch_add(1, Ordering::Relaxed);
    }

    fn on_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }
}
