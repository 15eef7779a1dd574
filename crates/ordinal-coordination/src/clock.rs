//! Distributed monotonic sequence clock.
//!
//! Each key owns one persistent counter node whose payload is the last value
//! handed out, as an 8-byte big-endian integer. An increment reads the
//! payload and its version, adds one, and writes back conditioned on that
//! version, so concurrent writers are linearized by the store.
//!
//! # Guarantees
//!
//! 1. **Uniqueness**: no two successful increments of a key return the same value
//! 2. **Monotonicity**: each committed value is greater than every earlier one
//! 3. **Gap tolerance**: a write interrupted after it committed is assumed lost, so a
//!    value may be skipped but never reused

use std::sync::Arc;

use async_trait::async_trait;
use ordinal_constants::clock::COUNTER_INITIAL_VALUE;
use ordinal_constants::clock::COUNTER_PAYLOAD_LEN;
use ordinal_store::CoordinationStore;
use ordinal_store::FailureClass;
use ordinal_store::StoreError;
use snafu::ResultExt;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::error::SequencingError;
use crate::error::SessionSnafu;
use crate::metrics::NoopMetrics;
use crate::metrics::SequencingMetrics;
use crate::nodes;
use crate::retry::RetryPolicy;
use crate::session::SessionManager;

/// Source of per-key sequence numbers.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Advance the sequence for `key` and return the new value.
    ///
    /// The first call for a key returns 0.
    async fn get_next_sequence(&self, key: &str) -> Result<i64, SequencingError>;

    /// Last value handed out for `key`, without advancing it.
    ///
    /// Fails with [`SequencingError::NoSuchSequence`] for a key that has never
    /// been advanced.
    async fn get_sequence(&self, key: &str) -> Result<i64, SequencingError>;
}

#[async_trait]
impl<T: Clock + ?Sized> Clock for Arc<T> {
    async fn get_next_sequence(&self, key: &str) -> Result<i64, SequencingError> {
        (**self).get_next_sequence(key).await
    }

    async fn get_sequence(&self, key: &str) -> Result<i64, SequencingError> {
        (**self).get_sequence(key).await
    }
}

/// Encode a counter value as a node payload.
pub fn encode_counter(value: i64) -> [u8; COUNTER_PAYLOAD_LEN] {
    value.to_be_bytes()
}

/// Decode a node payload; `None` unless it is exactly eight bytes.
pub fn decode_counter(payload: &[u8]) -> Option<i64> {
    let bytes: [u8; COUNTER_PAYLOAD_LEN] = payload.try_into().ok()?;
    Some(i64::from_be_bytes(bytes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Advance,
    Read,
}

/// Why one attempt failed.
enum StepFailure {
    Store(StoreError),
    Corrupted { len: usize },
    Exhausted,
    Missing,
}

impl From<StoreError> for StepFailure {
    fn from(err: StoreError) -> Self {
        StepFailure::Store(err)
    }
}

/// [`Clock`] backed by counter nodes in the coordination store.
pub struct SequenceClock {
    session: Arc<SessionManager>,
    metrics: Arc<dyn SequencingMetrics>,
    retry: RetryPolicy,
}

impl SequenceClock {
    /// Create a clock with the default retry policy and no metrics.
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            metrics: Arc::new(NoopMetrics),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn SequencingMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn run(&self, key: &str, operation: Operation) -> Result<i64, SequencingError> {
        let Some(node) = nodes::key_path(key) else {
            return Err(SequencingError::InvalidKey { key: key.to_string() });
        };
        let store = self.session.get().await.context(SessionSnafu { key })?;

        let mut attempt = 0u32;
        loop {
            let result = match operation {
                Operation::Advance => self.advance(store.as_ref(), key, &node).await,
                Operation::Read => read_counter(store.as_ref(), &node).await,
            };
            let cause = match result {
                Ok(value) => return Ok(value),
                Err(StepFailure::Store(err)) => err,
                Err(StepFailure::Corrupted { len }) => {
                    return Err(SequencingError::CorruptedPayload { key: key.to_string(), len });
                }
                Err(StepFailure::Exhausted) => {
                    return Err(SequencingError::SequenceExhausted { key: key.to_string() });
                }
                Err(StepFailure::Missing) => {
                    return Err(SequencingError::NoSuchSequence { key: key.to_string() });
                }
            };

            let class = cause.class();
            match class {
                FailureClass::Fatal => {
                    self.metrics.on_session_expired();
                    warn!(key = %key, attempt, "session expired, giving up");
                    self.session.invalidate(&store);
                    return Err(SequencingError::SessionExpired {
                        key: key.to_string(),
                        source: cause,
                    });
                }
                FailureClass::RetryableConnection => {
                    self.metrics.on_connection_loss();
                    debug!(key = %key, attempt, error = %cause, "connection lost");
                }
                _ => {
                    self.metrics.on_store_error();
                    error!(key = %key, attempt, error = %cause, "unexpected store error");
                }
            }

            if !self.retry.has_next(attempt) {
                return Err(SequencingError::RetriesExhausted {
                    key: key.to_string(),
                    attempts: attempt + 1,
                    source: cause,
                });
            }
            if class == FailureClass::RetryableConnection {
                self.retry.backoff(attempt).await;
            }
            attempt += 1;
        }
    }

    /// One read-increment-write cycle, repeated on version conflicts and
    /// interrupted writes without consuming an outer attempt.
    async fn advance(&self, store: &dyn CoordinationStore, key: &str, node: &str) -> Result<i64, StepFailure> {
        loop {
            let (payload, stat) = match store.get_data(node).await {
                Ok(found) => found,
                Err(StoreError::NoNode { .. }) => {
                    self.provision(store, key, node).await?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            // Empty payloads belong to nodes provisioned as parents or lock keys.
            let current = if payload.is_empty() {
                COUNTER_INITIAL_VALUE
            } else {
                decode_counter(&payload).ok_or(StepFailure::Corrupted { len: payload.len() })?
            };
            let next = current.checked_add(1).ok_or(StepFailure::Exhausted)?;

            match store.set_data(node, &encode_counter(next), Some(stat.version)).await {
                Ok(_) => {
                    debug!(key = %key, value = next, "advanced sequence");
                    return Ok(next);
                }
                Err(StoreError::BadVersion { .. }) => {
                    self.metrics.on_key_collision();
                    debug!(key = %key, version = stat.version, "key collision, re-reading");
                }
                Err(StoreError::Interrupted { .. }) => {
                    self.metrics.on_interrupted();
                    warn!(key = %key, value = next, "write interrupted, assuming not committed");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn provision(&self, store: &dyn CoordinationStore, key: &str, node: &str) -> Result<(), StepFailure> {
        match nodes::create_with_parents(store, node, &encode_counter(COUNTER_INITIAL_VALUE)).await {
            Ok(true) => {
                self.metrics.on_key_created();
                info!(key = %key, path = node, "created sequence node");
                Ok(())
            }
            Ok(false) => {
                debug!(key = %key, "sequence node created concurrently");
                Ok(())
            }
            Err(StoreError::Interrupted { .. }) => {
                self.metrics.on_interrupted();
                warn!(key = %key, "interrupted creating sequence node, re-reading");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

async fn read_counter(store: &dyn CoordinationStore, node: &str) -> Result<i64, StepFailure> {
    let payload = match store.get_data(node).await {
        Ok((payload, _)) => payload,
        Err(StoreError::NoNode { .. }) => return Err(StepFailure::Missing),
        Err(err) => return Err(err.into()),
    };
    if payload.is_empty() {
        return Err(StepFailure::Missing);
    }
    decode_counter(&payload).ok_or(StepFailure::Corrupted { len: payload.len() })
}

#[async_trait]
impl Clock for SequenceClock {
    async fn get_next_sequence(&self, key: &str) -> Result<i64, SequencingError> {
        self.run(key, Operation::Advance).await
    }

    async fn get_sequence(&self, key: &str) -> Result<i64, SequencingError> {
        self.run(key, Operation::Read).await
    }
}
