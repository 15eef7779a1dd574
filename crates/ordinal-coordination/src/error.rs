//! Error types for the coordination recipes.

use std::path::PathBuf;

use ordinal_store::StoreError;
use snafu::Snafu;

/// Failures establishing a session with the ensemble.
///
/// None of these are retried by the session manager; callers decide.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SessionError {
    /// The configured server list file could not be read.
    #[snafu(display("failed to read server list from {}: {source}", path.display()))]
    ServerList {
        /// Configured file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The server list file is larger than any sane ensemble list.
    #[snafu(display("server list {} is {size} bytes (max {max})", path.display()))]
    ServerListTooLarge {
        /// Configured file.
        path: PathBuf,
        /// Actual file size.
        size: u64,
        /// Allowed maximum.
        max: u64,
    },

    /// The server list resolved to an empty string.
    #[snafu(display("server list from {origin} is empty"))]
    EmptyServerList {
        /// Where the list came from.
        origin: String,
    },

    /// The client library refused to start a session.
    #[snafu(display("unable to create session for ensemble '{ensemble}': {source}"))]
    Connect {
        /// Ensemble address list.
        ensemble: String,
        /// Underlying store failure.
        source: StoreError,
    },

    /// No connected notification arrived in time.
    #[snafu(display("connection to ensemble '{ensemble}' timed out after {timeout_ms}ms"))]
    ConnectionTimeout {
        /// Ensemble address list.
        ensemble: String,
        /// Configured connection timeout.
        timeout_ms: u64,
    },

    /// The watcher reported the new session expired before it connected.
    #[snafu(display("session for ensemble '{ensemble}' expired while connecting"))]
    ExpiredWhileConnecting {
        /// Ensemble address list.
        ensemble: String,
    },
}

/// Errors from the sequence clock.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SequencingError {
    /// The key cannot be mapped onto a store path.
    #[snafu(display("invalid sequence key '{key}'"))]
    InvalidKey {
        /// Offending key.
        key: String,
    },

    /// No session could be obtained.
    #[snafu(display("no session available for sequence '{key}': {source}"))]
    Session {
        /// Sequence key.
        key: String,
        /// Why the session could not be established.
        source: SessionError,
    },

    /// The session expired mid-operation; not retried.
    #[snafu(display("session expired while sequencing '{key}': {source}"))]
    SessionExpired {
        /// Sequence key.
        key: String,
        /// The fatal store error.
        source: StoreError,
    },

    /// Every attempt failed with a retryable error.
    #[snafu(display("failed to obtain sequence for '{key}' after {attempts} attempts: {source}"))]
    RetriesExhausted {
        /// Sequence key.
        key: String,
        /// Attempts made.
        attempts: u32,
        /// The most recent failure.
        source: StoreError,
    },

    /// Read of a sequence that has never been incremented.
    #[snafu(display("no such sequence '{key}'"))]
    NoSuchSequence {
        /// Sequence key.
        key: String,
    },

    /// The counter node holds something other than an 8-byte integer.
    #[snafu(display("corrupted counter payload for '{key}': {len} bytes"))]
    CorruptedPayload {
        /// Sequence key.
        key: String,
        /// Payload length found.
        len: usize,
    },

    /// The counter reached `i64::MAX`.
    #[snafu(display("sequence exhausted for '{key}'"))]
    SequenceExhausted {
        /// Sequence key.
        key: String,
    },
}

impl SequencingError {
    /// Whether this is a lookup of a sequence that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SequencingError::NoSuchSequence { .. })
    }
}

/// Errors from the distributed lock.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LockError {
    /// The key cannot be mapped onto a store path.
    #[snafu(display("invalid lock key '{key}'"))]
    InvalidLockKey {
        /// Offending key.
        key: String,
    },

    /// This instance already has a request outstanding; locks are not reentrant.
    #[snafu(display("lock already has request active for {key} : {request}"))]
    AlreadyLocked {
        /// Lock key.
        key: String,
        /// Outstanding request node name.
        request: String,
    },

    /// The operation is deliberately not provided.
    #[snafu(display("{operation} is not supported, use {alternative} instead"))]
    Unsupported {
        /// Rejected operation.
        operation: &'static str,
        /// What to call instead.
        alternative: &'static str,
    },

    /// Cancelled while waiting; the request node is left in place.
    #[snafu(display("interrupted while waiting for lock {key} with request {request}"))]
    Interrupted {
        /// Lock key.
        key: String,
        /// Request node left behind.
        request: String,
    },

    /// The request node disappeared while queued, usually with its session.
    #[snafu(display("lock request {request} for {key} vanished while queued"))]
    RequestLost {
        /// Lock key.
        key: String,
        /// Missing request node name.
        request: String,
    },

    /// A store operation failed.
    #[snafu(display("store error on lock {key}: {source}"))]
    LockStore {
        /// Lock key.
        key: String,
        /// Underlying failure.
        source: StoreError,
    },

    /// No session could be obtained.
    #[snafu(display("no session available for lock {key}: {source}"))]
    LockSession {
        /// Lock key.
        key: String,
        /// Why the session could not be established.
        source: SessionError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_locked_display() {
        let err = LockError::AlreadyLocked {
            key: "/k".to_string(),
            request: "a0000000000".to_string(),
        };
        assert_eq!(err.to_string(), "lock already has request active for /k : a0000000000");
    }

    #[test]
    fn unsupported_display_names_alternative() {
        let err = LockError::Unsupported {
            operation: "lock",
            alternative: "lock_interruptibly",
        };
        assert_eq!(err.to_string(), "lock is not supported, use lock_interruptibly instead");
    }

    #[test]
    fn retries_exhausted_carries_last_cause() {
        let err = SequencingError::RetriesExhausted {
            key: "/k".to_string(),
            attempts: 10,
            source: StoreError::ConnectionLoss,
        };
        assert_eq!(
            err.to_string(),
            "failed to obtain sequence for '/k' after 10 attempts: connection to the ensemble was lost"
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_not_found());
    }

    #[test]
    fn no_such_sequence_is_not_found() {
        let err = SequencingError::NoSuchSequence { key: "/k".to_string() };
        assert!(err.is_not_found());
    }
}
