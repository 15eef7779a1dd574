//! Store error codes and their retry classification.

use snafu::Snafu;

/// Errors returned by a [`crate::CoordinationStore`].
///
/// A closed set: client libraries map their native result codes onto these
/// variants, and recipes decide what to do through [`classify`] rather than by
/// matching on individual codes.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// The connection to the ensemble dropped; the session may still be alive.
    #[snafu(display("connection to the ensemble was lost"))]
    ConnectionLoss,

    /// The ensemble expired the session; all its ephemeral nodes are gone.
    #[snafu(display("session expired"))]
    SessionExpired,

    /// The request did not complete within the client's operation timeout.
    #[snafu(display("operation timed out"))]
    OperationTimeout,

    /// The node does not exist.
    #[snafu(display("node '{path}' does not exist"))]
    NoNode {
        /// Requested path.
        path: String,
    },

    /// A node already exists at the requested path.
    #[snafu(display("node '{path}' already exists"))]
    NodeExists {
        /// Requested path.
        path: String,
    },

    /// A version-conditioned write lost a race.
    #[snafu(display("version conflict on '{path}': expected version {expected}"))]
    BadVersion {
        /// Requested path.
        path: String,
        /// Version the caller conditioned on.
        expected: i32,
    },

    /// Delete of a node that still has children.
    #[snafu(display("node '{path}' has children"))]
    NotEmpty {
        /// Requested path.
        path: String,
    },

    /// Ephemeral nodes cannot have children.
    #[snafu(display("ephemeral node '{path}' cannot have children"))]
    NoChildrenForEphemerals {
        /// Requested parent path.
        path: String,
    },

    /// The request itself was malformed.
    #[snafu(display("bad arguments: {reason}"))]
    BadArguments {
        /// What was wrong with the request.
        reason: String,
    },

    /// The caller stopped waiting for an in-flight request.
    ///
    /// The store may or may not have applied it.
    #[snafu(display("interrupted during {operation}; outcome unknown"))]
    Interrupted {
        /// The request that was in flight.
        operation: String,
    },

    /// Any other server or client failure.
    #[snafu(display("store error {code}: {message}"))]
    System {
        /// Native error code from the client library.
        code: i32,
        /// Human-readable description.
        message: String,
    },
}

/// How a retry loop should treat a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The session is gone; retrying on it cannot succeed.
    Fatal,
    /// Transport trouble; back off and retry.
    RetryableConnection,
    /// A concurrent writer won a compare-and-swap; retry immediately.
    RetryableConflict,
    /// Some other store failure; retry up to the bound.
    RetryableOther,
    /// The node is missing.
    NotFound,
}

impl FailureClass {
    /// Whether an outer retry loop may try again.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureClass::RetryableConnection | FailureClass::RetryableConflict | FailureClass::RetryableOther
        )
    }
}

/// Map a store error onto its retry class.
pub fn classify(error: &StoreError) -> FailureClass {
    match error {
        StoreError::SessionExpired => FailureClass::Fatal,
        StoreError::ConnectionLoss | StoreError::OperationTimeout => FailureClass::RetryableConnection,
        StoreError::BadVersion { .. } => FailureClass::RetryableConflict,
        StoreError::NoNode { .. } => FailureClass::NotFound,
        StoreError::NodeExists { .. }
        | StoreError::NotEmpty { .. }
        | StoreError::NoChildrenForEphemerals { .. }
        | StoreError::BadArguments { .. }
        | StoreError::Interrupted { .. }
        | StoreError::System { .. } => FailureClass::RetryableOther,
    }
}

impl StoreError {
    /// Shorthand for `classify(self)`.
    pub fn class(&self) -> FailureClass {
        classify(self)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn session_expiry_is_fatal() {
        assert_eq!(classify(&StoreError::SessionExpired), FailureClass::Fatal);
        assert!(!FailureClass::Fatal.is_retryable());
    }

    #[test]
    fn transport_failures_are_connection_class() {
        assert_eq!(classify(&StoreError::ConnectionLoss), FailureClass::RetryableConnection);
        assert_eq!(classify(&StoreError::OperationTimeout), FailureClass::RetryableConnection);
    }

    #[test]
    fn bad_version_is_conflict() {
        let err = StoreError::BadVersion {
            path: "/counter".to_string(),
            expected: 3,
        };
        assert_eq!(err.class(), FailureClass::RetryableConflict);
        assert_eq!(err.to_string(), "version conflict on '/counter': expected version 3");
    }

    #[test]
    fn missing_node_is_not_found() {
        let err = StoreError::NoNode {
            path: "/missing".to_string(),
        };
        assert_eq!(err.class(), FailureClass::NotFound);
        assert!(!err.class().is_retryable());
    }

    #[test]
    fn interrupted_display_mentions_unknown_outcome() {
        let err = StoreError::Interrupted {
            operation: "set_data".to_string(),
        };
        assert_eq!(err.to_string(), "interrupted during set_data; outcome unknown");
        assert_eq!(err.class(), FailureClass::RetryableOther);
    }

    proptest! {
        #[test]
        fn system_errors_are_always_retryable(code in any::<i32>(), message in ".{0,32}") {
            let err = StoreError::System { code, message };
            prop_assert_eq!(classify(&err), FailureClass::RetryableOther);
            prop_assert!(classify(&err).is_retryable());
        }
    }
}
