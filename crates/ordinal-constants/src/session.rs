//! Session constants for the coordination store connection.

// ============================================================================
// Timeouts
// ============================================================================

/// Session timeout negotiated with the ensemble (10 seconds).
///
/// Ephemeral nodes owned by a session survive a disconnect for at most this
/// long before the ensemble expires the session.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 10_000;

/// Maximum time a caller waits for the connected notification (10 seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Ensemble Address List
// ============================================================================

/// Ensemble used when no server list file is configured.
pub const DEFAULT_ENSEMBLE: &str = "localhost:2181";

/// Maximum size of a server list file (64 KB).
///
/// Only the first line is used; the bound keeps a misconfigured path from
/// pulling an arbitrary file into memory.
pub const MAX_SERVERS_FILE_SIZE: u64 = 64 * 1024;
