//! Sequence clock constants.

/// Outer retry bound for a single `get_next_sequence` call.
///
/// Version conflicts do not count against this bound.
pub const DEFAULT_RETRY_COUNT: u32 = 10;

/// Base delay for linear backoff between outer attempts.
///
/// Attempt `n` sleeps `n * DEFAULT_RETRY_DELAY_MS`; attempt 0 does not sleep.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

/// Width of a counter payload: one big-endian `i64`.
pub const COUNTER_PAYLOAD_LEN: usize = 8;

/// Value stored in a freshly provisioned counter node.
///
/// The payload is "last value handed out", so the first increment yields 0.
pub const COUNTER_INITIAL_VALUE: i64 = -1;
