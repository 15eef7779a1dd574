//! Lock recipe layout constants.

/// Child directory under a lock key holding the request queue.
pub const LOCK_DIR_NAME: &str = "lock";

/// Name prefix of each ephemeral sequential request node.
///
/// The store appends a zero-padded sequence number, e.g. `a0000000003`.
pub const REQUEST_NODE_PREFIX: &str = "a";
