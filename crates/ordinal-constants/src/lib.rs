//! Centralized constants for the ordinal coordination crates.
//!
//! Every default that a deployment can override through configuration lives
//! here, next to the fixed layout constants the clock and lock agree on.
//!
//! # Modules
//!
//! - [`session`]: Ensemble connection and session lifetimes
//! - [`clock`]: Sequence clock retry policy and counter encoding
//! - [`lock`]: Lock directory layout
//!
//! # Usage
//!
//! ```
//! use ordinal_constants::clock::DEFAULT_RETRY_COUNT;
//! use ordinal_constants::session::DEFAULT_CONNECTION_TIMEOUT_MS;
//!
//! assert_eq!(DEFAULT_RETRY_COUNT, 10);
//! assert_eq!(DEFAULT_CONNECTION_TIMEOUT_MS, 10_000);
//! ```

pub mod clock;
pub mod lock;
pub mod session;

pub use clock::DEFAULT_RETRY_COUNT;
pub use clock::DEFAULT_RETRY_DELAY_MS;
pub use session::DEFAULT_CONNECTION_TIMEOUT_MS;
pub use session::DEFAULT_SESSION_TIMEOUT_MS;
