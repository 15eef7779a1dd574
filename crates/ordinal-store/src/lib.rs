//! Client-side model of a ZooKeeper-style coordination store.
//!
//! This crate is the boundary between the coordination recipes and whatever
//! client library talks to the ensemble:
//!
//! - [`CoordinationStore`] - node operations on one live session
//! - [`SessionConnector`] - opens sessions and wires up the session watcher
//! - [`SessionWatcher`] - receives connected/expired notifications
//! - [`StoreError`] and [`classify`] - the closed error set and the retry
//!   classification every recipe uses
//!
//! Node payloads are raw bytes and every node carries a [`Stat`] whose
//! `version` is the compare-and-swap token for `set_data`.

mod error;
pub mod path;
mod traits;
mod types;

pub use error::FailureClass;
pub use error::StoreError;
pub use error::classify;
pub use traits::CoordinationStore;
pub use traits::SessionConnector;
pub use traits::SessionWatcher;
pub use types::Acl;
pub use types::CreateMode;
pub use types::EventType;
pub use types::KeeperState;
pub use types::Stat;
pub use types::Watch;
pub use types::WatchTrigger;
pub use types::WatchedEvent;
pub use types::watch_channel;
