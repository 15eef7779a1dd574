//! Apache ZooKeeper backend for the coordination store traits.
//!
//! [`ZooKeeperConnector`] opens sessions with `tokio-zookeeper` and hands out
//! [`ZooKeeperStore`] handles. The client's result codes are folded into
//! [`ordinal_store::StoreError`] so that the recipes classify them the same
//! way they classify any other store, and its default-watcher stream is
//! forwarded to the session watcher.
//!
//! ```ignore
//! let coordinator = Coordinator::new(&config, Arc::new(ZooKeeperConnector::new()));
//! ```

mod connector;
mod convert;
mod store;

pub use connector::ZooKeeperConnector;
pub use connector::parse_ensemble;
pub use store::ZooKeeperStore;
