//! Client traits for the coordination store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::Acl;
use crate::types::CreateMode;
use crate::types::Stat;
use crate::types::Watch;
use crate::types::WatchedEvent;

/// Node operations on one live session.
///
/// Implementations are shared across tasks behind an `Arc`; every method
/// takes `&self`.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Identifier of the session backing this handle.
    fn session_id(&self) -> i64;

    /// Create a node and return its actual path.
    ///
    /// For sequential modes the returned path carries the store-assigned
    /// suffix. Fails with `NodeExists` when the path is taken and `NoNode`
    /// when the parent is missing.
    async fn create(&self, path: &str, data: &[u8], acl: Acl, mode: CreateMode) -> Result<String, StoreError>;

    /// Read a node's payload together with its stat.
    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat), StoreError>;

    /// Replace a node's payload.
    ///
    /// With `Some(version)` the write is accepted only if the node's current
    /// version matches, otherwise it fails with `BadVersion`.
    async fn set_data(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<Stat, StoreError>;

    /// Delete a node, optionally conditioned on its version.
    async fn delete(&self, path: &str, version: Option<i32>) -> Result<(), StoreError>;

    /// Check for a node without leaving a watch.
    async fn exists(&self, path: &str) -> Result<Option<Stat>, StoreError>;

    /// Check for a node and leave a one-shot watch on it.
    ///
    /// The watch fires on the next creation, deletion, or data change of the
    /// path, whether or not the node exists now.
    async fn exists_watch(&self, path: &str) -> Result<(Option<Stat>, Watch), StoreError>;

    /// Names of the direct children of a node, in no particular order.
    async fn get_children(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// End the session. Its ephemeral nodes are removed by the store.
    async fn close(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: CoordinationStore + ?Sized> CoordinationStore for Arc<T> {
    fn session_id(&self) -> i64 {
        (**self).session_id()
    }

    async fn create(&self, path: &str, data: &[u8], acl: Acl, mode: CreateMode) -> Result<String, StoreError> {
        (**self).create(path, data, acl, mode).await
    }

    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat), StoreError> {
        (**self).get_data(path).await
    }

    async fn set_data(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<Stat, StoreError> {
        (**self).set_data(path, data, version).await
    }

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<(), StoreError> {
        (**self).delete(path, version).await
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, StoreError> {
        (**self).exists(path).await
    }

    async fn exists_watch(&self, path: &str) -> Result<(Option<Stat>, Watch), StoreError> {
        (**self).exists_watch(path).await
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        (**self).get_children(path).await
    }

    async fn close(&self) -> Result<(), StoreError> {
        (**self).close().await
    }
}

/// Receives session-level notifications from the store's callback context.
///
/// Called with `EventType::None` events whose `keeper_state` reports the
/// session transition. Implementations must not block.
pub trait SessionWatcher: Send + Sync {
    fn process(&self, event: WatchedEvent);
}

/// Opens sessions against an ensemble.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Start a session.
    ///
    /// Returns as soon as the handle exists; the connected notification
    /// arrives later through `watcher`.
    async fn connect(
        &self,
        ensemble: &str,
        session_timeout: Duration,
        watcher: Arc<dyn SessionWatcher>,
    ) -> Result<Arc<dyn CoordinationStore>, StoreError>;
}
