//! [`CoordinationStore`] over a live `tokio-zookeeper` client.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
use ordinal_store::Acl;
use ordinal_store::CoordinationStore;
use ordinal_store::CreateMode;
use ordinal_store::EventType;
use ordinal_store::KeeperState;
use ordinal_store::SessionWatcher;
use ordinal_store::Stat;
use ordinal_store::StoreError;
use ordinal_store::Watch;
use ordinal_store::watch_channel;
use parking_lot::RwLock;
use tokio_zookeeper as zk;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::convert;

static NEXT_HANDLE: AtomicI64 = AtomicI64::new(1);

struct Shared {
    client: RwLock<Option<Arc<zk::ZooKeeper>>>,
    expired: AtomicBool,
}

/// One ZooKeeper session.
///
/// Once the session expires or is closed every operation fails with
/// [`StoreError::SessionExpired`]; open a new one through the connector.
pub struct ZooKeeperStore {
    handle: i64,
    shared: Arc<Shared>,
}

impl ZooKeeperStore {
    pub(crate) fn new(client: zk::ZooKeeper) -> Self {
        Self::with_client(Some(Arc::new(client)))
    }

    fn with_client(client: Option<Arc<zk::ZooKeeper>>) -> Self {
        Self {
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
            shared: Arc::new(Shared {
                client: RwLock::new(client),
                expired: AtomicBool::new(false),
            }),
        }
    }

    /// Forward the client's session notifications to `watcher` until the
    /// session expires or the client goes away.
    pub(crate) fn watch_session<S>(&self, events: S, watcher: Arc<dyn SessionWatcher>)
    where S: Stream<Item = zk::WatchedEvent> + Send + 'static {
        tokio::spawn(forward_session_events(events, Arc::downgrade(&self.shared), watcher));
    }

    fn client(&self) -> Result<Arc<zk::ZooKeeper>, StoreError> {
        self.shared.client.read().clone().ok_or(StoreError::SessionExpired)
    }

    /// Map a request that never got a result code.
    fn transport(&self, operation: &'static str, err: impl Debug) -> StoreError {
        let mapped = if self.shared.expired.load(Ordering::SeqCst) {
            StoreError::SessionExpired
        } else {
            StoreError::ConnectionLoss
        };
        debug!(operation, error = ?err, mapped = %mapped, "zookeeper request failed");
        mapped
    }
}

async fn forward_session_events<S>(events: S, shared: Weak<Shared>, watcher: Arc<dyn SessionWatcher>)
where S: Stream<Item = zk::WatchedEvent> + Send + 'static {
    let mut events = Box::pin(events);
    while let Some(raw) = events.next().await {
        let Some(event) = convert::event(raw) else {
            continue;
        };
        if event.event_type != EventType::None {
            continue;
        }
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if event.keeper_state == KeeperState::Expired {
            warn!("zookeeper session expired");
            shared.expired.store(true, Ordering::SeqCst);
            shared.client.write().take();
            watcher.process(event);
            break;
        }
        watcher.process(event);
    }
    debug!("session event stream ended");
}

#[async_trait]
impl CoordinationStore for ZooKeeperStore {
    /// Process-local handle id; the client does not expose the server-side
    /// session id.
    fn session_id(&self) -> i64 {
        self.handle
    }

    async fn create(&self, path: &str, data: &[u8], acl: Acl, mode: CreateMode) -> Result<String, StoreError> {
        let client = self.client()?;
        match client.create(path, data.to_vec(), convert::acl(acl), convert::create_mode(mode)).await {
            Ok(Ok(created)) => Ok(created),
            Ok(Err(err)) => Err(convert::create_error(err, path)),
            Err(err) => Err(self.transport("create", err)),
        }
    }

    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat), StoreError> {
        let client = self.client()?;
        match client.get_data(path).await {
            Ok(Some((data, stat))) => Ok((data, convert::stat(stat))),
            Ok(None) => Err(StoreError::NoNode { path: path.to_string() }),
            Err(err) => Err(self.transport("get_data", err)),
        }
    }

    async fn set_data(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<Stat, StoreError> {
        let client = self.client()?;
        match client.set_data(path, version, data.to_vec()).await {
            Ok(Ok(stat)) => Ok(convert::stat(stat)),
            Ok(Err(err)) => Err(convert::set_data_error(err, path)),
            Err(err) => Err(self.transport("set_data", err)),
        }
    }

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<(), StoreError> {
        let client = self.client()?;
        match client.delete(path, version).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(convert::delete_error(err, path)),
            Err(err) => Err(self.transport("delete", err)),
        }
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, StoreError> {
        let client = self.client()?;
        match client.exists(path).await {
            Ok(stat) => Ok(stat.map(convert::stat)),
            Err(err) => Err(self.transport("exists", err)),
        }
    }

    async fn exists_watch(&self, path: &str) -> Result<(Option<Stat>, Watch), StoreError> {
        let client = self.client()?;
        let (fired, stat) = match client.with_watcher().exists(path).await {
            Ok(found) => found,
            Err(err) => return Err(self.transport("exists_watch", err)),
        };
        let (trigger, watch) = watch_channel();
        tokio::spawn(async move {
            // A watch the client drops unfired leaves the trigger unfired too.
            if let Ok(raw) = fired.await {
                if let Some(event) = convert::event(raw) {
                    trigger.fire(event);
                }
            }
        });
        Ok((stat.map(convert::stat), watch))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let client = self.client()?;
        match client.get_children(path).await {
            Ok(Some(children)) => Ok(children),
            Ok(None) => Err(StoreError::NoNode { path: path.to_string() }),
            Err(err) => Err(self.transport("get_children", err)),
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.shared.client.write().take().is_some() {
            info!(handle = self.handle, "closed zookeeper session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_store_reports_expired_session() {
        let store = ZooKeeperStore::with_client(None);
        assert_eq!(store.get_data("/k").await, Err(StoreError::SessionExpired));
        assert_eq!(store.exists("/k").await, Err(StoreError::SessionExpired));
        assert_eq!(store.delete("/k", None).await, Err(StoreError::SessionExpired));
        assert!(store.close().await.is_ok());
    }

    #[test]
    fn transport_failures_follow_session_state() {
        let store = ZooKeeperStore::with_client(None);
        assert_eq!(store.transport("get_data", "io"), StoreError::ConnectionLoss);

        store.shared.expired.store(true, Ordering::SeqCst);
        assert_eq!(store.transport("get_data", "io"), StoreError::SessionExpired);
    }

    #[test]
    fn handles_are_distinct() {
        let first = ZooKeeperStore::with_client(None);
        let second = ZooKeeperStore::with_client(None);
        assert_ne!(first.session_id(), second.session_id());
    }
}
