//! Queue-ordered distributed lock.
//!
//! Each acquisition creates an ephemeral sequential request node under
//! `<key>/lock`. The request with the lowest store-assigned suffix holds the
//! lock; every other waiter watches only its immediate predecessor, so a
//! release wakes exactly one waiter and grants are FIFO by request creation.
//!
//! Requests are tied to the session that created them. When that session
//! ends the store removes the request, which releases the lock or drops the
//! waiter from the queue.

use std::sync::Arc;
use std::time::Duration;

use ordinal_constants::lock::LOCK_DIR_NAME;
use ordinal_constants::lock::REQUEST_NODE_PREFIX;
use ordinal_store::Acl;
use ordinal_store::CoordinationStore;
use ordinal_store::CreateMode;
use ordinal_store::StoreError;
use ordinal_store::path;
use parking_lot::Mutex;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::error::LockError;
use crate::error::LockSessionSnafu;
use crate::nodes;
use crate::session::SessionManager;

/// Where this instance stands in its own acquisition cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Idle,
    Creating,
    Outstanding(String),
}

/// Position of a request among its siblings.
enum Position {
    Lowest,
    Behind(String),
    Missing,
}

struct LockShared {
    store: Arc<dyn CoordinationStore>,
    key: String,
    dir: String,
    slot: Mutex<Slot>,
}

impl LockShared {
    fn request_path(&self, request: &str) -> String {
        path::join(&self.dir, request)
    }

    /// Delete a request node, treating an already-missing node as deleted.
    async fn delete_request(&self, request: &str) -> Result<(), StoreError> {
        match self.store.delete(&self.request_path(request), None).await {
            Ok(()) | Err(StoreError::NoNode { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Clear the slot if it still refers to `request`.
    fn clear_if(&self, request: &str) -> bool {
        let mut slot = self.slot.lock();
        if matches!(&*slot, Slot::Outstanding(current) if current == request) {
            *slot = Slot::Idle;
            true
        } else {
            false
        }
    }
}

/// Mutual exclusion for one key.
///
/// Not reentrant: starting an acquisition while this instance already has a
/// request outstanding fails with [`LockError::AlreadyLocked`]. One instance
/// must not be driven from several tasks at once; create one per contender.
pub struct DistributedLock {
    shared: Arc<LockShared>,
}

impl DistributedLock {
    /// Create a lock for `key` on an existing store handle.
    pub fn new(store: Arc<dyn CoordinationStore>, key: &str) -> Result<Self, LockError> {
        let Some(node) = nodes::key_path(key) else {
            return Err(LockError::InvalidLockKey { key: key.to_string() });
        };
        Ok(Self {
            shared: Arc::new(LockShared {
                store,
                key: key.to_string(),
                dir: path::join(&node, LOCK_DIR_NAME),
                slot: Mutex::new(Slot::Idle),
            }),
        })
    }

    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// Directory holding the request nodes.
    pub fn lock_dir(&self) -> &str {
        &self.shared.dir
    }

    /// Name of this instance's outstanding request node, if any.
    pub fn outstanding_request(&self) -> Option<String> {
        match &*self.shared.slot.lock() {
            Slot::Outstanding(request) => Some(request.clone()),
            _ => None,
        }
    }

    /// Not provided: waiting without a way to cancel is not offered.
    pub async fn lock(&self) -> Result<LockGuard, LockError> {
        Err(LockError::Unsupported {
            operation: "lock",
            alternative: "lock_interruptibly",
        })
    }

    /// Not provided: bounded waits are built from [`Self::lock_interruptibly`]
    /// and a cancellation token.
    pub async fn try_lock_timeout(&self, _timeout: Duration) -> Result<Option<LockGuard>, LockError> {
        Err(LockError::Unsupported {
            operation: "try_lock_timeout",
            alternative: "lock_interruptibly",
        })
    }

    /// Block until the lock is held or `cancel` fires.
    ///
    /// On cancellation the request node is left in place and stays
    /// outstanding; [`Self::unlock`] or the end of the session removes it.
    /// Store failures remove the request before being returned.
    pub async fn lock_interruptibly(&self, cancel: &CancellationToken) -> Result<LockGuard, LockError> {
        let request = self.begin_request().await?;

        loop {
            let position = match self.position(&request).await {
                Ok(position) => position,
                Err(err) => return Err(self.abort(&request, err).await),
            };
            let predecessor = match position {
                Position::Lowest => return Ok(self.granted(request)),
                Position::Missing => {
                    self.shared.clear_if(&request);
                    warn!(key = %self.shared.key, request = %request, "lock request vanished while queued");
                    return Err(LockError::RequestLost {
                        key: self.shared.key.clone(),
                        request,
                    });
                }
                Position::Behind(predecessor) => predecessor,
            };

            let predecessor_path = self.shared.request_path(&predecessor);
            let (stat, watch) = match self.shared.store.exists_watch(&predecessor_path).await {
                Ok(found) => found,
                Err(err) => return Err(self.abort(&request, err).await),
            };
            if stat.is_none() {
                debug!(key = %self.shared.key, predecessor = %predecessor, "predecessor already gone");
                continue;
            }

            debug!(key = %self.shared.key, request = %request, predecessor = %predecessor, "waiting for predecessor");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(key = %self.shared.key, request = %request, "interrupted while waiting for lock");
                    return Err(LockError::Interrupted {
                        key: self.shared.key.clone(),
                        request,
                    });
                }
                _ = watch.fired() => {}
            }
        }
    }

    /// Acquire the lock only if it is free right now.
    ///
    /// Returns `Ok(None)` when another request is ahead, and also when a
    /// store failure prevents the attempt; in both cases this instance's
    /// request is removed.
    pub async fn try_lock(&self) -> Result<Option<LockGuard>, LockError> {
        let request = match self.begin_request().await {
            Ok(request) => request,
            Err(LockError::LockStore { source, .. }) => {
                error!(key = %self.shared.key, error = %source, "failed to create lock request");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match self.position(&request).await {
            Ok(Position::Lowest) => Ok(Some(self.granted(request))),
            Ok(Position::Behind(predecessor)) => {
                debug!(key = %self.shared.key, predecessor = %predecessor, "lock is held, withdrawing request");
                self.withdraw(&request).await;
                Ok(None)
            }
            Ok(Position::Missing) => {
                self.shared.clear_if(&request);
                Ok(None)
            }
            Err(err) => {
                error!(key = %self.shared.key, error = %err, "failed to check lock order");
                self.withdraw(&request).await;
                Ok(None)
            }
        }
    }

    /// Remove this instance's outstanding request, releasing the lock if held.
    ///
    /// A no-op when nothing is outstanding.
    pub async fn unlock(&self) -> Result<(), LockError> {
        let Some(request) = self.outstanding_request() else {
            return Ok(());
        };
        self.shared.delete_request(&request).await.map_err(|source| LockError::LockStore {
            key: self.shared.key.clone(),
            source,
        })?;
        self.shared.clear_if(&request);
        info!(key = %self.shared.key, request = %request, "unlocked");
        Ok(())
    }

    /// Reserve the slot, make sure the lock directory exists, and create
    /// this instance's request node.
    async fn begin_request(&self) -> Result<String, LockError> {
        {
            let mut slot = self.shared.slot.lock();
            match &*slot {
                Slot::Idle => *slot = Slot::Creating,
                Slot::Creating => {
                    return Err(LockError::AlreadyLocked {
                        key: self.shared.key.clone(),
                        request: "<pending>".to_string(),
                    });
                }
                Slot::Outstanding(request) => {
                    return Err(LockError::AlreadyLocked {
                        key: self.shared.key.clone(),
                        request: request.clone(),
                    });
                }
            }
        }

        match self.create_request().await {
            Ok(request) => {
                *self.shared.slot.lock() = Slot::Outstanding(request.clone());
                debug!(key = %self.shared.key, request = %request, "created lock request");
                Ok(request)
            }
            Err(source) => {
                *self.shared.slot.lock() = Slot::Idle;
                Err(LockError::LockStore {
                    key: self.shared.key.clone(),
                    source,
                })
            }
        }
    }

    async fn create_request(&self) -> Result<String, StoreError> {
        let store = self.shared.store.as_ref();
        if store.exists(&self.shared.dir).await?.is_none() {
            nodes::create_with_parents(store, &self.shared.dir, &[]).await?;
        }
        let prefix = path::join(&self.shared.dir, REQUEST_NODE_PREFIX);
        let created = store.create(&prefix, &[], Acl::OpenUnsafe, CreateMode::EphemeralSequential).await?;
        Ok(path::basename(&created).to_string())
    }

    /// Sibling order as seen right now.
    async fn position(&self, request: &str) -> Result<Position, StoreError> {
        let children = self.shared.store.get_children(&self.shared.dir).await?;
        let mut queue: Vec<(u64, String)> = children
            .into_iter()
            .filter(|name| name.starts_with(REQUEST_NODE_PREFIX))
            .filter_map(|name| path::sequence_suffix(&name).map(|seq| (seq, name)))
            .collect();
        queue.sort_unstable();

        let Some(index) = queue.iter().position(|(_, name)| name == request) else {
            return Ok(Position::Missing);
        };
        if index == 0 {
            Ok(Position::Lowest)
        } else {
            Ok(Position::Behind(queue[index - 1].1.clone()))
        }
    }

    fn granted(&self, request: String) -> LockGuard {
        info!(key = %self.shared.key, request = %request, "lock acquired");
        LockGuard {
            shared: self.shared.clone(),
            request,
            released: false,
        }
    }

    /// Best-effort removal of a request that will not be pursued.
    async fn withdraw(&self, request: &str) {
        if let Err(err) = self.shared.delete_request(request).await {
            error!(key = %self.shared.key, request = %request, error = %err, "failed to remove lock request");
        }
        self.shared.clear_if(request);
    }

    async fn abort(&self, request: &str, source: StoreError) -> LockError {
        self.withdraw(request).await;
        LockError::LockStore {
            key: self.shared.key.clone(),
            source,
        }
    }
}

/// Proof that the lock is held.
///
/// Releasing consumes the guard. Dropping it without calling
/// [`LockGuard::release`] spawns a best-effort release on the current runtime.
pub struct LockGuard {
    shared: Arc<LockShared>,
    request: String,
    released: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// Full path of the request node that holds the lock.
    pub fn request_path(&self) -> String {
        self.shared.request_path(&self.request)
    }

    /// Release the lock and report the outcome.
    ///
    /// A no-op if the owning lock was already unlocked.
    pub async fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        if !matches!(&*self.shared.slot.lock(), Slot::Outstanding(current) if *current == self.request) {
            return Ok(());
        }
        self.shared.delete_request(&self.request).await.map_err(|source| LockError::LockStore {
            key: self.shared.key.clone(),
            source,
        })?;
        self.shared.clear_if(&self.request);
        debug!(key = %self.shared.key, request = %self.request, "lock released");
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if !matches!(&*self.shared.slot.lock(), Slot::Outstanding(current) if *current == self.request) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(key = %self.shared.key, "no runtime to release lock on drop; session end will release it");
            return;
        };
        let shared = self.shared.clone();
        let request = std::mem::take(&mut self.request);
        handle.spawn(async move {
            match shared.delete_request(&request).await {
                Ok(()) => {
                    shared.clear_if(&request);
                    debug!(key = %shared.key, request = %request, "lock released on drop");
                }
                Err(err) => {
                    debug!(key = %shared.key, error = %err, "lock release on drop failed (session end will release it)")
                }
            }
        });
    }
}

/// Hands out [`DistributedLock`]s bound to the shared session.
#[derive(Clone)]
pub struct LockProvider {
    session: Arc<SessionManager>,
}

impl LockProvider {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// A fresh lock instance for `key` on the current session.
    pub async fn get_lock(&self, key: &str) -> Result<DistributedLock, LockError> {
        let store = self.session.get().await.context(LockSessionSnafu { key })?;
        DistributedLock::new(store, key)
    }
}
