//! Deterministic in-memory coordination store.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use ordinal_store::Acl;
use ordinal_store::CoordinationStore;
use ordinal_store::CreateMode;
use ordinal_store::EventType;
use ordinal_store::KeeperState;
use ordinal_store::SessionConnector;
use ordinal_store::SessionWatcher;
use ordinal_store::Stat;
use ordinal_store::StoreError;
use ordinal_store::Watch;
use ordinal_store::WatchTrigger;
use ordinal_store::WatchedEvent;
use ordinal_store::path;
use ordinal_store::watch_channel;
use parking_lot::Mutex;
use tracing::debug;

/// Store operation, used to target injected faults and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Create,
    GetData,
    SetData,
    Delete,
    Exists,
    GetChildren,
}

/// When an injected fault takes effect relative to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTiming {
    /// Fail without touching the tree.
    Before,
    /// Apply the operation, then report the error anyway.
    AfterApply,
}

/// An error to report from upcoming store operations.
#[derive(Debug, Clone)]
pub struct Fault {
    op: Option<OpKind>,
    error: StoreError,
    timing: FaultTiming,
    remaining: usize,
}

impl Fault {
    /// Fail the next matching operation before it is applied.
    pub fn before(op: OpKind, error: StoreError) -> Self {
        Self {
            op: Some(op),
            error,
            timing: FaultTiming::Before,
            remaining: 1,
        }
    }

    /// Apply the next matching operation, then report `error`.
    pub fn after_apply(op: OpKind, error: StoreError) -> Self {
        Self {
            op: Some(op),
            error,
            timing: FaultTiming::AfterApply,
            remaining: 1,
        }
    }

    /// Fail the next operation of any kind.
    pub fn any(error: StoreError) -> Self {
        Self {
            op: None,
            error,
            timing: FaultTiming::Before,
            remaining: 1,
        }
    }

    /// Repeat the fault for `times` matching operations.
    pub fn times(mut self, times: usize) -> Self {
        self.remaining = times;
        self
    }

    fn matches(&self, op: OpKind) -> bool {
        self.op.is_none_or(|target| target == op)
    }
}

/// How the connector reports session establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Deliver the connected notification right away.
    Immediate,
    /// Deliver it after a delay.
    Delayed(Duration),
    /// Never deliver it; callers waiting for a connection time out.
    Never,
    /// Refuse to create a session at all.
    Refuse,
}

/// Session watcher that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWatcher;

impl SessionWatcher for NullWatcher {
    fn process(&self, _event: WatchedEvent) {}
}

struct Node {
    data: Vec<u8>,
    stat: Stat,
    children: BTreeSet<String>,
}

/// A registered one-shot watch and the session that left it.
struct PendingWatch {
    session: i64,
    trigger: WatchTrigger,
}

struct SessionEntry {
    watcher: Arc<dyn SessionWatcher>,
    alive: bool,
}

struct Tree {
    zxid: i64,
    nodes: BTreeMap<String, Node>,
    watches: HashMap<String, Vec<PendingWatch>>,
    sessions: HashMap<i64, SessionEntry>,
}

/// Notifications collected under the tree lock and delivered after it drops.
#[derive(Default)]
struct Outbox {
    watches: Vec<(WatchTrigger, WatchedEvent)>,
}

impl Outbox {
    fn deliver(self) {
        for (trigger, event) in self.watches {
            trigger.fire(event);
        }
    }
}

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node {
            data: Vec::new(),
            stat: Stat::default(),
            children: BTreeSet::new(),
        });
        Self {
            zxid: 0,
            nodes,
            watches: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    fn next_zxid(&mut self) -> i64 {
        self.zxid += 1;
        self.zxid
    }

    fn trigger(&mut self, path: &str, event_type: EventType, outbox: &mut Outbox) {
        if let Some(pending) = self.watches.remove(path) {
            for watch in pending {
                outbox.watches.push((watch.trigger, WatchedEvent::node(event_type, path)));
            }
        }
    }

    /// Detach every watch left by `session` and queue `state` for each.
    fn end_session_watches(&mut self, session: i64, state: KeeperState, outbox: &mut Outbox) -> usize {
        let mut ended = 0;
        for pending in self.watches.values_mut() {
            let (dead, live): (Vec<_>, Vec<_>) = pending.drain(..).partition(|watch| watch.session == session);
            *pending = live;
            for watch in dead {
                outbox.watches.push((watch.trigger, WatchedEvent::session(state)));
                ended += 1;
            }
        }
        self.watches.retain(|_, pending| !pending.is_empty());
        ended
    }

    fn create(
        &mut self,
        owner: i64,
        requested: &str,
        data: &[u8],
        mode: CreateMode,
        outbox: &mut Outbox,
    ) -> Result<String, StoreError> {
        path::validate(requested)?;
        let parent_path = match path::parent(requested) {
            Some(parent) => parent.to_string(),
            None => {
                return Err(StoreError::NodeExists {
                    path: requested.to_string(),
                });
            }
        };
        let parent = self.nodes.get(&parent_path).ok_or_else(|| StoreError::NoNode {
            path: parent_path.clone(),
        })?;
        if parent.stat.is_ephemeral() {
            return Err(StoreError::NoChildrenForEphemerals { path: parent_path });
        }

        let actual = if mode.is_sequential() {
            let prefix = path::basename(requested);
            path::join(&parent_path, &path::sequential_name(prefix, parent.stat.cversion))
        } else {
            requested.to_string()
        };
        if self.nodes.contains_key(&actual) {
            return Err(StoreError::NodeExists { path: actual });
        }

        let zxid = self.next_zxid();
        let stat = Stat {
            czxid: zxid,
            mzxid: zxid,
            version: 0,
            cversion: 0,
            ephemeral_owner: if mode.is_ephemeral() { owner } else { 0 },
            data_length: data.len() as i32,
            num_children: 0,
        };
        self.nodes.insert(actual.clone(), Node {
            data: data.to_vec(),
            stat,
            children: BTreeSet::new(),
        });
        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.children.insert(path::basename(&actual).to_string());
            parent.stat.cversion += 1;
            parent.stat.num_children = parent.children.len() as i32;
        }
        self.trigger(&actual, EventType::NodeCreated, outbox);
        Ok(actual)
    }

    fn set_data(
        &mut self,
        target: &str,
        data: &[u8],
        version: Option<i32>,
        outbox: &mut Outbox,
    ) -> Result<Stat, StoreError> {
        let zxid = self.zxid + 1;
        let node = self.nodes.get_mut(target).ok_or_else(|| StoreError::NoNode {
            path: target.to_string(),
        })?;
        if let Some(expected) = version {
            if expected != node.stat.version {
                return Err(StoreError::BadVersion {
                    path: target.to_string(),
                    expected,
                });
            }
        }
        node.data = data.to_vec();
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.data_length = data.len() as i32;
        let stat = node.stat;
        self.zxid = zxid;
        self.trigger(target, EventType::NodeDataChanged, outbox);
        Ok(stat)
    }

    fn delete(&mut self, target: &str, version: Option<i32>, outbox: &mut Outbox) -> Result<(), StoreError> {
        let node = self.nodes.get(target).ok_or_else(|| StoreError::NoNode {
            path: target.to_string(),
        })?;
        if let Some(expected) = version {
            if expected != node.stat.version {
                return Err(StoreError::BadVersion {
                    path: target.to_string(),
                    expected,
                });
            }
        }
        if !node.children.is_empty() {
            return Err(StoreError::NotEmpty {
                path: target.to_string(),
            });
        }
        self.remove(target, outbox);
        Ok(())
    }

    fn remove(&mut self, target: &str, outbox: &mut Outbox) {
        if self.nodes.remove(target).is_none() {
            return;
        }
        if let Some(parent) = path::parent(target).and_then(|parent_path| self.nodes.get_mut(parent_path)) {
            parent.children.remove(path::basename(target));
            parent.stat.cversion += 1;
            parent.stat.num_children = parent.children.len() as i32;
        }
        self.next_zxid();
        self.trigger(target, EventType::NodeDeleted, outbox);
    }

    fn remove_ephemerals(&mut self, owner: i64, outbox: &mut Outbox) -> usize {
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.stat.ephemeral_owner == owner)
            .map(|(path, _)| path.clone())
            .collect();
        for target in &owned {
            self.remove(target, outbox);
        }
        owned.len()
    }
}

struct EnsembleInner {
    tree: Mutex<Tree>,
    faults: Mutex<VecDeque<Fault>>,
    connect_behavior: Mutex<ConnectBehavior>,
    next_session: AtomicI64,
    connects: AtomicUsize,
    calls: Mutex<HashMap<OpKind, usize>>,
}

/// An in-process coordination store shared by every session opened on it.
///
/// Cloning yields another handle to the same tree.
#[derive(Clone)]
pub struct InMemoryEnsemble {
    inner: Arc<EnsembleInner>,
}

impl Default for InMemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEnsemble {
    /// Create an empty ensemble holding only the root node.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EnsembleInner {
                tree: Mutex::new(Tree::new()),
                faults: Mutex::new(VecDeque::new()),
                connect_behavior: Mutex::new(ConnectBehavior::Immediate),
                next_session: AtomicI64::new(1),
                connects: AtomicUsize::new(0),
                calls: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A connector that opens sessions on this ensemble.
    pub fn connector(&self) -> Arc<InMemoryConnector> {
        Arc::new(InMemoryConnector {
            ensemble: self.clone(),
        })
    }

    /// Open a session directly, bypassing connect notifications.
    pub fn open_session(&self) -> Arc<InMemorySession> {
        Arc::new(self.register_session(Arc::new(NullWatcher)))
    }

    /// Change how future connects report establishment.
    pub fn set_connect_behavior(&self, behavior: ConnectBehavior) {
        *self.inner.connect_behavior.lock() = behavior;
    }

    /// Number of sessions the connector has created.
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Queue a fault; faults are consumed in order.
    pub fn inject(&self, fault: Fault) {
        self.inner.faults.lock().push_back(fault);
    }

    /// Drop every pending fault.
    pub fn clear_faults(&self) {
        self.inner.faults.lock().clear();
    }

    /// How many times an operation was attempted, faults included.
    pub fn calls(&self, op: OpKind) -> usize {
        self.inner.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Expire a session: wake its node watches with the expiry, remove its
    /// ephemerals, and notify its session watcher.
    pub fn expire_session(&self, session_id: i64) {
        let mut outbox = Outbox::default();
        let watcher = {
            let mut tree = self.inner.tree.lock();
            let watcher = match tree.sessions.get_mut(&session_id) {
                Some(entry) if entry.alive => {
                    entry.alive = false;
                    entry.watcher.clone()
                }
                _ => return,
            };
            let watches = tree.end_session_watches(session_id, KeeperState::Expired, &mut outbox);
            let removed = tree.remove_ephemerals(session_id, &mut outbox);
            debug!(session_id, removed, watches, "expired in-memory session");
            watcher
        };
        outbox.deliver();
        deliver_session_event(watcher, KeeperState::Expired, None);
    }

    /// Expire every live session.
    pub fn expire_all_sessions(&self) {
        for id in self.live_sessions() {
            self.expire_session(id);
        }
    }

    /// Ids of sessions that have not expired or closed.
    pub fn live_sessions(&self) -> Vec<i64> {
        let tree = self.inner.tree.lock();
        let mut ids: Vec<i64> = tree.sessions.iter().filter(|(_, s)| s.alive).map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids
    }

    /// Whether a node exists, without going through a session.
    pub fn node_exists(&self, target: &str) -> bool {
        self.inner.tree.lock().nodes.contains_key(target)
    }

    /// Payload of a node, without going through a session.
    pub fn node_data(&self, target: &str) -> Option<Vec<u8>> {
        self.inner.tree.lock().nodes.get(target).map(|node| node.data.clone())
    }

    /// Sorted child names of a node; empty when the node is missing.
    pub fn children(&self, target: &str) -> Vec<String> {
        self.inner
            .tree
            .lock()
            .nodes
            .get(target)
            .map(|node| node.children.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn register_session(&self, watcher: Arc<dyn SessionWatcher>) -> InMemorySession {
        let id = self.inner.next_session.fetch_add(1, Ordering::SeqCst);
        self.inner.tree.lock().sessions.insert(id, SessionEntry { watcher, alive: true });
        InMemorySession {
            ensemble: self.clone(),
            id,
        }
    }

    fn record(&self, op: OpKind) -> Result<Option<StoreError>, StoreError> {
        *self.inner.calls.lock().entry(op).or_insert(0) += 1;

        let mut faults = self.inner.faults.lock();
        let Some(idx) = faults.iter().position(|fault| fault.matches(op)) else {
            return Ok(None);
        };
        let fault = &mut faults[idx];
        fault.remaining = fault.remaining.saturating_sub(1);
        let error = fault.error.clone();
        let timing = fault.timing;
        if fault.remaining == 0 {
            faults.remove(idx);
        }
        match timing {
            FaultTiming::Before => Err(error),
            FaultTiming::AfterApply => Ok(Some(error)),
        }
    }
}

fn deliver_session_event(watcher: Arc<dyn SessionWatcher>, state: KeeperState, delay: Option<Duration>) {
    let event = WatchedEvent::session(state);
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                watcher.process(event);
            });
        }
        Err(_) => watcher.process(event),
    }
}

/// Opens [`InMemorySession`]s on an ensemble.
pub struct InMemoryConnector {
    ensemble: InMemoryEnsemble,
}

#[async_trait]
impl SessionConnector for InMemoryConnector {
    async fn connect(
        &self,
        ensemble: &str,
        session_timeout: Duration,
        watcher: Arc<dyn SessionWatcher>,
    ) -> Result<Arc<dyn CoordinationStore>, StoreError> {
        let behavior = *self.ensemble.inner.connect_behavior.lock();
        if behavior == ConnectBehavior::Refuse {
            return Err(StoreError::ConnectionLoss);
        }
        self.ensemble.inner.connects.fetch_add(1, Ordering::SeqCst);
        let session = self.ensemble.register_session(watcher.clone());
        debug!(ensemble, session_id = session.id, timeout_ms = session_timeout.as_millis() as u64, "opened in-memory session");
        match behavior {
            ConnectBehavior::Immediate => deliver_session_event(watcher, KeeperState::SyncConnected, None),
            ConnectBehavior::Delayed(delay) => deliver_session_event(watcher, KeeperState::SyncConnected, Some(delay)),
            ConnectBehavior::Never | ConnectBehavior::Refuse => {}
        }
        Ok(Arc::new(session))
    }
}

/// One session on an [`InMemoryEnsemble`].
pub struct InMemorySession {
    ensemble: InMemoryEnsemble,
    id: i64,
}

impl InMemorySession {
    async fn begin(&self, op: OpKind) -> Result<Option<StoreError>, StoreError> {
        // Give concurrent tasks a chance to interleave between read and write.
        tokio::task::yield_now().await;
        let alive = self.ensemble.inner.tree.lock().sessions.get(&self.id).is_some_and(|s| s.alive);
        if !alive {
            return Err(StoreError::SessionExpired);
        }
        self.ensemble.record(op)
    }

    fn finish<T>(result: Result<T, StoreError>, late: Option<StoreError>) -> Result<T, StoreError> {
        let value = result?;
        match late {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }
}

#[async_trait]
impl CoordinationStore for InMemorySession {
    fn session_id(&self) -> i64 {
        self.id
    }

    async fn create(&self, target: &str, data: &[u8], _acl: Acl, mode: CreateMode) -> Result<String, StoreError> {
        let late = self.begin(OpKind::Create).await?;
        let mut outbox = Outbox::default();
        let result = self.ensemble.inner.tree.lock().create(self.id, target, data, mode, &mut outbox);
        outbox.deliver();
        Self::finish(result, late)
    }

    async fn get_data(&self, target: &str) -> Result<(Vec<u8>, Stat), StoreError> {
        let late = self.begin(OpKind::GetData).await?;
        let result = {
            let tree = self.ensemble.inner.tree.lock();
            tree.nodes.get(target).map(|node| (node.data.clone(), node.stat)).ok_or_else(|| StoreError::NoNode {
                path: target.to_string(),
            })
        };
        Self::finish(result, late)
    }

    async fn set_data(&self, target: &str, data: &[u8], version: Option<i32>) -> Result<Stat, StoreError> {
        let late = self.begin(OpKind::SetData).await?;
        let mut outbox = Outbox::default();
        let result = self.ensemble.inner.tree.lock().set_data(target, data, version, &mut outbox);
        outbox.deliver();
        Self::finish(result, late)
    }

    async fn delete(&self, target: &str, version: Option<i32>) -> Result<(), StoreError> {
        let late = self.begin(OpKind::Delete).await?;
        let mut outbox = Outbox::default();
        let result = self.ensemble.inner.tree.lock().delete(target, version, &mut outbox);
        outbox.deliver();
        Self::finish(result, late)
    }

    async fn exists(&self, target: &str) -> Result<Option<Stat>, StoreError> {
        let late = self.begin(OpKind::Exists).await?;
        let result = Ok(self.ensemble.inner.tree.lock().nodes.get(target).map(|node| node.stat));
        Self::finish(result, late)
    }

    async fn exists_watch(&self, target: &str) -> Result<(Option<Stat>, Watch), StoreError> {
        let late = self.begin(OpKind::Exists).await?;
        let result = {
            let mut tree = self.ensemble.inner.tree.lock();
            let stat = tree.nodes.get(target).map(|node| node.stat);
            let (trigger, watch) = watch_channel();
            let slot = tree.watches.entry(target.to_string()).or_default();
            slot.retain(|watch| !watch.trigger.is_abandoned());
            slot.push(PendingWatch {
                session: self.id,
                trigger,
            });
            Ok((stat, watch))
        };
        Self::finish(result, late)
    }

    async fn get_children(&self, target: &str) -> Result<Vec<String>, StoreError> {
        let late = self.begin(OpKind::GetChildren).await?;
        let result = {
            let tree = self.ensemble.inner.tree.lock();
            tree.nodes.get(target).map(|node| node.children.iter().cloned().collect()).ok_or_else(|| {
                StoreError::NoNode {
                    path: target.to_string(),
                }
            })
        };
        Self::finish(result, late)
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut outbox = Outbox::default();
        {
            let mut tree = self.ensemble.inner.tree.lock();
            match tree.sessions.get_mut(&self.id) {
                Some(entry) if entry.alive => entry.alive = false,
                _ => return Ok(()),
            }
            tree.end_session_watches(self.id, KeeperState::Closed, &mut outbox);
            tree.remove_ephemerals(self.id, &mut outbox);
        }
        outbox.deliver();
        Ok(())
    }
}
