//! Node and event types shared by store clients and recipes.

use tokio::sync::oneshot;

/// Metadata about a node, modeled on the UNIX `stat` structure.
///
/// Only the fields the recipes and the in-memory store need are carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    /// Transaction that created the node.
    pub czxid: i64,
    /// Last transaction that modified the node's data.
    pub mzxid: i64,
    /// Number of data changes; the compare-and-swap token.
    pub version: i32,
    /// Number of child changes; drives sequential suffixes.
    pub cversion: i32,
    /// Owning session for ephemeral nodes, 0 otherwise.
    pub ephemeral_owner: i64,
    /// Payload length in bytes.
    pub data_length: i32,
    /// Number of direct children.
    pub num_children: i32,
}

impl Stat {
    /// Whether the node is owned by a session.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral_owner != 0
    }
}

/// How a node is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Survives client disconnects.
    Persistent,
    /// Deleted when the creating session ends.
    Ephemeral,
    /// Persistent, with a monotonically increasing suffix appended to the name.
    PersistentSequential,
    /// Ephemeral, with a monotonically increasing suffix appended to the name.
    EphemeralSequential,
}

impl CreateMode {
    /// Whether nodes created in this mode die with their session.
    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    /// Whether the store appends a sequence suffix to the requested name.
    pub fn is_sequential(self) -> bool {
        matches!(self, CreateMode::PersistentSequential | CreateMode::EphemeralSequential)
    }
}

/// Access control applied at node creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acl {
    /// World-readable and world-writable.
    #[default]
    OpenUnsafe,
    /// Full permissions for the creating identity only.
    CreatorAll,
    /// World-readable, no writes.
    ReadUnsafe,
}

/// Connection state reported with every notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperState {
    Disconnected,
    SyncConnected,
    AuthFailed,
    Expired,
    Closed,
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Session-level notification, no node involved.
    None,
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

/// A notification delivered to a session watcher or a one-shot node watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: EventType,
    pub keeper_state: KeeperState,
    pub path: Option<String>,
}

impl WatchedEvent {
    /// A session-level notification.
    pub fn session(keeper_state: KeeperState) -> Self {
        Self {
            event_type: EventType::None,
            keeper_state,
            path: None,
        }
    }

    /// A node notification on a connected session.
    pub fn node(event_type: EventType, path: impl Into<String>) -> Self {
        Self {
            event_type,
            keeper_state: KeeperState::SyncConnected,
            path: Some(path.into()),
        }
    }
}

/// Create a one-shot watch pair.
///
/// Store implementations keep the [`WatchTrigger`] and hand the [`Watch`] to
/// the caller that registered interest.
pub fn watch_channel() -> (WatchTrigger, Watch) {
    let (tx, rx) = oneshot::channel();
    (WatchTrigger { tx }, Watch { rx })
}

/// Store-side half of a one-shot watch.
#[derive(Debug)]
pub struct WatchTrigger {
    tx: oneshot::Sender<WatchedEvent>,
}

impl WatchTrigger {
    /// Deliver the notification. A watcher that went away is ignored.
    pub fn fire(self, event: WatchedEvent) {
        let _ = self.tx.send(event);
    }

    /// Whether the receiving side has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Caller-side half of a one-shot watch.
///
/// Fires at most once. If the store drops the trigger without firing (for
/// example because the session closed), [`Watch::fired`] resolves to `None`.
#[derive(Debug)]
pub struct Watch {
    rx: oneshot::Receiver<WatchedEvent>,
}

impl Watch {
    /// Wait for the notification.
    pub async fn fired(self) -> Option<WatchedEvent> {
        self.rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_mode_flags() {
        assert!(!CreateMode::Persistent.is_ephemeral());
        assert!(!CreateMode::Persistent.is_sequential());
        assert!(CreateMode::Ephemeral.is_ephemeral());
        assert!(CreateMode::PersistentSequential.is_sequential());
        assert!(CreateMode::EphemeralSequential.is_ephemeral());
        assert!(CreateMode::EphemeralSequential.is_sequential());
    }

    #[tokio::test]
    async fn watch_delivers_once() {
        let (trigger, watch) = watch_channel();
        trigger.fire(WatchedEvent::node(EventType::NodeDeleted, "/k/lock/a0000000000"));
        let event = watch.fired().await.unwrap();
        assert_eq!(event.event_type, EventType::NodeDeleted);
        assert_eq!(event.path.as_deref(), Some("/k/lock/a0000000000"));
    }

    #[tokio::test]
    async fn dropped_trigger_resolves_none() {
        let (trigger, watch) = watch_channel();
        drop(trigger);
        assert!(watch.fired().await.is_none());
    }

    #[test]
    fn abandoned_watch_is_detectable() {
        let (trigger, watch) = watch_channel();
        assert!(!trigger.is_abandoned());
        drop(watch);
        assert!(trigger.is_abandoned());
    }
}
