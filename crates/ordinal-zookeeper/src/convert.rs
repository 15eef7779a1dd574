//! Translation between `tokio-zookeeper` types and the store model.

use ordinal_store::Acl;
use ordinal_store::CreateMode;
use ordinal_store::EventType;
use ordinal_store::KeeperState;
use ordinal_store::Stat;
use ordinal_store::StoreError;
use ordinal_store::WatchedEvent;
use ordinal_store::path;
use tokio_zookeeper as zk;

/// Native code of ZooKeeper's generic system error.
const SYSTEM_ERROR_CODE: i32 = -1;

pub(crate) fn create_mode(mode: CreateMode) -> zk::CreateMode {
    match mode {
        CreateMode::Persistent => zk::CreateMode::Persistent,
        CreateMode::Ephemeral => zk::CreateMode::Ephemeral,
        CreateMode::PersistentSequential => zk::CreateMode::PersistentSequential,
        CreateMode::EphemeralSequential => zk::CreateMode::EphemeralSequential,
    }
}

pub(crate) fn acl(acl: Acl) -> &'static [zk::Acl] {
    match acl {
        Acl::OpenUnsafe => zk::Acl::open_unsafe(),
        Acl::CreatorAll => zk::Acl::creator_all(),
        Acl::ReadUnsafe => zk::Acl::read_unsafe(),
    }
}

pub(crate) fn stat(stat: zk::Stat) -> Stat {
    Stat {
        czxid: stat.czxid,
        mzxid: stat.mzxid,
        version: stat.version,
        cversion: stat.cversion,
        ephemeral_owner: stat.ephemeral_owner,
        data_length: stat.data_length,
        num_children: stat.num_children,
    }
}

pub(crate) fn keeper_state(state: zk::KeeperState) -> Option<KeeperState> {
    match state {
        zk::KeeperState::SyncConnected | zk::KeeperState::ConnectedReadOnly => Some(KeeperState::SyncConnected),
        zk::KeeperState::Disconnected => Some(KeeperState::Disconnected),
        zk::KeeperState::AuthFailed => Some(KeeperState::AuthFailed),
        zk::KeeperState::Expired => Some(KeeperState::Expired),
        _ => None,
    }
}

/// `None` for notifications the store model has no counterpart for, such as
/// watch-removal events.
pub(crate) fn event(event: zk::WatchedEvent) -> Option<WatchedEvent> {
    let keeper_state = keeper_state(event.keeper_state)?;
    let event_type = match event.event_type {
        zk::WatchedEventType::None => EventType::None,
        zk::WatchedEventType::NodeCreated => EventType::NodeCreated,
        zk::WatchedEventType::NodeDeleted => EventType::NodeDeleted,
        zk::WatchedEventType::NodeDataChanged => EventType::NodeDataChanged,
        zk::WatchedEventType::NodeChildrenChanged => EventType::NodeChildrenChanged,
        _ => return None,
    };
    let path = (event_type != EventType::None).then_some(event.path);
    Some(WatchedEvent {
        event_type,
        keeper_state,
        path,
    })
}

pub(crate) fn create_error(err: zk::error::Create, target: &str) -> StoreError {
    match err {
        zk::error::Create::NodeExists => StoreError::NodeExists {
            path: target.to_string(),
        },
        zk::error::Create::NoNode => StoreError::NoNode {
            path: path::parent(target).unwrap_or(target).to_string(),
        },
        zk::error::Create::NoChildrenForEphemerals => StoreError::NoChildrenForEphemerals {
            path: path::parent(target).unwrap_or(target).to_string(),
        },
        #[allow(unreachable_patterns)]
        other => StoreError::BadArguments {
            reason: format!("create {target}: {other:?}"),
        },
    }
}

pub(crate) fn set_data_error(err: zk::error::SetData, target: &str) -> StoreError {
    match err {
        zk::error::SetData::NoNode => StoreError::NoNode {
            path: target.to_string(),
        },
        zk::error::SetData::BadVersion { expected } => StoreError::BadVersion {
            path: target.to_string(),
            expected,
        },
        #[allow(unreachable_patterns)]
        other => StoreError::System {
            code: SYSTEM_ERROR_CODE,
            message: format!("set_data {target}: {other:?}"),
        },
    }
}

pub(crate) fn delete_error(err: zk::error::Delete, target: &str) -> StoreError {
    match err {
        zk::error::Delete::NoNode => StoreError::NoNode {
            path: target.to_string(),
        },
        zk::error::Delete::BadVersion { expected } => StoreError::BadVersion {
            path: target.to_string(),
            expected,
        },
        zk::error::Delete::NotEmpty => StoreError::NotEmpty {
            path: target.to_string(),
        },
        #[allow(unreachable_patterns)]
        other => StoreError::System {
            code: SYSTEM_ERROR_CODE,
            message: format!("delete {target}: {other:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zk_stat(version: i32, ephemeral_owner: i64) -> zk::Stat {
        zk::Stat {
            czxid: 7,
            mzxid: 9,
            ctime: 1,
            mtime: 2,
            version,
            cversion: 4,
            aversion: 0,
            ephemeral_owner,
            data_length: 8,
            num_children: 0,
            pzxid: 7,
        }
    }

    #[test]
    fn stat_keeps_versions_and_owner() {
        let converted = stat(zk_stat(3, 0x1234));
        assert_eq!(converted.version, 3);
        assert_eq!(converted.cversion, 4);
        assert_eq!(converted.czxid, 7);
        assert_eq!(converted.mzxid, 9);
        assert_eq!(converted.data_length, 8);
        assert!(converted.is_ephemeral());
        assert!(!stat(zk_stat(0, 0)).is_ephemeral());
    }

    #[test]
    fn create_modes_map_one_to_one() {
        assert_eq!(create_mode(CreateMode::Persistent), zk::CreateMode::Persistent);
        assert_eq!(create_mode(CreateMode::Ephemeral), zk::CreateMode::Ephemeral);
        assert_eq!(create_mode(CreateMode::PersistentSequential), zk::CreateMode::PersistentSequential);
        assert_eq!(create_mode(CreateMode::EphemeralSequential), zk::CreateMode::EphemeralSequential);
    }

    #[test]
    fn session_events_drop_the_path() {
        let expired = event(zk::WatchedEvent {
            event_type: zk::WatchedEventType::None,
            keeper_state: zk::KeeperState::Expired,
            path: String::new(),
        })
        .unwrap();
        assert_eq!(expired, WatchedEvent::session(KeeperState::Expired));

        let deleted = event(zk::WatchedEvent {
            event_type: zk::WatchedEventType::NodeDeleted,
            keeper_state: zk::KeeperState::SyncConnected,
            path: "/res/lock/a0000000000".to_string(),
        })
        .unwrap();
        assert_eq!(deleted, WatchedEvent::node(EventType::NodeDeleted, "/res/lock/a0000000000"));
    }

    #[test]
    fn read_only_connection_counts_as_connected() {
        assert_eq!(keeper_state(zk::KeeperState::ConnectedReadOnly), Some(KeeperState::SyncConnected));
        assert_eq!(keeper_state(zk::KeeperState::Disconnected), Some(KeeperState::Disconnected));
    }

    #[test]
    fn result_codes_map_onto_store_errors() {
        assert_eq!(
            create_error(zk::error::Create::NoNode, "/app/orders"),
            StoreError::NoNode {
                path: "/app".to_string()
            }
        );
        assert_eq!(
            create_error(zk::error::Create::NodeExists, "/app"),
            StoreError::NodeExists {
                path: "/app".to_string()
            }
        );
        assert_eq!(
            set_data_error(zk::error::SetData::BadVersion { expected: 3 }, "/orders"),
            StoreError::BadVersion {
                path: "/orders".to_string(),
                expected: 3
            }
        );
        assert_eq!(
            delete_error(zk::error::Delete::NotEmpty, "/orders"),
            StoreError::NotEmpty {
                path: "/orders".to_string()
            }
        );
    }
}
