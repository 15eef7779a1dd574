//! Session establishment against a ZooKeeper ensemble.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ordinal_store::CoordinationStore;
use ordinal_store::KeeperState;
use ordinal_store::SessionConnector;
use ordinal_store::SessionWatcher;
use ordinal_store::StoreError;
use ordinal_store::WatchedEvent;
use tokio_zookeeper as zk;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::store::ZooKeeperStore;

/// Client port assumed for ensemble members listed without one.
const DEFAULT_CLIENT_PORT: u16 = 2181;

/// Split a connect string such as `zk1:2181,zk2:2181` into `host:port`
/// members, in the order given.
///
/// Members without a port get the default client port. Chroot suffixes
/// (`zk1:2181/app`) are rejected.
pub fn parse_ensemble(ensemble: &str) -> Result<Vec<String>, StoreError> {
    let mut members = Vec::new();
    for member in ensemble.split(',').map(str::trim).filter(|member| !member.is_empty()) {
        if member.contains('/') {
            return Err(StoreError::BadArguments {
                reason: format!("chroot suffixes are not supported: '{ensemble}'"),
            });
        }
        let has_port = member.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok());
        if has_port {
            members.push(member.to_string());
        } else {
            members.push(format!("{member}:{DEFAULT_CLIENT_PORT}"));
        }
    }
    if members.is_empty() {
        return Err(StoreError::BadArguments {
            reason: "ensemble list names no servers".to_string(),
        });
    }
    Ok(members)
}

/// Opens [`ZooKeeperStore`] sessions.
///
/// Members are tried in list order and the first one that completes the
/// handshake hosts the session.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZooKeeperConnector;

#[async_trait]
impl SessionConnector for ZooKeeperConnector {
    async fn connect(
        &self,
        ensemble: &str,
        session_timeout: Duration,
        watcher: Arc<dyn SessionWatcher>,
    ) -> Result<Arc<dyn CoordinationStore>, StoreError> {
        for member in parse_ensemble(ensemble)? {
            let addrs = match tokio::net::lookup_host(member.as_str()).await {
                Ok(addrs) => addrs,
                Err(err) => {
                    warn!(member = %member, error = %err, "could not resolve ensemble member");
                    continue;
                }
            };
            for addr in addrs {
                debug!(%addr, "connecting to ensemble member");
                let mut builder = zk::ZooKeeperBuilder::default();
                builder.set_timeout(session_timeout);
                match builder.connect(&addr).await {
                    Ok((client, events)) => {
                        let store = ZooKeeperStore::new(client);
                        info!(%addr, handle = store.session_id(), "zookeeper session established");
                        store.watch_session(events, watcher.clone());
                        // The handshake is complete once the builder returns.
                        watcher.process(WatchedEvent::session(KeeperState::SyncConnected));
                        return Ok(Arc::new(store));
                    }
                    Err(err) => warn!(%addr, error = ?err, "connect to ensemble member failed"),
                }
            }
        }
        Err(StoreError::ConnectionLoss)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn members_keep_order_and_get_default_port() {
        let members = parse_ensemble(" zk1:2181, zk2 ,,zk3:2281").unwrap();
        assert_eq!(members, vec!["zk1:2181", "zk2:2181", "zk3:2281"]);
    }

    #[test]
    fn chroot_and_empty_lists_are_rejected() {
        assert!(matches!(parse_ensemble("zk1:2181/app"), Err(StoreError::BadArguments { .. })));
        assert!(matches!(parse_ensemble(" , "), Err(StoreError::BadArguments { .. })));
    }

    #[tokio::test]
    async fn unreachable_ensemble_is_connection_loss() {
        struct Ignore;
        impl SessionWatcher for Ignore {
            fn process(&self, _event: WatchedEvent) {}
        }
        let result = ZooKeeperConnector.connect("127.0.0.1:1", Duration::from_secs(1), Arc::new(Ignore)).await;
        assert!(matches!(result, Err(StoreError::ConnectionLoss)));
    }

    proptest! {
        #[test]
        fn every_member_carries_a_port(hosts in prop::collection::vec("[a-z][a-z0-9]{0,8}", 1..5), port in 1u16..) {
            let list = hosts.iter().enumerate().map(|(i, host)| {
                if i % 2 == 0 { format!("{host}:{port}") } else { host.clone() }
            }).collect::<Vec<_>>().join(",");
            let members = parse_ensemble(&list).unwrap();
            prop_assert_eq!(members.len(), hosts.len());
            for member in members {
                let (_, parsed) = member.rsplit_once(':').unwrap();
                prop_assert!(parsed.parse::<u16>().is_ok());
            }
        }
    }
}
