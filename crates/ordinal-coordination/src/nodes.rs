//! Mapping keys onto store paths and provisioning persistent nodes.

use ordinal_store::Acl;
use ordinal_store::CoordinationStore;
use ordinal_store::CreateMode;
use ordinal_store::StoreError;
use ordinal_store::path;
use tracing::debug;

/// Store path for a caller-supplied key.
///
/// Keys without a leading slash are rooted. Returns `None` for keys that
/// cannot name a node (empty, trailing slash, empty segments).
pub fn key_path(key: &str) -> Option<String> {
    if key.is_empty() || key == "/" {
        return None;
    }
    let rooted = if key.starts_with('/') {
        key.to_string()
    } else {
        format!("/{key}")
    };
    path::validate(&rooted).ok()?;
    Some(rooted)
}

/// Create `target` as a persistent node holding `data`, creating missing
/// ancestors with empty payloads.
///
/// Returns `true` when this call created `target`, `false` when it already
/// existed. Concurrent creators racing on any level are tolerated.
pub(crate) async fn create_with_parents(
    store: &dyn CoordinationStore,
    target: &str,
    data: &[u8],
) -> Result<bool, StoreError> {
    match create_persistent(store, target, data).await {
        Err(StoreError::NoNode { .. }) => {}
        other => return other,
    }

    let mut ancestors = Vec::new();
    let mut cursor = path::parent(target);
    while let Some(parent) = cursor {
        if parent == "/" {
            break;
        }
        ancestors.push(parent);
        cursor = path::parent(parent);
    }
    for ancestor in ancestors.into_iter().rev() {
        if create_persistent(store, ancestor, &[]).await? {
            debug!(path = ancestor, "created parent node");
        }
    }

    create_persistent(store, target, data).await
}

async fn create_persistent(store: &dyn CoordinationStore, target: &str, data: &[u8]) -> Result<bool, StoreError> {
    match store.create(target, data, Acl::OpenUnsafe, CreateMode::Persistent).await {
        Ok(_) => Ok(true),
        Err(StoreError::NodeExists { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use ordinal_testing::InMemoryEnsemble;

    use super::*;

    #[test]
    fn keys_are_rooted_and_validated() {
        assert_eq!(key_path("orders").as_deref(), Some("/orders"));
        assert_eq!(key_path("/orders").as_deref(), Some("/orders"));
        assert_eq!(key_path("app/orders").as_deref(), Some("/app/orders"));
        assert_eq!(key_path(""), None);
        assert_eq!(key_path("/"), None);
        assert_eq!(key_path("orders/"), None);
        assert_eq!(key_path("a//b"), None);
    }

    #[tokio::test]
    async fn creates_missing_ancestors() {
        let ensemble = InMemoryEnsemble::new();
        let session = ensemble.open_session();

        assert!(create_with_parents(session.as_ref(), "/a/b/c", b"leaf").await.unwrap());
        assert!(ensemble.node_exists("/a"));
        assert!(ensemble.node_exists("/a/b"));
        assert_eq!(ensemble.node_data("/a/b").unwrap(), Vec::<u8>::new());
        assert_eq!(ensemble.node_data("/a/b/c").unwrap(), b"leaf");

        assert!(!create_with_parents(session.as_ref(), "/a/b/c", b"other").await.unwrap());
        assert_eq!(ensemble.node_data("/a/b/c").unwrap(), b"leaf");
    }
}
