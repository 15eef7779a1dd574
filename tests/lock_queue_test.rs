//! Distributed lock exclusion and FIFO ordering across sessions.

mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use ordinal::CancellationToken;
use ordinal::CoordinationStore;
use ordinal::DistributedLock;
use ordinal::LockError;
use ordinal_testing::InMemoryEnsemble;
use parking_lot::Mutex;

fn lock_for(ensemble: &InMemoryEnsemble, key: &str) -> DistributedLock {
    DistributedLock::new(ensemble.open_session(), key).unwrap()
}

#[tokio::test]
async fn three_waiters_are_granted_in_request_order() {
    let ensemble = InMemoryEnsemble::new();
    let holder = lock_for(&ensemble, "queue");
    let cancel = CancellationToken::new();
    let held = holder.lock_interruptibly(&cancel).await.unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let inside = Arc::new(AtomicUsize::new(0));
    let mut tasks = Vec::new();
    for waiter in 0..3 {
        let lock = lock_for(&ensemble, "queue");
        let (order, inside, cancel) = (order.clone(), inside.clone(), cancel.clone());
        tasks.push(tokio::spawn(async move {
            let guard = lock.lock_interruptibly(&cancel).await.unwrap();
            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0, "two holders at once");
            order.lock().push(waiter);
            tokio::time::sleep(Duration::from_millis(5)).await;
            inside.fetch_sub(1, Ordering::SeqCst);
            guard.release().await.unwrap();
        }));
        // Let this waiter enqueue before the next one.
        assert!(common::eventually(|| ensemble.children("/queue/lock").len() == waiter + 2).await);
    }

    held.release().await.unwrap();
    for task in tasks {
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2]);
    assert!(ensemble.children("/queue/lock").is_empty());
}

#[tokio::test]
async fn try_lock_contract() {
    let ensemble = InMemoryEnsemble::new();
    let first = lock_for(&ensemble, "res");
    let second = lock_for(&ensemble, "res");

    let guard = first.try_lock().await.unwrap().expect("free key");
    assert_eq!(ensemble.children("/res/lock").len(), 1);

    assert!(second.try_lock().await.unwrap().is_none());
    assert_eq!(ensemble.children("/res/lock"), vec!["a0000000000"]);

    let reentrant = first.try_lock().await;
    assert!(matches!(reentrant, Err(LockError::AlreadyLocked { .. })));
    let message = reentrant.err().unwrap().to_string();
    assert_eq!(message, "lock already has request active for res : a0000000000");

    guard.release().await.unwrap();
    // Suffixes come from the directory's child version, which deletes bump too.
    let guard = second.try_lock().await.unwrap().expect("released key");
    assert_eq!(guard.request_path(), "/res/lock/a0000000004");
}

#[tokio::test]
async fn expired_holder_releases_to_next_waiter() {
    let ensemble = InMemoryEnsemble::new();
    let holder_session = ensemble.open_session();
    let holder = DistributedLock::new(holder_session.clone(), "res").unwrap();
    let waiter = lock_for(&ensemble, "res");

    let _held = holder.try_lock().await.unwrap().expect("free key");
    let cancel = CancellationToken::new();
    let wait = tokio::spawn(async move { waiter.lock_interruptibly(&cancel).await.map(|g| g.request_path()) });
    assert!(common::eventually(|| ensemble.children("/res/lock").len() == 2).await);

    ensemble.expire_session(holder_session.session_id());
    let acquired = tokio::time::timeout(Duration::from_secs(1), wait).await.unwrap().unwrap().unwrap();
    assert_eq!(acquired, "/res/lock/a0000000001");
}

#[tokio::test]
async fn cancelled_waiter_keeps_its_place_until_unlock() {
    let ensemble = InMemoryEnsemble::new();
    let holder = lock_for(&ensemble, "res");
    let waiter = Arc::new(lock_for(&ensemble, "res"));
    let held = holder.try_lock().await.unwrap().expect("free key");

    let cancel = CancellationToken::new();
    let wait = {
        let (waiter, cancel) = (waiter.clone(), cancel.clone());
        tokio::spawn(async move { waiter.lock_interruptibly(&cancel).await.map(|_| ()) })
    };
    assert!(common::eventually(|| ensemble.children("/res/lock").len() == 2).await);

    cancel.cancel();
    let result = wait.await.unwrap();
    assert!(matches!(result, Err(LockError::Interrupted { .. })));
    assert_eq!(waiter.outstanding_request().as_deref(), Some("a0000000001"));
    assert!(matches!(
        waiter.lock_interruptibly(&CancellationToken::new()).await,
        Err(LockError::AlreadyLocked { .. })
    ));

    waiter.unlock().await.unwrap();
    held.release().await.unwrap();
    assert!(ensemble.children("/res/lock").is_empty());
}
