//! How the clock and session manager respond to store failures.

mod common;

use ordinal::Clock;
use ordinal::SequencingError;
use ordinal::SessionError;
use ordinal::SessionState;
use ordinal::StoreError;
use ordinal_testing::ConnectBehavior;
use ordinal_testing::Fault;
use ordinal_testing::OpKind;

#[tokio::test]
async fn session_expiry_on_first_access_is_not_retried() {
    let (ensemble, coordinator, metrics) = common::coordinator(5);

    ensemble.inject(Fault::before(OpKind::GetData, StoreError::SessionExpired));
    let err = coordinator.clock().get_next_sequence("k").await.unwrap_err();
    assert!(matches!(err, SequencingError::SessionExpired { .. }));
    assert_eq!(ensemble.calls(OpKind::GetData), 1);

    let snapshot = metrics.take_snapshot();
    assert_eq!(snapshot.session_expired_events, 1);
    assert_eq!(snapshot.store_errors, 1);
    assert_eq!(coordinator.session_state(), SessionState::Expired);
}

#[tokio::test]
async fn connection_loss_is_retried_until_it_clears() {
    let (ensemble, coordinator, metrics) = common::coordinator(5);

    ensemble.inject(Fault::before(OpKind::GetData, StoreError::ConnectionLoss).times(4));
    assert_eq!(coordinator.clock().get_next_sequence("k").await.unwrap(), 0);
    assert_eq!(metrics.take_connection_loss_events(), 4);
}

#[tokio::test]
async fn connection_loss_attempts_are_bounded() {
    let (ensemble, coordinator, _) = common::coordinator(5);

    ensemble.inject(Fault::before(OpKind::GetData, StoreError::ConnectionLoss).times(100));
    let err = coordinator.clock().get_next_sequence("k").await.unwrap_err();
    assert!(matches!(err, SequencingError::RetriesExhausted { attempts: 5, .. }));
    assert_eq!(ensemble.calls(OpKind::GetData), 5);
}

#[tokio::test]
async fn other_store_errors_are_retried_and_reported() {
    let (ensemble, coordinator, metrics) = common::coordinator(3);

    ensemble.inject(
        Fault::before(OpKind::GetData, StoreError::System {
            code: -1,
            message: "marshalling".to_string(),
        })
        .times(3),
    );
    let err = coordinator.clock().get_next_sequence("k").await.unwrap_err();
    match err {
        SequencingError::RetriesExhausted { attempts, source, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(source, StoreError::System { code: -1, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(metrics.take_store_errors(), 3);
}

#[tokio::test]
async fn expired_session_reconnects_on_next_use() {
    let (ensemble, coordinator, _) = common::coordinator(5);
    let clock = coordinator.clock();
    assert_eq!(clock.get_next_sequence("k").await.unwrap(), 0);

    ensemble.expire_all_sessions();
    assert!(common::eventually(|| coordinator.session_state() == SessionState::Expired).await);

    assert_eq!(clock.get_next_sequence("k").await.unwrap(), 1);
    assert_eq!(ensemble.connect_count(), 2);
}

#[tokio::test]
async fn connect_timeout_surfaces_as_session_error() {
    let (ensemble, coordinator, _) = common::coordinator(5);
    ensemble.set_connect_behavior(ConnectBehavior::Never);

    let err = coordinator.clock().get_next_sequence("k").await.unwrap_err();
    assert!(matches!(
        err,
        SequencingError::Session {
            source: SessionError::ConnectionTimeout { .. },
            ..
        }
    ));
    assert!(matches!(coordinator.lock("k").await, Err(ordinal::LockError::LockSession { .. })));
}
