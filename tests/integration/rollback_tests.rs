//! A reserved claim never stays `InProgress` once its attempt has ended

use std::sync::Arc;
use std::time::Duration;
use mintclaim::{
    ApiError, AuthError, ClaimCoordinator, ClaimKey, ClaimStatus, MemoryStatusStore, MintError, MintExecutor,
    MintKind, MintParams, PollError, PollerConfig, TaskPoller,
};
use tokio_util::sync::CancellationToken;
use crate::mocks::{fast_poller, MockMintApi};

fn params(kind: MintKind) -> MintParams {
    MintParams {
        chain: "conflux_test".to_string(),
        name: "Badge".to_string(),
        description: "Rollback test".to_string(),
        asset_url: "https://assets.example.com/badge.png".to_string(),
        contract_address: match kind {
            MintKind::Easy => None,
            MintKind::Custom => Some("cfxtest:contract".to_string()),
        },
    }
}

/// Run one attempt that is expected to fail and check the claim was released
async fn assert_released(api: MockMintApi, kind: MintKind) -> MintError {
    assert_released_with(api, kind, fast_poller()).await
}

async fn assert_released_with(api: MockMintApi, kind: MintKind, poller: TaskPoller) -> MintError {
    let executor = MintExecutor::new(ClaimCoordinator::new(MemoryStatusStore::new()), api, poller);
    let key = ClaimKey::new("cfxtest:rollback", kind);

    let err = executor.execute(&key, &params(kind)).await.unwrap_err();

    assert_eq!(executor.coordinator().status(&key).unwrap(), ClaimStatus::Failed);
    err
}

fn transport(message: &str) -> ApiError {
    ApiError::Transport {
        message: message.to_string(),
    }
}

#[tokio::test]
async fn test_rollback_after_login_failure() {
    let err = assert_released(MockMintApi::new().failing_login(AuthError::MissingToken), MintKind::Easy).await;
    assert_eq!(err, MintError::Auth(AuthError::MissingToken));
}

#[tokio::test]
async fn test_rollback_after_metadata_failure() {
    let api = MockMintApi::new().failing_metadata(ApiError::Remote {
        code: 400,
        message: "image is required".to_string(),
    });
    let err = assert_released(api.clone(), MintKind::Custom).await;

    assert!(matches!(err, MintError::Metadata(ApiError::Remote { code: 400, .. })));
    assert_eq!(api.submit_calls(), 0);
}

#[tokio::test]
async fn test_rollback_after_submit_failure() {
    let api = MockMintApi::new().failing_submit(ApiError::Status {
        status: 502,
        body: "bad gateway".to_string(),
    });
    let err = assert_released(api.clone(), MintKind::Easy).await;

    assert!(matches!(err, MintError::Submit(ApiError::Status { status: 502, .. })));
    assert_eq!(api.snapshot_calls(), 0);
}

#[tokio::test]
async fn test_rollback_after_poll_transport_failure() {
    let api = MockMintApi::new().failing_snapshot(transport("connection reset"));
    let err = assert_released(api, MintKind::Easy).await;

    assert_eq!(err, MintError::Poll(PollError::Transport(transport("connection reset"))));
}

#[tokio::test]
async fn test_rollback_after_remote_task_failure() {
    let api = MockMintApi::new().reporting_failure("execution reverted");
    let err = assert_released(api, MintKind::Custom).await;

    assert_eq!(
        err,
        MintError::Poll(PollError::RemoteReportedFailure("execution reverted".to_string()))
    );
}

#[tokio::test]
async fn test_rollback_after_poll_timeout() {
    let api = MockMintApi::new().never_completing();
    let poller = TaskPoller::new(PollerConfig {
        interval: Duration::from_millis(2),
        max_attempts: Some(3),
        max_duration: None,
        transport_retries: 0,
    });
    let err = assert_released_with(api.clone(), MintKind::Easy, poller).await;

    assert!(matches!(err, MintError::Poll(PollError::Timeout { attempts: 3, .. })));
    assert_eq!(api.snapshot_calls(), 3);
}

#[tokio::test]
async fn test_rollback_after_cancellation_while_polling() {
    let cancel = CancellationToken::new();
    let poller = TaskPoller::new(PollerConfig {
        interval: Duration::from_secs(3600),
        max_attempts: None,
        max_duration: None,
        transport_retries: 0,
    })
    .with_cancellation(cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = assert_released_with(MockMintApi::new().never_completing(), MintKind::Easy, poller).await;
    assert!(matches!(err, MintError::Poll(PollError::Cancelled { .. })));
}

#[tokio::test]
async fn test_rollback_after_cancellation_during_login() {
    let cancel = CancellationToken::new();
    let poller = fast_poller().with_cancellation(cancel.clone());
    let api = MockMintApi::new().with_login_delay(Duration::from_secs(3600));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = assert_released_with(api.clone(), MintKind::Easy, poller).await;
    assert_eq!(err, MintError::Cancelled { step: "login".to_string() });
    assert_eq!(api.submit_calls(), 0);
}

#[tokio::test]
async fn test_rollback_when_attempt_future_is_dropped() {
    let api = MockMintApi::new().never_completing();
    let executor = Arc::new(MintExecutor::new(
        ClaimCoordinator::new(MemoryStatusStore::new()),
        api,
        fast_poller(),
    ));
    let key = ClaimKey::easy("cfxtest:dropped");

    let attempt = {
        let executor = Arc::clone(&executor);
        let key = key.clone();
        tokio::spawn(async move { executor.execute(&key, &params(MintKind::Easy)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(executor.coordinator().status(&key).unwrap(), ClaimStatus::InProgress);

    attempt.abort();
    let _ = attempt.await;

    assert_eq!(executor.coordinator().status(&key).unwrap(), ClaimStatus::Failed);
}
