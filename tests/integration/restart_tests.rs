//! Claim state across process restarts

use mintclaim::{
    ClaimCoordinator, ClaimError, ClaimKey, ClaimStatus, MintClaimConfig, MintError, MintExecutor, MintParams,
    SqliteStatusStore, StatusStore,
};
use std::path::Path;
use chrono::{Duration, Utc};
use mintclaim::CancellationToken;
use tempfile::TempDir;
use crate::mocks::{fast_poller, MockMintApi};

fn easy_params() -> MintParams {
    MintParams {
        chain: "conflux_test".to_string(),
        name: "Badge".to_string(),
        description: "Durable".to_string(),
        asset_url: "https://assets.example.com/badge.png".to_string(),
        contract_address: None,
    }
}

/// Age a record as if its holder died two hours ago
fn backdate(path: &Path, key: &ClaimKey) {
    let db = rusqlite::Connection::open(path).unwrap();
    let updated = db
        .execute(
            "UPDATE claims SET updated_at = ?1 WHERE namespace = ?2 AND address = ?3",
            rusqlite::params![
                (Utc::now() - Duration::hours(2)).to_rfc3339(),
                key.kind.namespace(),
                key.address
            ],
        )
        .unwrap();
    assert_eq!(updated, 1);
}

#[tokio::test]
async fn test_success_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("claims.db");
    let key = ClaimKey::easy("cfxtest:aaa");

    {
        let store = SqliteStatusStore::open(&path).unwrap();
        let executor = MintExecutor::new(ClaimCoordinator::new(store), MockMintApi::new(), fast_poller());
        executor.execute(&key, &easy_params()).await.unwrap();
    }

    let api = MockMintApi::new();
    let store = SqliteStatusStore::open(&path).unwrap();
    let executor = MintExecutor::new(ClaimCoordinator::new(store), api.clone(), fast_poller());

    let err = executor.execute(&key, &easy_params()).await.unwrap_err();
    assert_eq!(
        err,
        MintError::AlreadyClaimed(ClaimError::AlreadyCompleted { key: key.to_string() })
    );
    assert_eq!(api.total_calls(), 0);
}

#[test]
fn test_interrupted_claim_is_recovered_on_start() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("claims.db");
    let key = ClaimKey::easy("cfxtest:bbb");

    // A process died while holding the slot
    SqliteStatusStore::open(&path)
        .unwrap()
        .set(&key, ClaimStatus::InProgress)
        .unwrap();
    backdate(&path, &key);

    let mut config = MintClaimConfig::default();
    config.store.path = path.clone();
    let executor = MintExecutor::from_config(&config, CancellationToken::new()).unwrap();

    assert_eq!(executor.coordinator().status(&key).unwrap(), ClaimStatus::Failed);
    assert!(executor.coordinator().reserve(&key).is_ok());
}

#[test]
fn test_startup_leaves_live_reservation_alone() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("claims.db");
    let key = ClaimKey::easy("cfxtest:live");

    let first = ClaimCoordinator::new(SqliteStatusStore::open(&path).unwrap());
    let held = first.reserve(&key).unwrap();

    // A second instance starts against the same file
    let mut config = MintClaimConfig::default();
    config.store.path = path.clone();
    let second = MintExecutor::from_config(&config, CancellationToken::new()).unwrap();

    assert_eq!(second.coordinator().status(&key).unwrap(), ClaimStatus::InProgress);
    assert_eq!(
        second.coordinator().reserve(&key).unwrap_err(),
        ClaimError::AlreadyInProgress { key: key.to_string() }
    );

    held.complete().unwrap();
    assert_eq!(second.coordinator().status(&key).unwrap(), ClaimStatus::Success);
}

#[test]
fn test_recovery_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("claims.db");
    let key = ClaimKey::custom("cfxtest:ccc");

    SqliteStatusStore::open(&path)
        .unwrap()
        .set(&key, ClaimStatus::InProgress)
        .unwrap();
    backdate(&path, &key);

    let mut config = MintClaimConfig::default();
    config.store.path = path;
    config.claims.recover_interrupted_on_start = false;
    let executor = MintExecutor::from_config(&config, CancellationToken::new()).unwrap();

    assert_eq!(executor.coordinator().status(&key).unwrap(), ClaimStatus::InProgress);
}

#[test]
fn test_from_config_rejects_invalid_config() {
    let mut config = MintClaimConfig::default();
    config.api.host = "ftp://mint.example.com".to_string();

    assert!(MintExecutor::from_config(&config, CancellationToken::new()).is_err());
}
