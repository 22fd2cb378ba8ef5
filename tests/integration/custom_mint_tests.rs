//! Custom mints through an admin-deployed contract

use mintclaim::{
    ClaimCoordinator, ClaimKey, ClaimStatus, MemoryStatusStore, MintError, MintExecutor, MintKind, MintParams,
};
use crate::mocks::{fast_poller, MockMintApi};

fn custom_params(contract: Option<&str>) -> MintParams {
    MintParams {
        chain: "conflux_test".to_string(),
        name: "Event Ticket".to_string(),
        description: "Admission for one".to_string(),
        asset_url: "https://assets.example.com/ticket.png".to_string(),
        contract_address: contract.map(str::to_string),
    }
}

fn executor(api: MockMintApi) -> MintExecutor<MemoryStatusStore, MockMintApi> {
    MintExecutor::new(ClaimCoordinator::new(MemoryStatusStore::new()), api, fast_poller())
}

#[tokio::test]
async fn test_custom_mint_creates_metadata_then_mints() {
    let api = MockMintApi::new().with_token_id(7).with_pending_polls(1);
    let executor = executor(api.clone());
    let key = ClaimKey::custom("cfxtest:aaa");

    let outcome = executor
        .execute(&key, &custom_params(Some("cfxtest:acc7")))
        .await
        .unwrap();

    assert_eq!(outcome.token_id, 7);
    assert_eq!(outcome.kind, MintKind::Custom);
    assert_eq!(outcome.contract_address.as_deref(), Some("cfxtest:acc7"));
    assert_eq!(
        outcome.explorer_url("https://testnet.confluxscan.io/nft/"),
        "https://testnet.confluxscan.io/nft/cfxtest:acc7/7"
    );

    assert_eq!(api.metadata_calls(), 1);
    assert_eq!(api.metadata_names(), vec!["Event Ticket".to_string()]);
    let request = &api.custom_requests()[0];
    assert_eq!(request.contract_address, "cfxtest:acc7");
    assert_eq!(request.mint_to_address, "cfxtest:aaa");
    assert!(request.metadata_uri.starts_with("https://meta.example.com/Event Ticket"));
    assert!(api.easy_requests().is_empty());
    assert_eq!(executor.coordinator().status(&key).unwrap(), ClaimStatus::Success);
}

#[tokio::test]
async fn test_contract_reported_by_service_wins() {
    let api = MockMintApi::new().with_contract_address("cfxtest:reported");
    let executor = executor(api);

    let outcome = executor
        .execute(&ClaimKey::custom("cfxtest:bbb"), &custom_params(Some("cfxtest:configured")))
        .await
        .unwrap();

    assert_eq!(outcome.contract_address.as_deref(), Some("cfxtest:reported"));
}

#[tokio::test]
async fn test_custom_mint_without_contract_is_rejected_before_reserving() {
    let api = MockMintApi::new();
    let executor = executor(api.clone());
    let key = ClaimKey::custom("cfxtest:ccc");

    let err = executor.execute(&key, &custom_params(None)).await.unwrap_err();

    assert!(matches!(err, MintError::InvalidParams { .. }));
    assert!(err.is_rejection());
    assert_eq!(api.total_calls(), 0);
    assert_eq!(executor.coordinator().status(&key).unwrap(), ClaimStatus::NotStarted);
}
