//! Mintclaim - one-token-per-address claim orchestration for minting bots
//!
//! A bot front-end asks for a token to be minted to a user address. Mintclaim
//! makes sure each address receives at most one token per mint kind:
//! - a durable status store records every claim slot
//! - a compare-and-set reservation admits one attempt per slot at a time
//! - a poller waits for the remote minting task and reconciles the record
//!   with its outcome, releasing the slot on any failure

pub mod claim;
pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod logging;
pub mod poller;
pub mod store;

// Re-export commonly used types for convenience
pub use error::{
    ApiError, AuthError, ClaimError, ConfigError, DeployError, MintError, MintResult, PollError,
    SetupError, StoreError,
};

// Re-export the store and claim state machine
pub use store::{
    ClaimKey, ClaimRecord, ClaimStatus, MemoryStatusStore, MintKind, SqliteStatusStore, StatusStore,
};
pub use claim::{ClaimCoordinator, ClaimOutcome, FailurePolicy, Reservation};

// Re-export polling and execution
pub use poller::{PollTarget, PollerConfig, TaskPoller, TaskProgress};
pub use executor::{MintExecutor, MintOutcome, MintParams};
pub use deploy::ContractDeployer;

// Re-export collaborator interfaces
pub use client::{
    AddressBook, AuthClient, ContractClient, Credential, FileClient, MetadataClient, MetadataRef, MintApi, MintClient,
    MintTaskSnapshot, RainbowClient, TaskHandle, TokenReference,
};

// Re-export configuration interfaces
pub use config::{ApiConfig, MintClaimConfig};

// Re-export the cancellation token callers share with the executor
pub use tokio_util::sync::CancellationToken;
