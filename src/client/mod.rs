//! Interfaces to the remote minting service
//!
//! The orchestration core only talks to the service through these traits.
//! [`RainbowClient`] implements all of them over HTTP.

pub mod rainbow;

pub use rainbow::RainbowClient;

use std::fmt;
use std::future::Future;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{ApiError, AuthError};
use crate::poller::{PollTarget, TaskProgress};

/// Bearer token returned by login
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// URI of metadata created on the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRef(pub String);

/// Opaque id of a submitted remote task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mint through the platform's factory contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EasyMintRequest {
    pub chain: String,
    pub name: String,
    pub description: String,
    pub file_url: String,
    pub mint_to_address: String,
}

/// Mint through an admin-deployed contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMintRequest {
    pub chain: String,
    pub contract_address: String,
    pub mint_to_address: String,
    pub metadata_uri: String,
}

/// Deploy a new token contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDeployRequest {
    pub chain: String,
    pub name: String,
    pub symbol: String,
    pub owner_address: String,
    #[serde(rename = "type")]
    pub contract_type: String,
}

/// Processing state code used by the service for tasks and deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum TaskStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl From<u32> for TaskStatus {
    fn from(code: u32) -> Self {
        match code {
            1 => TaskStatus::Success,
            2 => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        }
    }
}

impl From<TaskStatus> for u32 {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => 0,
            TaskStatus::Success => 1,
            TaskStatus::Failed => 2,
        }
    }
}

/// The minted token, once known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReference {
    pub token_id: u64,
    pub contract_address: Option<String>,
}

/// Point-in-time view of a mint task
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MintTaskSnapshot {
    pub id: u64,
    pub token_id: u64,
    pub status: TaskStatus,
    pub contract: Option<String>,
    pub hash: Option<String>,
    pub error: Option<String>,
}

impl PollTarget for MintTaskSnapshot {
    type Output = TokenReference;

    fn progress(self) -> TaskProgress<TokenReference> {
        if self.status == TaskStatus::Failed {
            let message = self
                .error
                .filter(|error| !error.is_empty())
                .unwrap_or_else(|| format!("mint task {} failed", self.id));
            return TaskProgress::Failed(message);
        }
        if self.token_id != 0 || self.status == TaskStatus::Success {
            return TaskProgress::Completed(TokenReference {
                token_id: self.token_id,
                contract_address: self.contract.filter(|contract| !contract.is_empty()),
            });
        }
        TaskProgress::Pending
    }
}

/// Point-in-time view of a contract deployment
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractSnapshot {
    pub id: u64,
    pub address: String,
    pub status: TaskStatus,
    pub hash: Option<String>,
    pub error: Option<String>,
}

impl PollTarget for ContractSnapshot {
    type Output = String;

    fn progress(self) -> TaskProgress<String> {
        if self.status == TaskStatus::Failed {
            let message = self
                .error
                .filter(|error| !error.is_empty())
                .unwrap_or_else(|| format!("contract deployment {} failed", self.id));
            return TaskProgress::Failed(message);
        }
        if !self.address.is_empty() {
            return TaskProgress::Completed(self.address);
        }
        TaskProgress::Pending
    }
}

/// Obtains an access credential
pub trait AuthClient: Send + Sync {
    fn login(&self) -> impl Future<Output = Result<Credential, AuthError>> + Send;
}

/// Creates token metadata for custom mints
pub trait MetadataClient: Send + Sync {
    fn create_metadata(
        &self,
        credential: &Credential,
        asset_url: &str,
        name: &str,
        description: &str,
    ) -> impl Future<Output = Result<MetadataRef, ApiError>> + Send;
}

/// Submits mints and reports task progress
pub trait MintClient: Send + Sync {
    fn submit_easy_mint(
        &self,
        credential: &Credential,
        request: &EasyMintRequest,
    ) -> impl Future<Output = Result<TaskHandle, ApiError>> + Send;

    fn submit_custom_mint(
        &self,
        credential: &Credential,
        request: &CustomMintRequest,
    ) -> impl Future<Output = Result<TaskHandle, ApiError>> + Send;

    fn fetch_task_snapshot(
        &self,
        task: &TaskHandle,
        credential: &Credential,
    ) -> impl Future<Output = Result<MintTaskSnapshot, ApiError>> + Send;
}

/// Deploys contracts and reports deployment progress
pub trait ContractClient: Send + Sync {
    fn submit_contract_deploy(
        &self,
        credential: &Credential,
        request: &ContractDeployRequest,
    ) -> impl Future<Output = Result<TaskHandle, ApiError>> + Send;

    fn fetch_contract_snapshot(
        &self,
        task: &TaskHandle,
        credential: &Credential,
    ) -> impl Future<Output = Result<ContractSnapshot, ApiError>> + Send;
}

/// Maps chat users to the address their tokens are minted to
pub trait AddressBook: Send + Sync {
    fn bind_address(&self, user_id: &str, address: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Address bound to `user_id`, `None` if the user never bound one
    fn bound_address(&self, user_id: &str) -> impl Future<Output = Result<Option<String>, ApiError>> + Send;
}

/// Uploads assets that mint templates then reference by URL
pub trait FileClient: Send + Sync {
    /// Upload the file at `path` and return its `file_url`
    fn upload_file(
        &self,
        credential: &Credential,
        path: &Path,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;
}

/// Everything a mint attempt needs from the service
pub trait MintApi: AuthClient + MetadataClient + MintClient {}

impl<T: AuthClient + MetadataClient + MintClient> MintApi for T {}
