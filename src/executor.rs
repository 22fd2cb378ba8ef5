//! End-to-end mint attempts
//!
//! [`MintExecutor::execute`] reserves the claim slot, logs in, optionally
//! creates metadata, submits the mint and waits for the remote task. The
//! reservation guard is completed only after the poller reports a token; every
//! other exit releases it as `Failed`.
//!
//! Store calls are synchronous and run on the calling task's thread. With the
//! SQLite store a contended write can block that worker for up to the busy
//! timeout; each call is a single short transaction otherwise. Dropping an
//! unfinished attempt writes `Failed` from the guard's `Drop` the same way.

use std::collections::HashMap;
use std::future::Future;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;
use crate::claim::ClaimCoordinator;
use crate::client::{AddressBook, CustomMintRequest, EasyMintRequest, MintApi, RainbowClient, TaskHandle};
use crate::config::MintClaimConfig;
use crate::error::{MintError, MintResult, SetupError};
use crate::poller::TaskPoller;
use crate::store::{ClaimKey, MintKind, SqliteStatusStore, StatusStore};

/// What to mint for a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    pub chain: String,
    pub name: String,
    pub description: String,
    /// Asset the token points at
    pub asset_url: String,
    /// Target contract, required for custom mints
    pub contract_address: Option<String>,
}

/// A successfully minted token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintOutcome {
    /// Address the token was minted to
    pub address: String,
    pub kind: MintKind,
    pub token_id: u64,
    pub contract_address: Option<String>,
}

impl MintOutcome {
    /// Block explorer link for the token
    ///
    /// Easy mints link by token id alone; custom mints include the contract.
    pub fn explorer_url(&self, prefix: &str) -> String {
        match (self.kind, self.contract_address.as_deref()) {
            (MintKind::Custom, Some(contract)) => format!("{}{}/{}", prefix, contract, self.token_id),
            _ => format!("{}{}", prefix, self.token_id),
        }
    }
}

/// Runs mint attempts against one store and one minting service
#[derive(Debug)]
pub struct MintExecutor<S, C> {
    coordinator: ClaimCoordinator<S>,
    client: C,
    poller: TaskPoller,
    templates: HashMap<MintKind, MintParams>,
}

impl<S: StatusStore, C: MintApi> MintExecutor<S, C> {
    pub fn new(coordinator: ClaimCoordinator<S>, client: C, poller: TaskPoller) -> Self {
        Self {
            coordinator,
            client,
            poller,
            templates: HashMap::new(),
        }
    }

    /// Parameters used by [`MintExecutor::claim`] for `kind`
    pub fn with_template(mut self, kind: MintKind, params: MintParams) -> Self {
        self.templates.insert(kind, params);
        self
    }

    pub fn coordinator(&self) -> &ClaimCoordinator<S> {
        &self.coordinator
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Token that aborts in-flight attempts; their claims end up `Failed`
    pub fn cancellation(&self) -> &CancellationToken {
        self.poller.cancellation()
    }

    /// Claim a token for `address` using the configured template for `kind`
    pub async fn claim(&self, address: &str, kind: MintKind) -> MintResult<MintOutcome> {
        let params = self.templates.get(&kind).ok_or_else(|| MintError::InvalidParams {
            message: format!("no mint template configured for {}", kind),
        })?;
        self.execute(&ClaimKey::new(address, kind), params).await
    }

    /// Run one attempt for `key`
    ///
    /// Rejections happen before any remote call. Once reserved, the returned
    /// result and the persisted status always agree.
    pub async fn execute(&self, key: &ClaimKey, params: &MintParams) -> MintResult<MintOutcome> {
        if key.kind == MintKind::Custom && params.contract_address.is_none() {
            return Err(MintError::InvalidParams {
                message: "custom mint requires a contract address".to_string(),
            });
        }

        let attempt_id = Uuid::new_v4();
        let reservation = self.coordinator.reserve(key)?;
        info!(%attempt_id, key = %key, "Starting mint attempt");

        match self.run_attempt(key, params, attempt_id).await {
            Ok(outcome) => {
                if let Err(source) = reservation.complete() {
                    error!(
                        %attempt_id,
                        key = %key,
                        token_id = outcome.token_id,
                        error = %source,
                        "Token minted but claim success could not be recorded"
                    );
                    return Err(MintError::Unrecorded {
                        outcome: Box::new(outcome),
                        source,
                    });
                }
                info!(
                    %attempt_id,
                    key = %key,
                    token_id = outcome.token_id,
                    "Mint attempt succeeded"
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(%attempt_id, key = %key, error = %err, "Mint attempt failed");
                if let Err(store_err) = reservation.release() {
                    warn!(%attempt_id, key = %key, error = %store_err, "Could not release failed claim");
                }
                Err(err)
            }
        }
    }

    async fn run_attempt(&self, key: &ClaimKey, params: &MintParams, attempt_id: Uuid) -> MintResult<MintOutcome> {
        let credential = self.step("login", self.client.login()).await?.map_err(MintError::Auth)?;

        let task: TaskHandle = match key.kind {
            MintKind::Easy => {
                let request = EasyMintRequest {
                    chain: params.chain.clone(),
                    name: params.name.clone(),
                    description: params.description.clone(),
                    file_url: params.asset_url.clone(),
                    mint_to_address: key.address.clone(),
                };
                self.step("submit", self.client.submit_easy_mint(&credential, &request))
                    .await?
                    .map_err(MintError::Submit)?
            }
            MintKind::Custom => {
                let contract_address = params.contract_address.clone().unwrap_or_default();
                let metadata = self
                    .step(
                        "metadata",
                        self.client.create_metadata(&credential, &params.asset_url, &params.name, &params.description),
                    )
                    .await?
                    .map_err(MintError::Metadata)?;
                let request = CustomMintRequest {
                    chain: params.chain.clone(),
                    contract_address,
                    mint_to_address: key.address.clone(),
                    metadata_uri: metadata.0,
                };
                self.step("submit", self.client.submit_custom_mint(&credential, &request))
                    .await?
                    .map_err(MintError::Submit)?
            }
        };
        info!(%attempt_id, key = %key, task_id = %task, "Mint submitted, waiting for token");

        let token = self
            .poller
            .wait_for_completion(&task, || self.client.fetch_task_snapshot(&task, &credential))
            .await?;

        Ok(MintOutcome {
            address: key.address.clone(),
            kind: key.kind,
            token_id: token.token_id,
            contract_address: token.contract_address.or_else(|| params.contract_address.clone()),
        })
    }

    /// Await a collaborator call unless the executor is cancelled first
    async fn step<F: Future>(&self, step: &str, call: F) -> MintResult<F::Output> {
        tokio::select! {
            biased;
            _ = self.poller.cancellation().cancelled() => Err(MintError::Cancelled { step: step.to_string() }),
            output = call => Ok(output),
        }
    }
}

impl<S: StatusStore, C: MintApi + AddressBook> MintExecutor<S, C> {
    /// Claim for the address a chat user has bound
    ///
    /// A user without a binding is rejected before any claim slot is touched.
    pub async fn claim_for_user(&self, user_id: &str, kind: MintKind) -> MintResult<MintOutcome> {
        let address = self
            .step("lookup", self.client.bound_address(user_id))
            .await?
            .map_err(MintError::Lookup)?
            .ok_or_else(|| MintError::InvalidParams {
                message: format!("user {} has not bound an address", user_id),
            })?;
        info!(%user_id, %address, %kind, "Resolved bound address");
        self.claim(&address, kind).await
    }
}

impl MintExecutor<SqliteStatusStore, RainbowClient> {
    /// Open the configured store and HTTP client and load both mint templates
    ///
    /// When enabled, claims left `InProgress` longer than the recovery grace
    /// are released before the executor is returned.
    pub fn from_config(config: &MintClaimConfig, cancel: CancellationToken) -> Result<Self, SetupError> {
        config.validate()?;

        let store = SqliteStatusStore::open(&config.store.path)?;
        let coordinator = ClaimCoordinator::new(store).with_policy(config.claims.failure_policy);
        if config.claims.recover_interrupted_on_start {
            let recovered = coordinator.recover_interrupted(config.claims.recovery_grace())?;
            if recovered > 0 {
                warn!(recovered, "Released claims interrupted by the previous run");
            }
        }

        let client = RainbowClient::new(config.api.clone())?;
        let poller = TaskPoller::new(config.poller.to_poller_config()).with_cancellation(cancel);

        let mut executor = Self::new(coordinator, client, poller);
        for kind in MintKind::ALL {
            executor = executor.with_template(kind, config.mint_params(kind));
        }
        Ok(executor)
    }
}
