//! Admin contract deployment
//!
//! Deploys the contract custom mints target and waits for its on-chain
//! address with the same poller used for mint tasks.

use tracing::info;
use crate::client::{AuthClient, ContractClient, ContractDeployRequest};
use crate::error::DeployError;
use crate::poller::TaskPoller;

/// Deploys contracts through the minting service
#[derive(Debug)]
pub struct ContractDeployer<C> {
    client: C,
    poller: TaskPoller,
    chain: String,
    contract_type: String,
}

impl<C: AuthClient + ContractClient> ContractDeployer<C> {
    pub fn new(client: C, poller: TaskPoller, chain: impl Into<String>, contract_type: impl Into<String>) -> Self {
        Self {
            client,
            poller,
            chain: chain.into(),
            contract_type: contract_type.into(),
        }
    }

    /// Deploy a contract owned by `owner_address` and return its address
    pub async fn deploy(&self, name: &str, symbol: &str, owner_address: &str) -> Result<String, DeployError> {
        let credential = self.client.login().await?;
        let request = ContractDeployRequest {
            chain: self.chain.clone(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            owner_address: owner_address.to_string(),
            contract_type: self.contract_type.clone(),
        };

        let task = self.client.submit_contract_deploy(&credential, &request).await?;
        info!(task_id = %task, %name, %symbol, "Contract deployment submitted");

        let address = self
            .poller
            .wait_for_completion(&task, || self.client.fetch_contract_snapshot(&task, &credential))
            .await?;
        info!(task_id = %task, %address, "Contract deployed");
        Ok(address)
    }
}
