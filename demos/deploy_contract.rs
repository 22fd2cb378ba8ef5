//! Deploy the contract custom mints are sent through
//!
//! Usage: `cargo run --example deploy_contract -- <name> <symbol> <owner-address>`
//!
//! Prints the deployed address, ready for `custom_mint.contract_address`.

use anyhow::{Context, Result};
use mintclaim::logging;
use mintclaim::{ContractDeployer, MintClaimConfig, RainbowClient, TaskPoller};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = logging::init_from_env() {
        eprintln!("Failed to initialize logging: {}", err);
    }

    let mut args = std::env::args().skip(1);
    let name = args.next().context("missing contract name")?;
    let symbol = args.next().context("missing contract symbol")?;
    let owner = args.next().context("missing owner address")?;

    let path = std::env::var("MINTCLAIM_CONFIG").unwrap_or_else(|_| "mintclaim.toml".to_string());
    let config = MintClaimConfig::from_file(&path).with_context(|| format!("loading {}", path))?;

    let client = RainbowClient::new(config.api.clone())?;
    let poller = TaskPoller::new(config.poller.to_poller_config());
    let deployer = ContractDeployer::new(client, poller, config.api.chain.clone(), config.contract.contract_type.clone());

    let address = deployer.deploy(&name, &symbol, &owner).await?;
    println!("{}", address);
    Ok(())
}
