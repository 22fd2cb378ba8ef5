//! Bind a chat user to an address, or show the current binding
//!
//! Usage: `cargo run --example bind_address -- <user-id> [address]`

use anyhow::{Context, Result};
use mintclaim::logging;
use mintclaim::{AddressBook, MintClaimConfig, RainbowClient};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = logging::init_from_env() {
        eprintln!("Failed to initialize logging: {}", err);
    }

    let mut args = std::env::args().skip(1);
    let user_id = args.next().context("missing user id")?;

    let path = std::env::var("MINTCLAIM_CONFIG").unwrap_or_else(|_| "mintclaim.toml".to_string());
    let config = MintClaimConfig::from_file(&path).with_context(|| format!("loading {}", path))?;
    let client = RainbowClient::new(config.api.clone())?;

    if let Some(address) = args.next() {
        client.bind_address(&user_id, &address).await?;
    }

    match client.bound_address(&user_id).await? {
        Some(address) => println!("{} -> {}", user_id, address),
        None => println!("{} has not bound an address", user_id),
    }
    Ok(())
}
