//! Claim a single token from the command line
//!
//! Usage: `cargo run --example claim_once -- <address> [easy|custom]`
//!
//! The configuration file is read from `MINTCLAIM_CONFIG` (default
//! `mintclaim.toml`). Ctrl-C cancels the attempt and releases the claim.

use anyhow::{bail, Context, Result};
use mintclaim::logging;
use mintclaim::{CancellationToken, MintClaimConfig, MintExecutor, MintKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = logging::init_from_env() {
        eprintln!("Failed to initialize logging: {}", err);
    }

    let mut args = std::env::args().skip(1);
    let address = args.next().context("missing recipient address")?;
    let kind = match args.next().as_deref() {
        None | Some("easy") => MintKind::Easy,
        Some("custom") => MintKind::Custom,
        Some(other) => bail!("unknown mint kind {:?}, expected easy or custom", other),
    };

    let path = std::env::var("MINTCLAIM_CONFIG").unwrap_or_else(|_| "mintclaim.toml".to_string());
    let config = MintClaimConfig::from_file(&path).with_context(|| format!("loading {}", path))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let executor = MintExecutor::from_config(&config, cancel)?;
    match executor.claim(&address, kind).await {
        Ok(outcome) => {
            let link = outcome.explorer_url(&config.template(kind).explorer_prefix);
            info!(%address, token_id = outcome.token_id, %link, "Token minted");
            println!("{}", link);
            Ok(())
        }
        Err(err) if err.is_rejection() => {
            info!(%address, %kind, reason = %err, "Claim refused");
            println!("{}", err);
            Ok(())
        }
        Err(err) => {
            error!(%address, %kind, error = %err, "Claim failed");
            Err(err.into())
        }
    }
}
