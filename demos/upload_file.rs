//! Upload an asset and print the `file_url` to put in a mint template
//!
//! Usage: `cargo run --example upload_file -- <file-path>`

use std::path::PathBuf;
use anyhow::{Context, Result};
use mintclaim::logging;
use mintclaim::{AuthClient, FileClient, MintClaimConfig, RainbowClient};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = logging::init_from_env() {
        eprintln!("Failed to initialize logging: {}", err);
    }

    let file = PathBuf::from(std::env::args().nth(1).context("missing file path")?);

    let path = std::env::var("MINTCLAIM_CONFIG").unwrap_or_else(|_| "mintclaim.toml".to_string());
    let config = MintClaimConfig::from_file(&path).with_context(|| format!("loading {}", path))?;

    let client = RainbowClient::new(config.api.clone())?;
    let credential = client.login().await?;
    let file_url = client
        .upload_file(&credential, &file)
        .await
        .with_context(|| format!("uploading {}", file.display()))?;

    println!("{}", file_url);
    Ok(())
}
