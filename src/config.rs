//! Configuration management for the mint claim bot

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::claim::FailurePolicy;
use crate::error::ConfigError;
use crate::executor::MintParams;
use crate::poller::PollerConfig;
use crate::store::MintKind;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MintClaimConfig {
    /// Claim status store
    pub store: StoreConfig,
    /// Claim policy
    pub claims: ClaimsConfig,
    /// Remote task polling
    pub poller: PollingConfig,
    /// Minting service endpoints and credentials
    pub api: ApiConfig,
    /// Template for easy mints
    pub easy_mint: MintTemplateConfig,
    /// Template for custom mints
    pub custom_mint: MintTemplateConfig,
    /// Contract deployment defaults
    pub contract: ContractConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("claims.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimsConfig {
    /// Whether a failed attempt frees the slot
    pub failure_policy: FailurePolicy,
    /// Reset records left `InProgress` by a dead process on startup
    pub recover_interrupted_on_start: bool,
    /// Age in seconds after which an `InProgress` record counts as abandoned
    pub recovery_grace_secs: u64,
}

impl ClaimsConfig {
    pub fn recovery_grace(&self) -> Duration {
        Duration::from_secs(self.recovery_grace_secs)
    }
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::AllowRetry,
            recover_interrupted_on_start: true,
            recovery_grace_secs: 1800, // 30 minutes
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between task status fetches
    pub interval_secs: u64,
    /// Maximum fetches per task, unbounded when absent
    pub max_attempts: Option<u32>,
    /// Maximum seconds spent waiting per task, unbounded when absent
    pub max_duration_secs: Option<u64>,
    /// Consecutive failed fetches tolerated
    pub transport_retries: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_attempts: None,
            max_duration_secs: Some(900),  // 15 minutes
            transport_retries: 0,
        }
    }
}

impl PollingConfig {
    pub fn to_poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.interval_secs),
            max_attempts: self.max_attempts,
            max_duration: self.max_duration_secs.map(Duration::from_secs),
            transport_retries: self.transport_retries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the minting service
    pub host: String,
    /// Full login endpoint
    pub login_url: String,
    pub app_id: String,
    pub app_secret: String,
    /// Chain name sent with every request
    pub chain: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "http://127.0.0.1:8080/".to_string(),
            login_url: "http://127.0.0.1:8080/v1/login".to_string(),
            app_id: String::new(),
            app_secret: String::new(),
            chain: "conflux_test".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// What a claimed token looks like
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MintTemplateConfig {
    pub name: String,
    pub description: String,
    /// Asset the token points at
    pub file_url: String,
    /// Target contract, required for custom mints
    pub contract_address: Option<String>,
    /// Block explorer prefix used to link minted tokens
    pub explorer_prefix: String,
}

impl MintTemplateConfig {
    pub fn to_params(&self, chain: &str) -> MintParams {
        MintParams {
            chain: chain.to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            asset_url: self.file_url.clone(),
            contract_address: self.contract_address.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Token standard of deployed contracts
    pub contract_type: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            contract_type: "erc721".to_string(),
        }
    }
}

impl MintClaimConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::new("config_file", format!("Failed to read config file: {}", e)))?;

        let config: MintClaimConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::new("config_format", format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::new("config_serialization", format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::new("config_write", format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::new("store.path", "Store path must not be empty"));
        }

        if self.poller.interval_secs == 0 {
            return Err(ConfigError::new("poller.interval_secs", "Poll interval must be greater than 0"));
        }

        if self.poller.max_attempts == Some(0) {
            return Err(ConfigError::new("poller.max_attempts", "Max attempts must be greater than 0"));
        }

        if self.poller.max_duration_secs == Some(0) {
            return Err(ConfigError::new("poller.max_duration_secs", "Max duration must be greater than 0"));
        }

        for (field, url) in [("api.host", &self.api.host), ("api.login_url", &self.api.login_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::new(field, format!("Expected an http(s) URL, got {:?}", url)));
            }
        }

        if self.api.chain.is_empty() {
            return Err(ConfigError::new("api.chain", "Chain must not be empty"));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::new("api.request_timeout_secs", "Request timeout must be greater than 0"));
        }

        // A record younger than the longest possible attempt may still be held
        if self.claims.recover_interrupted_on_start {
            let Some(max_duration) = self.poller.max_duration_secs else {
                return Err(ConfigError::new(
                    "claims.recover_interrupted_on_start",
                    "Recovery requires poller.max_duration_secs to bound attempts",
                ));
            };
            let longest_attempt = max_duration.saturating_add(self.api.request_timeout_secs.saturating_mul(3));
            if self.claims.recovery_grace_secs <= longest_attempt {
                return Err(ConfigError::new(
                    "claims.recovery_grace_secs",
                    format!("Recovery grace must exceed the longest attempt ({}s)", longest_attempt),
                ));
            }
        }

        // Custom mints are optional, but a configured contract must be usable
        if matches!(self.custom_mint.contract_address.as_deref(), Some("")) {
            return Err(ConfigError::new(
                "custom_mint.contract_address",
                "Contract address must not be empty when set",
            ));
        }

        Ok(())
    }

    pub fn template(&self, kind: MintKind) -> &MintTemplateConfig {
        match kind {
            MintKind::Easy => &self.easy_mint,
            MintKind::Custom => &self.custom_mint,
        }
    }

    /// Mint parameters for a kind, built from its template
    pub fn mint_params(&self, kind: MintKind) -> MintParams {
        self.template(kind).to_params(&self.api.chain)
    }
}
