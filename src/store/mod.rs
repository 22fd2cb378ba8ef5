//! Durable claim status storage
//!
//! Claim status is kept per address in two independent namespaces, one per
//! mint kind, so the same address holds separate easy-mint and custom-mint
//! allowances. Absent records read as [`ClaimStatus::NotStarted`].

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStatusStore;
pub use sqlite::SqliteStatusStore;

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// Lifecycle of a single claim slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    NotStarted,
    InProgress,
    Success,
    Failed,
}

impl ClaimStatus {
    /// Literal token written to the store
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::NotStarted => "NotStarted",
            ClaimStatus::InProgress => "InProgress",
            ClaimStatus::Success => "Success",
            ClaimStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotStarted" => Ok(ClaimStatus::NotStarted),
            "InProgress" => Ok(ClaimStatus::InProgress),
            "Success" => Ok(ClaimStatus::Success),
            "Failed" => Ok(ClaimStatus::Failed),
            other => Err(other.to_string()),
        }
    }
}

/// Minting path; each kind is its own allowance namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MintKind {
    /// Platform-owned factory contract
    Easy,
    /// Admin-deployed contract
    Custom,
}

impl MintKind {
    pub const ALL: [MintKind; 2] = [MintKind::Easy, MintKind::Custom];

    /// Store namespace holding this kind's records
    pub fn namespace(&self) -> &'static str {
        match self {
            MintKind::Easy => "easy-mint",
            MintKind::Custom => "custom-mint",
        }
    }
}

impl fmt::Display for MintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

/// One allowance slot. Addresses are compared byte-for-byte; callers
/// normalize before building a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimKey {
    pub address: String,
    pub kind: MintKind,
}

impl ClaimKey {
    pub fn new(address: impl Into<String>, kind: MintKind) -> Self {
        Self {
            address: address.into(),
            kind,
        }
    }

    pub fn easy(address: impl Into<String>) -> Self {
        Self::new(address, MintKind::Easy)
    }

    pub fn custom(address: impl Into<String>) -> Self {
        Self::new(address, MintKind::Custom)
    }
}

impl fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.namespace(), self.address)
    }
}

/// Persisted value for a claim key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub status: ClaimStatus,
    pub updated_at: DateTime<Utc>,
}

/// Durable mapping from [`ClaimKey`] to claim status
///
/// Implementations must make `compare_and_set` linearizable for a given key
/// across every caller sharing the store.
pub trait StatusStore: Send + Sync {
    /// Full record for a key, `None` if it was never written
    fn record(&self, key: &ClaimKey) -> Result<Option<ClaimRecord>, StoreError>;

    /// Upsert the status for a key
    fn set(&self, key: &ClaimKey, status: ClaimStatus) -> Result<(), StoreError>;

    /// Set `next` only if the current status equals `expected`
    fn compare_and_set(
        &self,
        key: &ClaimKey,
        expected: ClaimStatus,
        next: ClaimStatus,
    ) -> Result<bool, StoreError>;

    /// Addresses in a namespace currently holding `status`
    fn addresses_with_status(
        &self,
        kind: MintKind,
        status: ClaimStatus,
    ) -> Result<Vec<String>, StoreError>;

    /// Atomically move every `InProgress` record of `kind` last written at or
    /// before `cutoff` to `Failed`, returning the released addresses
    fn fail_stale_in_progress(
        &self,
        kind: MintKind,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError>;

    /// Current status, `NotStarted` when no record exists
    fn get(&self, key: &ClaimKey) -> Result<ClaimStatus, StoreError> {
        Ok(self
            .record(key)?
            .map(|record| record.status)
            .unwrap_or(ClaimStatus::NotStarted))
    }
}

impl<S: StatusStore + ?Sized> StatusStore for std::sync::Arc<S> {
    fn record(&self, key: &ClaimKey) -> Result<Option<ClaimRecord>, StoreError> {
        (**self).record(key)
    }

    fn set(&self, key: &ClaimKey, status: ClaimStatus) -> Result<(), StoreError> {
        (**self).set(key, status)
    }

    fn compare_and_set(
        &self,
        key: &ClaimKey,
        expected: ClaimStatus,
        next: ClaimStatus,
    ) -> Result<bool, StoreError> {
        (**self).compare_and_set(key, expected, next)
    }

    fn addresses_with_status(
        &self,
        kind: MintKind,
        status: ClaimStatus,
    ) -> Result<Vec<String>, StoreError> {
        (**self).addresses_with_status(kind, status)
    }

    fn fail_stale_in_progress(
        &self,
        kind: MintKind,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        (**self).fail_stale_in_progress(kind, cutoff)
    }

    fn get(&self, key: &ClaimKey) -> Result<ClaimStatus, StoreError> {
        (**self).get(key)
    }
}

pub(crate) fn parse_status(key: &ClaimKey, value: &str) -> Result<ClaimStatus, StoreError> {
    value.parse().map_err(|value| StoreError::Corrupt {
        key: key.to_string(),
        value,
    })
}
