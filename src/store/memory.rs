//! Non-durable status store

use std::collections::HashMap;
use std::sync::Mutex;
use chrono::{DateTime, Utc};
use crate::error::StoreError;
use super::{ClaimKey, ClaimRecord, ClaimStatus, MintKind, StatusStore};

/// In-process status store with the same semantics as the SQLite store
///
/// Nothing survives a restart; meant for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    records: Mutex<HashMap<ClaimKey, ClaimRecord>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ClaimKey, ClaimRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::unavailable("lock", "status map poisoned"))
    }
}

impl StatusStore for MemoryStatusStore {
    fn record(&self, key: &ClaimKey) -> Result<Option<ClaimRecord>, StoreError> {
        Ok(self.records()?.get(key).cloned())
    }

    fn set(&self, key: &ClaimKey, status: ClaimStatus) -> Result<(), StoreError> {
        self.records()?.insert(
            key.clone(),
            ClaimRecord {
                status,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn compare_and_set(
        &self,
        key: &ClaimKey,
        expected: ClaimStatus,
        next: ClaimStatus,
    ) -> Result<bool, StoreError> {
        let mut records = self.records()?;
        let current = records
            .get(key)
            .map(|record| record.status)
            .unwrap_or(ClaimStatus::NotStarted);
        if current != expected {
            return Ok(false);
        }
        records.insert(
            key.clone(),
            ClaimRecord {
                status: next,
                updated_at: Utc::now(),
            },
        );
        Ok(true)
    }

    fn addresses_with_status(
        &self,
        kind: MintKind,
        status: ClaimStatus,
    ) -> Result<Vec<String>, StoreError> {
        let mut addresses: Vec<String> = self
            .records()?
            .iter()
            .filter(|(key, record)| key.kind == kind && record.status == status)
            .map(|(key, _)| key.address.clone())
            .collect();
        addresses.sort();
        Ok(addresses)
    }

    fn fail_stale_in_progress(
        &self,
        kind: MintKind,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let mut records = self.records()?;
        let now = Utc::now();
        let mut released = Vec::new();
        for (key, record) in records.iter_mut() {
            if key.kind == kind && record.status == ClaimStatus::InProgress && record.updated_at <= cutoff {
                record.status = ClaimStatus::Failed;
                record.updated_at = now;
                released.push(key.address.clone());
            }
        }
        released.sort();
        Ok(released)
    }
}
