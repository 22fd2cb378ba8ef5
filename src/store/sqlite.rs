//! SQLite-backed claim status store
//!
//! Every reservation runs inside a `BEGIN IMMEDIATE` transaction, which takes
//! the database write lock before the status is read. The read-compare-write
//! is therefore atomic across threads of this process (they also share one
//! connection mutex) and across processes opening the same file.
//!
//! The single connection serializes every key, unrelated ones included. Each
//! operation is one short statement or transaction, so the store never holds
//! the mutex across network I/O and contention is bounded by write latency.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};
use crate::error::StoreError;
use super::{parse_status, ClaimKey, ClaimRecord, ClaimStatus, MintKind, StatusStore};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable status store in a single SQLite file
#[derive(Debug)]
pub struct SqliteStatusStore {
    db: Mutex<Connection>,
}

impl SqliteStatusStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS namespaces (
            name TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS claims (
            namespace TEXT NOT NULL REFERENCES namespaces(name),
            address TEXT NOT NULL,
            status TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (namespace, address)
        );

        CREATE INDEX IF NOT EXISTS idx_claims_status
        ON claims(namespace, status);
    ";

    /// Open or create the store at `path`
    ///
    /// Creating the schema and both namespaces is idempotent, so this is safe
    /// to call on every start.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::unavailable("open", format!("{}: {}", parent.display(), e)))?;
            }
        }

        let db = Connection::open(path)
            .map_err(|e| StoreError::unavailable("open", format!("{}: {}", path.display(), e)))?;
        let store = Self::initialize(db)?;
        info!(path = %path.display(), "Opened claim status store");
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Connection::open_in_memory().map_err(|e| StoreError::unavailable("open", e))?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self, StoreError> {
        db.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::unavailable("initialize", e))?;
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;")
            .map_err(|e| StoreError::unavailable("initialize", e))?;
        db.execute_batch(Self::SCHEMA)
            .map_err(|e| StoreError::unavailable("initialize", e))?;
        for kind in MintKind::ALL {
            db.execute(
                "INSERT OR IGNORE INTO namespaces (name) VALUES (?1)",
                params![kind.namespace()],
            )
            .map_err(|e| StoreError::unavailable("initialize", e))?;
        }
        Ok(Self { db: Mutex::new(db) })
    }

    fn connection(&self, operation: &str) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db
            .lock()
            .map_err(|_| StoreError::unavailable(operation, "connection mutex poisoned"))
    }
}

fn read_record(
    db: &Connection,
    key: &ClaimKey,
) -> Result<Option<ClaimRecord>, StoreError> {
    let row: Option<(String, String)> = db
        .query_row(
            "SELECT status, updated_at FROM claims WHERE namespace = ?1 AND address = ?2",
            params![key.kind.namespace(), key.address],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| StoreError::unavailable("get", e))?;

    row.map(|(status, updated_at)| -> Result<ClaimRecord, StoreError> {
        let status = parse_status(key, &status)?;
        let updated_at = parse_timestamp(key, updated_at)?;
        Ok(ClaimRecord { status, updated_at })
    })
    .transpose()
}

fn parse_timestamp(key: &ClaimKey, value: String) -> Result<DateTime<Utc>, StoreError> {
    match DateTime::parse_from_rfc3339(&value) {
        Ok(timestamp) => Ok(timestamp.with_timezone(&Utc)),
        Err(_) => Err(StoreError::Corrupt {
            key: key.to_string(),
            value,
        }),
    }
}

fn write_status(db: &Connection, key: &ClaimKey, status: ClaimStatus) -> rusqlite::Result<usize> {
    db.execute(
        "INSERT INTO claims (namespace, address, status, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(namespace, address)
         DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at",
        params![
            key.kind.namespace(),
            key.address,
            status.as_str(),
            Utc::now().to_rfc3339()
        ],
    )
}

impl StatusStore for SqliteStatusStore {
    fn record(&self, key: &ClaimKey) -> Result<Option<ClaimRecord>, StoreError> {
        let db = self.connection("get")?;
        read_record(&db, key)
    }

    fn set(&self, key: &ClaimKey, status: ClaimStatus) -> Result<(), StoreError> {
        let db = self.connection("set")?;
        write_status(&db, key, status).map_err(|e| StoreError::unavailable("set", e))?;
        debug!(key = %key, status = %status, "Stored claim status");
        Ok(())
    }

    fn compare_and_set(
        &self,
        key: &ClaimKey,
        expected: ClaimStatus,
        next: ClaimStatus,
    ) -> Result<bool, StoreError> {
        let mut db = self.connection("compare_and_set")?;
        let tx = db
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::unavailable("compare_and_set", e))?;

        let current = read_record(&tx, key)?
            .map(|record| record.status)
            .unwrap_or(ClaimStatus::NotStarted);
        if current != expected {
            debug!(key = %key, %current, %expected, "Compare-and-set refused");
            return Ok(false);
        }

        write_status(&tx, key, next).map_err(|e| StoreError::unavailable("compare_and_set", e))?;
        tx.commit()
            .map_err(|e| StoreError::unavailable("compare_and_set", e))?;
        debug!(key = %key, from = %expected, to = %next, "Compare-and-set applied");
        Ok(true)
    }

    fn addresses_with_status(
        &self,
        kind: MintKind,
        status: ClaimStatus,
    ) -> Result<Vec<String>, StoreError> {
        let db = self.connection("list")?;
        let mut stmt = db
            .prepare(
                "SELECT address FROM claims
                 WHERE namespace = ?1 AND status = ?2
                 ORDER BY address ASC",
            )
            .map_err(|e| StoreError::unavailable("list", e))?;
        let rows = stmt
            .query_map(params![kind.namespace(), status.as_str()], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::unavailable("list", e))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::unavailable("list", e))
    }

    fn fail_stale_in_progress(
        &self,
        kind: MintKind,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let mut db = self.connection("recover")?;
        let tx = db
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::unavailable("recover", e))?;

        let candidates: Vec<(String, String)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT address, updated_at FROM claims
                     WHERE namespace = ?1 AND status = ?2
                     ORDER BY address ASC",
                )
                .map_err(|e| StoreError::unavailable("recover", e))?;
            let rows = stmt
                .query_map(params![kind.namespace(), ClaimStatus::InProgress.as_str()], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .map_err(|e| StoreError::unavailable("recover", e))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::unavailable("recover", e))?
        };

        let mut released = Vec::new();
        for (address, updated_at) in candidates {
            let key = ClaimKey::new(address, kind);
            let updated_at = parse_timestamp(&key, updated_at)?;
            if updated_at <= cutoff {
                write_status(&tx, &key, ClaimStatus::Failed)
                    .map_err(|e| StoreError::unavailable("recover", e))?;
                released.push(key.address);
            }
        }

        tx.commit().map_err(|e| StoreError::unavailable("recover", e))?;
        Ok(released)
    }
}
