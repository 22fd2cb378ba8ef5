//! Claim state machine
//!
//! ```text
//! NotStarted ──┐
//!              ├──reserve──> InProgress ──complete──> Success (terminal)
//! Failed ──────┘                  └──────release────> Failed
//! ```
//!
//! Reservation goes through the store's compare-and-set, so at most one
//! attempt per key can hold `InProgress` at a time.

use std::time::Duration;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use crate::error::{ClaimError, StoreError};
use crate::store::{ClaimKey, ClaimStatus, MintKind, StatusStore};

/// Writes tried before a success is reported as unrecorded
const SUCCESS_WRITE_ATTEMPTS: u32 = 3;

/// What a `Failed` record means for later claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// A failed attempt frees the slot for a new attempt
    #[default]
    AllowRetry,
    /// A failed attempt consumes the slot until an operator resets it
    SingleAttempt,
}

/// Final status written when an attempt ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Success,
    Failed,
}

impl From<ClaimOutcome> for ClaimStatus {
    fn from(outcome: ClaimOutcome) -> Self {
        match outcome {
            ClaimOutcome::Success => ClaimStatus::Success,
            ClaimOutcome::Failed => ClaimStatus::Failed,
        }
    }
}

/// Enforces single-attempt semantics over a [`StatusStore`]
#[derive(Debug)]
pub struct ClaimCoordinator<S> {
    store: S,
    policy: FailurePolicy,
}

impl<S: StatusStore> ClaimCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current status of a claim slot
    pub fn status(&self, key: &ClaimKey) -> Result<ClaimStatus, StoreError> {
        self.store.get(key)
    }

    /// Atomically move `key` to `InProgress`
    ///
    /// The returned guard must be completed or released; if it is dropped
    /// first, the record is finalized as `Failed`. Rejections leave the
    /// store untouched.
    pub fn reserve(&self, key: &ClaimKey) -> Result<Reservation<'_, S>, ClaimError> {
        loop {
            let current = self.store.get(key)?;
            match current {
                ClaimStatus::InProgress => {
                    return Err(ClaimError::AlreadyInProgress { key: key.to_string() });
                }
                ClaimStatus::Success => {
                    return Err(ClaimError::AlreadyCompleted { key: key.to_string() });
                }
                ClaimStatus::Failed if self.policy == FailurePolicy::SingleAttempt => {
                    return Err(ClaimError::AttemptConsumed { key: key.to_string() });
                }
                ClaimStatus::NotStarted | ClaimStatus::Failed => {}
            }

            if self.store.compare_and_set(key, current, ClaimStatus::InProgress)? {
                info!(key = %key, previous = %current, "Claim reserved");
                return Ok(Reservation {
                    coordinator: self,
                    key: key.clone(),
                    finalized: false,
                });
            }

            // Lost the race; the next read reports the winner's state.
            debug!(key = %key, observed = %current, "Reservation raced, re-reading status");
        }
    }

    /// Unconditionally record the outcome of an attempt
    pub fn finalize(&self, key: &ClaimKey, outcome: ClaimOutcome) -> Result<(), StoreError> {
        let status = ClaimStatus::from(outcome);
        self.store.set(key, status)?;
        info!(key = %key, status = %status, "Claim finalized");
        Ok(())
    }

    /// Mark records left `InProgress` by a dead process as `Failed`
    ///
    /// Only records untouched for at least `stale_after` are released, so a
    /// reservation still held by another live process sharing the store is
    /// left alone. `stale_after` must exceed the longest attempt. Returns the
    /// number of records moved.
    pub fn recover_interrupted(&self, stale_after: Duration) -> Result<usize, StoreError> {
        let cutoff = match chrono::Duration::from_std(stale_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        {
            Some(cutoff) => cutoff,
            None => return Ok(0),
        };

        let mut recovered = 0;
        for kind in MintKind::ALL {
            for address in self.store.fail_stale_in_progress(kind, cutoff)? {
                warn!(key = %ClaimKey::new(address, kind), "Recovered claim interrupted by a restart");
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}

/// A held `InProgress` reservation
///
/// Dropping the guard without calling [`Reservation::complete`] or
/// [`Reservation::release`] marks the claim `Failed`, which covers early
/// returns, panics and cancelled futures.
#[derive(Debug)]
#[must_use = "dropping a reservation immediately marks the claim as failed"]
pub struct Reservation<'a, S: StatusStore> {
    coordinator: &'a ClaimCoordinator<S>,
    key: ClaimKey,
    finalized: bool,
}

impl<'a, S: StatusStore> Reservation<'a, S> {
    pub fn key(&self) -> &ClaimKey {
        &self.key
    }

    /// Promote the claim to `Success`
    ///
    /// The guard is disarmed before the first write. If every write fails the
    /// record stays `InProgress`: the token exists remotely, so the slot must
    /// not reopen until an operator reconciles it.
    pub fn complete(mut self) -> Result<(), StoreError> {
        self.finalized = true;
        let mut attempt = 1;
        loop {
            match self.coordinator.finalize(&self.key, ClaimOutcome::Success) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < SUCCESS_WRITE_ATTEMPTS => {
                    warn!(key = %self.key, attempt, error = %err, "Could not record claim success, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    error!(key = %self.key, error = %err, "Claim success not recorded, leaving it in progress");
                    return Err(err);
                }
            }
        }
    }

    /// Release the claim as `Failed`
    pub fn release(mut self) -> Result<(), StoreError> {
        self.coordinator.finalize(&self.key, ClaimOutcome::Failed)?;
        self.finalized = true;
        Ok(())
    }
}

impl<'a, S: StatusStore> Drop for Reservation<'a, S> {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        warn!(key = %self.key, "Reservation dropped unfinished, marking claim failed");
        if let Err(err) = self.coordinator.finalize(&self.key, ClaimOutcome::Failed) {
            warn!(key = %self.key, error = %err, "Could not release dropped reservation");
        }
    }
}
