//! Property-based tests for the claim state machine
//!
//! Random operation sequences are applied both to the coordinator and to a
//! plain model of the allowed transitions; the two must never disagree.

use std::collections::HashMap;
use proptest::prelude::*;
use mintclaim::{
    ClaimCoordinator, ClaimError, ClaimKey, ClaimOutcome, ClaimStatus, FailurePolicy, MemoryStatusStore, MintKind,
    StatusStore,
};

#[derive(Debug, Clone)]
enum Op {
    /// Reserve and finish with the given outcome
    Attempt(usize, ClaimOutcome),
    /// Reserve and hold the slot while a second reserve is tried
    Contend(usize),
    /// Reserve and drop the guard unfinished
    Abandon(usize),
    /// Rewrite the current status
    Rewrite(usize),
}

fn arb_key() -> impl Strategy<Value = usize> {
    0usize..6
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arb_key(), prop_oneof![Just(ClaimOutcome::Success), Just(ClaimOutcome::Failed)])
            .prop_map(|(key, outcome)| Op::Attempt(key, outcome)),
        arb_key().prop_map(Op::Contend),
        arb_key().prop_map(Op::Abandon),
        arb_key().prop_map(Op::Rewrite),
    ]
}

fn arb_policy() -> impl Strategy<Value = FailurePolicy> {
    prop_oneof![Just(FailurePolicy::AllowRetry), Just(FailurePolicy::SingleAttempt)]
}

fn key(index: usize) -> ClaimKey {
    let kind = if index % 2 == 0 { MintKind::Easy } else { MintKind::Custom };
    ClaimKey::new(format!("cfxtest:{}", index / 2), kind)
}

/// Whether the model admits a new reservation from `status`
fn reservable(status: ClaimStatus, policy: FailurePolicy) -> bool {
    match status {
        ClaimStatus::NotStarted => true,
        ClaimStatus::Failed => policy == FailurePolicy::AllowRetry,
        ClaimStatus::InProgress | ClaimStatus::Success => false,
    }
}

proptest! {
    #[test]
    fn prop_coordinator_matches_model(
        policy in arb_policy(),
        ops in prop::collection::vec(arb_op(), 1..60),
    ) {
        let coordinator = ClaimCoordinator::new(MemoryStatusStore::new()).with_policy(policy);
        let mut model: HashMap<usize, ClaimStatus> = HashMap::new();

        for op in ops {
            match op {
                Op::Attempt(index, outcome) => {
                    let expected = *model.get(&index).unwrap_or(&ClaimStatus::NotStarted);
                    match coordinator.reserve(&key(index)) {
                        Ok(reservation) => {
                            prop_assert!(reservable(expected, policy));
                            match outcome {
                                ClaimOutcome::Success => reservation.complete().unwrap(),
                                ClaimOutcome::Failed => reservation.release().unwrap(),
                            }
                            model.insert(index, ClaimStatus::from(outcome));
                        }
                        Err(err) => {
                            prop_assert!(!reservable(expected, policy));
                            match expected {
                                ClaimStatus::Success => {
                                    let is_completed = matches!(err, ClaimError::AlreadyCompleted { .. });
                                    prop_assert!(is_completed);
                                }
                                ClaimStatus::Failed => {
                                    let is_consumed = matches!(err, ClaimError::AttemptConsumed { .. });
                                    prop_assert!(is_consumed);
                                }
                                other => prop_assert!(false, "unexpected rejection from {:?}: {}", other, err),
                            }
                        }
                    }
                }
                Op::Contend(index) => {
                    if let Ok(held) = coordinator.reserve(&key(index)) {
                        let second = coordinator.reserve(&key(index));
                        let is_in_progress = matches!(second, Err(ClaimError::AlreadyInProgress { .. }));
                        prop_assert!(is_in_progress);
                        held.release().unwrap();
                        model.insert(index, ClaimStatus::Failed);
                    }
                }
                Op::Abandon(index) => {
                    let expected = *model.get(&index).unwrap_or(&ClaimStatus::NotStarted);
                    let reserved = coordinator.reserve(&key(index)).is_ok();
                    prop_assert_eq!(reserved, reservable(expected, policy));
                    if reserved {
                        model.insert(index, ClaimStatus::Failed);
                    }
                }
                Op::Rewrite(index) => {
                    let status = coordinator.status(&key(index)).unwrap();
                    coordinator.store().set(&key(index), status).unwrap();
                    coordinator.store().set(&key(index), status).unwrap();
                    if status != ClaimStatus::NotStarted {
                        model.insert(index, status);
                    }
                }
            }

            // No attempt is held between operations
            for index in 0..6 {
                let actual = coordinator.status(&key(index)).unwrap();
                prop_assert_ne!(actual, ClaimStatus::InProgress);
                prop_assert_eq!(actual, *model.get(&index).unwrap_or(&ClaimStatus::NotStarted));
            }
        }
    }

    #[test]
    fn prop_success_is_permanent(retries in 1usize..10, policy in arb_policy()) {
        let coordinator = ClaimCoordinator::new(MemoryStatusStore::new()).with_policy(policy);
        let key = key(0);

        coordinator.reserve(&key).unwrap().complete().unwrap();
        for _ in 0..retries {
            let rejected = matches!(coordinator.reserve(&key), Err(ClaimError::AlreadyCompleted { .. }));
            prop_assert!(rejected);
        }
        prop_assert_eq!(coordinator.status(&key).unwrap(), ClaimStatus::Success);
    }
}
