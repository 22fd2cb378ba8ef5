//! Property-based tests

pub mod claim_state_machine;
