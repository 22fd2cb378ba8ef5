//! End-to-end claim flows

pub mod rollback_tests;
pub mod custom_mint_tests;
pub mod restart_tests;
