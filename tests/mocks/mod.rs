//! Mock implementations for testing


pub use flaky_store::FlakyStatusStore;
pub use mint_service::{fast_poller, MockMintApi};
