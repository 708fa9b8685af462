//! Nullable infrastructure for deterministic testing.
//!
//! The validator reaches the outside world through a few traits: `Clock`,
//! `RecordStore` and `Ledger`. This crate provides in-memory implementations
//! that never touch the filesystem or a blockchain and can be steered from
//! tests.

pub mod clock;
pub mod ledger;
pub mod store;

pub use clock::NullClock;
pub use ledger::{NullLedger, NullRegistry};
pub use store::NullStore;
