//! Ledger boundary for the phone-link validator.
//!
//! The engine talks to the on-chain registry contract only through the
//! [`Ledger`] trait: validator membership, nonces, request registration and
//! vote casting/counting. [`RpcLedger`] implements it over Ethereum JSON-RPC;
//! `phonelink-nullables` provides an in-memory stand-in for tests.

pub mod contract;
pub mod error;
pub mod ledger;
pub mod rpc;
pub mod transaction;

pub use error::LedgerError;
pub use ledger::{Ledger, ValidatorEntry, VoteCountStatus};
pub use rpc::{RpcLedger, RpcLedgerConfig};
pub use transaction::LegacyTransaction;
