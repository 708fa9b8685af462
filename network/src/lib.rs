//! Validator peer tracking and best-effort gossip.
//!
//! Membership comes from the ledger: [`PeerRegistry::reconcile`] rebuilds the
//! view of every other validator from the on-chain list and publishes it as an
//! immutable snapshot. [`Gossip`] checks peer health over HTTP and fans
//! requests and submits out to the peers currently marked active.

pub mod client;
pub mod error;
pub mod gossip;
pub mod registry;

pub use client::PeerClient;
pub use error::NetworkError;
pub use gossip::{BroadcastResult, Gossip};
pub use registry::{Peer, PeerRegistry, PeerSet, ReconcileOutcome};
