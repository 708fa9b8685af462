//! Fundamental types for the phone-link validator node.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! chain addresses, request identifiers, signatures, timestamps, record state enums,
//! peer descriptors and the wire messages exchanged between validators.

pub mod address;
pub mod error;
pub mod hash;
pub mod keys;
pub mod message;
pub mod peer;
pub mod record;
pub mod state;
pub mod time;

pub use address::Address;
pub use error::TypeError;
pub use hash::RequestId;
pub use keys::RecoverableSignature;
pub use message::{PhoneRequest, SubmitData, Transaction};
pub use peer::{NodeInfo, PeerInfo, PeerStatus};
pub use record::VerificationRecord;
pub use state::{AuthenticationMode, ProcessStep, ValidationStatus};
pub use time::{Clock, SystemClock, Timestamp};
