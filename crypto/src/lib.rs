//! Cryptographic primitives for the phone-link validator.
//!
//! - **Keccak-256** for every digest (phone hash, request id, signed messages)
//! - **Ethereum ABI** word encoding so digests match what the registry contract computes
//! - **secp256k1** recoverable signatures under the EIP-191 personal-message prefix
//! - Address derivation from public keys

pub mod abi;
pub mod error;
pub mod hash;
pub mod keys;
pub mod message;
pub mod sign;

pub use error::CryptoError;
pub use hash::{keccak256, keccak256_multi};
pub use keys::ValidatorKey;
pub use message::{phone_hash, request_id, request_message, submit_message, tx_message};
pub use sign::{recover_signer, sign_digest, sign_prehash, verify_signature};
