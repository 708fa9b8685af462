//! Protocol digests.
//!
//! Every digest is `keccak256(abi.encode(...))` over a fixed field order. The
//! order is part of the wire contract: the registry contract and every
//! validator must compute byte-identical values.

use phonelink_types::{Address, RequestId, SubmitData, Transaction};
use rand::RngCore;

use crate::abi::{encode, Token};
use crate::keccak256;

/// Domain separator mixed into every phone hash.
pub const PHONE_HASH_DOMAIN: &str = "BOSagora Phone Number";

/// `keccak256(abi.encode(string DOMAIN, string phone))`
pub fn phone_hash(phone: &str) -> [u8; 32] {
    keccak256(&encode(&[
        Token::String(PHONE_HASH_DOMAIN.to_string()),
        Token::String(phone.to_string()),
    ]))
}

/// A fresh request id: `keccak256(abi.encode(bytes32 phoneHash, address, uint256 nonce, bytes32 salt))`
/// with a random 32-byte salt.
pub fn request_id<R: RngCore + ?Sized>(
    phone_hash: &[u8; 32],
    address: &Address,
    nonce: u64,
    rng: &mut R,
) -> RequestId {
    let mut salt = [0u8; 32];
    rng.fill_bytes(&mut salt);
    request_id_with_salt(phone_hash, address, nonce, &salt)
}

/// Request id with an explicit salt.
pub fn request_id_with_salt(
    phone_hash: &[u8; 32],
    address: &Address,
    nonce: u64,
    salt: &[u8; 32],
) -> RequestId {
    RequestId::new(keccak256(&encode(&[
        Token::Bytes32(*phone_hash),
        Token::Address(*address),
        Token::Uint(u128::from(nonce)),
        Token::Bytes32(*salt),
    ])))
}

/// The digest a user signs to request verification:
/// `(bytes32 phoneHash, address, uint256 chainId, uint256 nonce)`.
pub fn request_message(
    phone_hash: &[u8; 32],
    address: &Address,
    chain_id: u64,
    nonce: u64,
) -> [u8; 32] {
    keccak256(&encode(&[
        Token::Bytes32(*phone_hash),
        Token::Address(*address),
        Token::Uint(u128::from(chain_id)),
        Token::Uint(u128::from(nonce)),
    ]))
}

/// The digest a receiving validator signs before relaying a request:
/// `(bytes32 phoneHash, address, uint256 nonce, bytes32 requestId, address receiver, uint256 chainId)`.
pub fn tx_message(tx: &Transaction, chain_id: u64) -> [u8; 32] {
    keccak256(&encode(&[
        Token::Bytes32(phone_hash(&tx.request.phone)),
        Token::Address(tx.request.address),
        Token::Uint(u128::from(tx.request.nonce)),
        Token::Bytes32(*tx.request_id.as_bytes()),
        Token::Address(tx.receiver),
        Token::Uint(u128::from(chain_id)),
    ]))
}

/// The digest a receiving validator signs before relaying a submitted code:
/// `(bytes32 requestId, string code, address receiver, uint256 chainId)`.
pub fn submit_message(data: &SubmitData, chain_id: u64) -> [u8; 32] {
    keccak256(&encode(&[
        Token::Bytes32(*data.request_id.as_bytes()),
        Token::String(data.code.clone()),
        Token::Address(data.receiver),
        Token::Uint(u128::from(chain_id)),
    ]))
}
