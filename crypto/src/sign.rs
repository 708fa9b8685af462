//! EIP-191 personal-message signing and signer recovery over secp256k1.
//!
//! A 32-byte protocol digest is wrapped as
//! `keccak256("\x19Ethereum Signed Message:\n32" || digest)` before signing, so
//! the same signatures are produced and accepted by standard Ethereum wallets.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use phonelink_types::{Address, RecoverableSignature};

use crate::{keccak256, keccak256_multi, CryptoError};

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// The prehash actually signed for a protocol digest.
pub fn personal_message_hash(digest: &[u8; 32]) -> [u8; 32] {
    keccak256_multi(&[PERSONAL_MESSAGE_PREFIX, digest])
}

/// Derive the chain address of a public key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::new(bytes)
}

/// Sign a raw 32-byte prehash, returning `r || s` with low `s` and the recovery id (0 or 1).
pub fn sign_prehash(key: &SigningKey, prehash: &[u8; 32]) -> Result<([u8; 64], u8), CryptoError> {
    let (mut sig, mut recid) = key
        .sign_prehash_recoverable(prehash)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recid = RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced());
    }

    let mut rs = [0u8; 64];
    rs.copy_from_slice(&sig.to_bytes());
    Ok((rs, recid.to_byte()))
}

/// Sign a protocol digest, producing `r || s || v` with low `s` and `v` in {27, 28}.
pub fn sign_digest(
    key: &SigningKey,
    digest: &[u8; 32],
) -> Result<RecoverableSignature, CryptoError> {
    let (rs, recid) = sign_prehash(key, &personal_message_hash(digest))?;
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&rs);
    out[64] = 27 + recid;
    Ok(RecoverableSignature::new(out))
}

/// Recover the address that signed `digest`.
pub fn recover_signer(
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> Result<Address, CryptoError> {
    let v = signature.v();
    // Only the 27/28 form is produced by signers; a bare 0/1 would make
    // two byte strings valid for one signature.
    let recovery_byte = match v {
        27 | 28 => v - 27,
        other => {
            return Err(CryptoError::MalformedSignature(format!(
                "invalid recovery byte {other}"
            )))
        }
    };
    let recid = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| CryptoError::MalformedSignature("invalid recovery id".into()))?;
    let sig = Signature::from_slice(&signature.as_bytes()[..64])
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

    let prehash = personal_message_hash(digest);
    let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recid)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(address_of(&key))
}

/// Whether `signature` over `digest` was produced by `address`.
///
/// Malformed signatures yield `false`.
pub fn verify_signature(
    address: &Address,
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> bool {
    matches!(recover_signer(digest, signature), Ok(signer) if signer == *address)
}
