//! The validator's signing identity.

use std::fmt;

use k256::ecdsa::SigningKey;
use phonelink_types::{Address, RecoverableSignature};
use rand::rngs::OsRng;

use crate::sign::{address_of, sign_digest};
use crate::CryptoError;

/// A secp256k1 signing key together with its derived chain address.
#[derive(Clone)]
pub struct ValidatorKey {
    signing_key: SigningKey,
    address: Address,
}

impl ValidatorKey {
    /// Generate a fresh random key.
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Build from raw 32-byte secret material.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_slice(secret).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Parse a hex secret, with or without `0x`.
    pub fn from_hex(secret: &str) -> Result<Self, CryptoError> {
        let trimmed = secret.trim();
        let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(body).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Self::from_bytes(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Sign a protocol digest as a personal message.
    pub fn sign(&self, digest: &[u8; 32]) -> Result<RecoverableSignature, CryptoError> {
        sign_digest(&self.signing_key, digest)
    }

    /// Hex encoding of the secret, `0x`-prefixed.
    pub fn secret_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.to_bytes()))
    }
}

impl fmt::Debug for ValidatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
