//! Recoverable secp256k1 signatures in their 65-byte wire form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{decode_prefixed, TypeError};

/// A recoverable ECDSA signature laid out as `r || s || v` with `v` in {27, 28}.
///
/// The bytes are carried as-is; whether they form a valid signature is only
/// decided when the signer is recovered.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecoverableSignature(pub [u8; 65]);

impl RecoverableSignature {
    pub fn new(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn r(&self) -> &[u8] {
        &self.0[..32]
    }

    pub fn s(&self) -> &[u8] {
        &self.0[32..64]
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }
}

impl Default for RecoverableSignature {
    fn default() -> Self {
        Self([0u8; 65])
    }
}

impl FromStr for RecoverableSignature {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_prefixed::<65>(s).map(Self)
    }
}

impl fmt::Display for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverableSignature(0x{}..)", hex::encode(&self.0[..4]))
    }
}

impl Serialize for RecoverableSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RecoverableSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components() {
        let mut bytes = [0u8; 65];
        bytes[0] = 1;
        bytes[32] = 2;
        bytes[64] = 28;
        let sig = RecoverableSignature::new(bytes);
        assert_eq!(sig.r()[0], 1);
        assert_eq!(sig.s()[0], 2);
        assert_eq!(sig.v(), 28);
    }

    #[test]
    fn parse_round_trip() {
        let sig = RecoverableSignature::new([0x1b; 65]);
        let text = sig.to_string();
        assert_eq!(text.len(), 132);
        assert_eq!(text.parse::<RecoverableSignature>().unwrap(), sig);
    }
}
