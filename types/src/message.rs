//! Messages exchanged between users and validators, and between validators.
//!
//! Field names follow the JSON wire format (camelCase). The nonce travels as a
//! decimal string.

use serde::{Deserialize, Serialize};

use crate::{Address, RecoverableSignature, RequestId};

/// A user's signed claim that `phone` belongs to `address`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneRequest {
    pub phone: String,
    pub address: Address,
    #[serde(with = "decimal")]
    pub nonce: u64,
    pub signature: RecoverableSignature,
}

/// A request accepted by a validator and relayed to its peers.
///
/// `signature` is the receiving validator's signature over the transaction
/// digest, which lets peers check provenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub request: PhoneRequest,
    pub request_id: RequestId,
    pub receiver: Address,
    pub signature: RecoverableSignature,
}

/// A submitted verification code, relayed by the validator that received it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitData {
    pub request_id: RequestId,
    pub code: String,
    pub receiver: Address,
    pub signature: RecoverableSignature,
}

mod decimal {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        struct DecimalVisitor;

        impl<'de> Visitor<'de> for DecimalVisitor {
            type Value = u64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or an unsigned integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
                Ok(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DecimalVisitor)
    }
}
