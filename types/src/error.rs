//! Parse errors for the fixed-size hex types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("missing 0x prefix")]
    MissingPrefix,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Decode a `0x`-prefixed hex string into exactly `N` bytes.
///
/// Hex digits are accepted in either case.
pub(crate) fn decode_prefixed<const N: usize>(s: &str) -> Result<[u8; N], TypeError> {
    let body = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or(TypeError::MissingPrefix)?;
    let bytes = hex::decode(body).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| TypeError::InvalidLength {
        expected: N,
        actual,
    })
}
