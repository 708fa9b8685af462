use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signer recovery failed")]
    RecoveryFailed,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("ABI decode error: {0}")]
    AbiDecode(String),
}
