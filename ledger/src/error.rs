use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    #[error("ledger request failed: {0}")]
    RequestFailed(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("ledger rejected the call: {0}")]
    Rejected(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] phonelink_crypto::CryptoError),
}
