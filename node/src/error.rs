use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] phonelink_ledger::LedgerError),

    #[error("network error: {0}")]
    Network(#[from] phonelink_network::NetworkError),

    #[error("verification error: {0}")]
    Verification(#[from] phonelink_verification::VerificationError),

    #[error("store error: {0}")]
    Store(#[from] phonelink_store::StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] phonelink_crypto::CryptoError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RPC server error: {0}")]
    Rpc(String),

    #[error("SMS error: {0}")]
    Sms(String),

    #[error("shutdown timeout")]
    ShutdownTimeout,

    #[error("{0}")]
    Other(String),
}

impl From<phonelink_store_lmdb::LmdbError> for NodeError {
    fn from(e: phonelink_store_lmdb::LmdbError) -> Self {
        NodeError::Store(e.into())
    }
}

impl From<phonelink_rpc::RpcError> for NodeError {
    fn from(e: phonelink_rpc::RpcError) -> Self {
        NodeError::Rpc(e.to_string())
    }
}
