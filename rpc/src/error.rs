//! RPC error types and their response codes.

use phonelink_ledger::LedgerError;
use phonelink_store::StoreError;
use phonelink_verification::VerificationError;
use thiserror::Error;

use crate::FieldError;

/// Response codes carried in the envelope `code` field.
pub mod codes {
    pub const SUCCESS: u32 = 200;
    pub const INVALID_PARAMETERS: u32 = 400;
    pub const INVALID_CLAIM: u32 = 401;
    pub const NOT_A_VALIDATOR: u32 = 402;
    pub const NO_SUCH_REQUEST: u32 = 410;
    pub const NOT_YET_SENT: u32 = 420;
    pub const ALREADY_FINISHED: u32 = 421;
    pub const ALREADY_EXPIRED: u32 = 422;
    pub const CODE_EXPIRED: u32 = 430;
    pub const CODE_MISMATCH: u32 = 440;
    pub const INTERNAL: u32 = 500;
    pub const STORAGE: u32 = 800;
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Failed to check the validity of parameters.")]
    InvalidParameters(Vec<FieldError>),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("{0}")]
    Internal(String),
}

impl RpcError {
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidParameters(_) => codes::INVALID_PARAMETERS,
            Self::Verification(e) => match e {
                VerificationError::InvalidPhoneNumber(_) | VerificationError::InvalidSignature => {
                    codes::INVALID_CLAIM
                }
                VerificationError::UnknownValidator(_) => codes::NOT_A_VALIDATOR,
                VerificationError::NoSuchRequest(_) => codes::NO_SUCH_REQUEST,
                VerificationError::NotYetSent => codes::NOT_YET_SENT,
                VerificationError::AlreadyFinished => codes::ALREADY_FINISHED,
                VerificationError::AlreadyExpired => codes::ALREADY_EXPIRED,
                VerificationError::CodeExpired => codes::CODE_EXPIRED,
                VerificationError::CodeMismatch => codes::CODE_MISMATCH,
                VerificationError::CodeTooShort { .. } => codes::INVALID_PARAMETERS,
                VerificationError::NotAValidator => codes::INTERNAL,
            },
            Self::Storage(_) => codes::STORAGE,
            Self::Ledger(_) | Self::Internal(_) => codes::INTERNAL,
        }
    }
}

impl From<StoreError> for RpcError {
    fn from(e: StoreError) -> Self {
        RpcError::Storage(e.to_string())
    }
}

impl From<LedgerError> for RpcError {
    fn from(e: LedgerError) -> Self {
        RpcError::Ledger(e.to_string())
    }
}
