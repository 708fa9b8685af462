use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("signature does not match the claimed signer")]
    InvalidSignature,

    #[error("{0} is not a validator")]
    UnknownValidator(String),

    #[error("no such request: {0}")]
    NoSuchRequest(String),

    #[error("the challenge has not been sent yet")]
    NotYetSent,

    #[error("processing is already complete")]
    AlreadyFinished,

    #[error("the challenge has already expired")]
    AlreadyExpired,

    #[error("the challenge expired")]
    CodeExpired,

    #[error("the code does not match")]
    CodeMismatch,

    #[error("code of length {len} has no fragment for validator index {index}")]
    CodeTooShort { len: usize, index: u32 },

    #[error("this node is not in the validator set")]
    NotAValidator,
}
