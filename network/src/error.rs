use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("peer has no endpoint")]
    NoEndpoint,

    #[error("request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("peer answered with code {code}: {message}")]
    Rejected { code: u32, message: String },

    #[error("invalid response from peer: {0}")]
    InvalidResponse(String),
}
