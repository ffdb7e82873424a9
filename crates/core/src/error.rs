use thiserror::Error;

pub type AdResult<T> = Result<T, AdServerError>;

/// Error taxonomy for the decision path. "No inventory" is not an
/// error and is modeled as a normal outcome, not a variant here.
#[derive(Error, Debug)]
pub enum AdServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The decision cache itself is unreachable or the enumeration
    /// step failed. The only class that surfaces as a server error.
    #[error("Decision cache unreachable: {0}")]
    CacheUnavailable(String),

    #[error("Decision cache error: {0}")]
    Cache(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
