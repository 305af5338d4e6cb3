use thiserror::Error;

pub type SdkResult<T> = Result<T, SdkError>;

#[derive(Error, Debug)]
pub enum SdkError {
    /// SDK used before (or without) a successful initialize.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required field was blank.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport failure or non-success status from a remote collaborator.
    #[error("Network error: {0}")]
    Network(String),

    /// Checkpoint or placement could not be found.
    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SdkError {
    pub fn network(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::Network(format!("{context}: {err}"))
    }
}
