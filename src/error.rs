use thiserror::Error;

/// Result type for media operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for media operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Echo engine could not be initialized
    #[error("Echo engine initialization failed: {0}")]
    EngineInit(String),

    /// Echo engine failed while processing a frame
    #[error("Echo engine processing failed: {0}")]
    EngineProcessing(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
