use thiserror::Error;

/// Library error type for mirror operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The mirror root is missing, unreadable, or not a directory.
    #[error("invalid photo directory: {0}")]
    BadDir(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
