use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeDiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Unable to decode {} as text", .0.display())]
    DecodeFailure(PathBuf),

    #[error("Failed to copy {} onto {}: {reason}", .from.display(), .to.display())]
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Comparison cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, TreeDiffError>;
