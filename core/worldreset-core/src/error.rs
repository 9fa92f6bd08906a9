use thiserror::Error;

use crate::duration::DurationError;

#[derive(Error, Debug)]
pub enum ResetError {
    #[error("Data directory not found")]
    NoDataDir,

    #[error("No world folder named \"{0}\" was found")]
    UnknownWorld(String),

    #[error("\"{0}\" is not a world folder name")]
    InvalidWorldName(String),

    #[error("Store has no backing file")]
    InMemoryStore,

    #[error("Invalid duration: {0}")]
    Duration(#[from] DurationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to walk world folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to persist temp file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = std::result::Result<T, ResetError>;
