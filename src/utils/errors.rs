use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the cacher library
#[derive(Error, Debug)]
pub enum CacherError {
    #[error("Cache directory does not exist: {}", .0.display())]
    CacheNotFound(PathBuf),

    #[error("Cache already exists: {0}")]
    CacheAlreadyExists(String),

    #[error("Invalid name '{0}': must be a plain file name")]
    InvalidName(String),

    #[error("Invalid filter logic '{0}': expected \"and\" or \"or\"")]
    InvalidFilterLogic(String),

    #[error("Malformed stats file {}: {source}", path.display())]
    StatsFileError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
