use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Specifier root not found: {0}")]
    SpecifierRoot(PathBuf),

    #[error("Invalid file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Extraction failed for {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Index build failed: {0}")]
    Build(String),
}

pub type Result<T> = std::result::Result<T, IndexerError>;
