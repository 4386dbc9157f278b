use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessfitError {
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("json parse error in {path}: {source}")]
    JsonParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("json encode error for {context}: {source}")]
    JsonEncode {
        context: String,
        source: serde_json::Error,
    },

    #[error("job root {path} is not a readable directory: {source}")]
    JobRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unknown analysis name: {0}")]
    UnknownAnalysis(String),
}

pub type SessfitResult<T> = Result<T, SessfitError>;
