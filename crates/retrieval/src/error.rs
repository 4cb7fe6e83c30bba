use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid splitter settings: {0}")]
    InvalidSplitter(String),
    #[error("embedding request failed: {0}")]
    Embedding(String),
    #[error("embedding service returned {actual} vectors for {expected} inputs")]
    EmbeddingCount { expected: usize, actual: usize },
    #[error("embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("could not access index file `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("could not decode index file `{path}`: {source}")]
    Decode { path: PathBuf, source: serde_json::Error },
    #[error("could not encode index: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("index file `{path}` is unusable: {reason}")]
    IncompatibleIndex { path: PathBuf, reason: String },
}

impl From<reqwest::Error> for RetrievalError {
    fn from(error: reqwest::Error) -> Self {
        Self::Embedding(error.to_string())
    }
}
