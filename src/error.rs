//! Error types for index construction, persistence and search.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid vector: {0}")]
    InvalidVector(String),

    #[error("cannot build an index over zero vectors")]
    EmptyInput,

    #[error("invalid k: {0}")]
    InvalidK(String),

    #[error("no face found: {0}")]
    ExtractionFailure(String),

    #[error("artifact inconsistency: {0}")]
    ArtifactInconsistency(String),

    #[error("identity map error: {0}")]
    IdentityMap(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl Error {
    pub(crate) fn dimension(expected: usize, got: usize) -> Self {
        Error::InvalidVector(format!("dimension mismatch: expected {expected}, got {got}"))
    }
}
