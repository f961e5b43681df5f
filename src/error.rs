use thiserror::Error;

use crate::types::GeneId;

#[derive(Debug, Error)]
pub enum CoexError {
    #[error("unknown gene id: {id}")]
    UnknownKey { id: GeneId },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("{context}: {source}")]
    ThreadPool {
        context: &'static str,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },

    #[error("bit matrix error: {0}")]
    BitMatrix(#[from] bitmatrix::BitMatrixError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoexError>;
