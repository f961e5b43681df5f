use thiserror::Error;

#[derive(Debug, Error)]
pub enum BitMatrixError {
    #[error("{what} index {index} out of range (size {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("unknown {what} name: {name}")]
    UnknownName { what: &'static str, name: String },

    #[error("duplicate {what} name: {name}")]
    DuplicateName { what: &'static str, name: String },

    #[error("cannot add more than {capacity} {what} names")]
    CapacityExceeded { what: &'static str, capacity: usize },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BitMatrixError>;
