use std::fmt;

use slate_store::StoreError;

#[derive(Debug)]
pub enum VectorError {
    Storage(StoreError),
    Serialization(String),
    /// A document's projected embedding has a different length than the
    /// index's declared dimension.
    DimensionMismatch { expected: usize, actual: usize },
    /// `searchById`/similar was asked for a document with no stored vector.
    NoEmbedding(String),
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorError::Storage(e) => write!(f, "storage error: {e}"),
            VectorError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            VectorError::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {expected}, got {actual}")
            }
            VectorError::NoEmbedding(id) => write!(f, "no embedding stored for `{id}`"),
        }
    }
}

impl std::error::Error for VectorError {}

impl From<StoreError> for VectorError {
    fn from(e: StoreError) -> Self {
        VectorError::Storage(e)
    }
}

impl From<serde_json::Error> for VectorError {
    fn from(e: serde_json::Error) -> Self {
        VectorError::Serialization(e.to_string())
    }
}
