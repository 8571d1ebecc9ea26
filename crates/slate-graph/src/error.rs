use std::fmt;

use slate_store::StoreError;

#[derive(Debug)]
pub enum GraphError {
    Storage(StoreError),
    Serialization(String),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::Storage(e) => write!(f, "storage error: {e}"),
            GraphError::Serialization(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for GraphError {}

impl From<StoreError> for GraphError {
    fn from(e: StoreError) -> Self {
        GraphError::Storage(e)
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Serialization(e.to_string())
    }
}
