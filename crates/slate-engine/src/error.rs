use std::fmt;

use slate_store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    NotFound(String),
    Conflict(String),
    SchemaViolation(String),
    Cancelled,
    Storage(StoreError),
    InvalidQuery(String),
    Serialization(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Conflict(msg) => write!(f, "conflict: {msg}"),
            EngineError::SchemaViolation(msg) => write!(f, "schema violation: {msg}"),
            EngineError::Cancelled => write!(f, "operation cancelled"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
            EngineError::InvalidQuery(msg) => write!(f, "invalid query: {msg}"),
            EngineError::Serialization(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Cancelled => EngineError::Cancelled,
            other => EngineError::Storage(other),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}
