use std::fmt;

use slate_engine::EngineError;
use slate_store::StoreError;

#[derive(Debug)]
pub enum ReplicationError {
    Storage(StoreError),
    Engine(EngineError),
    Serialization(String),
    Http(String),
}

impl fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationError::Storage(e) => write!(f, "storage error: {e}"),
            ReplicationError::Engine(e) => write!(f, "engine error: {e}"),
            ReplicationError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            ReplicationError::Http(msg) => write!(f, "http error: {msg}"),
        }
    }
}

impl std::error::Error for ReplicationError {}

impl From<StoreError> for ReplicationError {
    fn from(e: StoreError) -> Self {
        ReplicationError::Storage(e)
    }
}

impl From<EngineError> for ReplicationError {
    fn from(e: EngineError) -> Self {
        ReplicationError::Engine(e)
    }
}

impl From<serde_json::Error> for ReplicationError {
    fn from(e: serde_json::Error) -> Self {
        ReplicationError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for ReplicationError {
    fn from(e: reqwest::Error) -> Self {
        ReplicationError::Http(e.to_string())
    }
}
