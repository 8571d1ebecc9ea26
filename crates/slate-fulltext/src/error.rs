use std::fmt;

use slate_store::StoreError;

#[derive(Debug)]
pub enum FulltextError {
    Storage(StoreError),
    Serialization(String),
}

impl fmt::Display for FulltextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FulltextError::Storage(e) => write!(f, "storage error: {e}"),
            FulltextError::Serialization(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for FulltextError {}

impl From<StoreError> for FulltextError {
    fn from(e: StoreError) -> Self {
        FulltextError::Storage(e)
    }
}

impl From<serde_json::Error> for FulltextError {
    fn from(e: serde_json::Error) -> Self {
        FulltextError::Serialization(e.to_string())
    }
}
