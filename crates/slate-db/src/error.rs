use std::fmt;

use slate_engine::EngineError;
use slate_fulltext::FulltextError;
use slate_graph::GraphError;
use slate_replication::ReplicationError;
use slate_store::StoreError;
use slate_vector::VectorError;

#[derive(Debug)]
pub enum DbError {
    Engine(EngineError),
    Store(StoreError),
    Fulltext(FulltextError),
    Vector(VectorError),
    Graph(GraphError),
    Replication(ReplicationError),
    UnknownCollection(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Engine(e) => write!(f, "engine error: {e}"),
            DbError::Store(e) => write!(f, "store error: {e}"),
            DbError::Fulltext(e) => write!(f, "fulltext error: {e}"),
            DbError::Vector(e) => write!(f, "vector error: {e}"),
            DbError::Graph(e) => write!(f, "graph error: {e}"),
            DbError::Replication(e) => write!(f, "replication error: {e}"),
            DbError::UnknownCollection(name) => write!(f, "unknown collection: {name}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<EngineError> for DbError {
    fn from(e: EngineError) -> Self {
        DbError::Engine(e)
    }
}

impl From<StoreError> for DbError {
    fn from(e: StoreError) -> Self {
        DbError::Store(e)
    }
}

impl From<FulltextError> for DbError {
    fn from(e: FulltextError) -> Self {
        DbError::Fulltext(e)
    }
}

impl From<VectorError> for DbError {
    fn from(e: VectorError) -> Self {
        DbError::Vector(e)
    }
}

impl From<GraphError> for DbError {
    fn from(e: GraphError) -> Self {
        DbError::Graph(e)
    }
}

impl From<ReplicationError> for DbError {
    fn from(e: ReplicationError) -> Self {
        DbError::Replication(e)
    }
}
