mod database;
mod error;

pub use database::Database;
pub use error::DbError;

pub use slate_engine::{ChangeEvent, ChangeOp, Collection, Document, FieldType, Schema};
pub use slate_fulltext::{FulltextIndex, TokenizeOptions, Tokenizer};
pub use slate_graph::{GraphBridge, QuadStore, RelationMapping, Traversal};
pub use slate_query::{Filter, FilterGroup, FilterNode, LogicalOp, Operator, Query, Sort, SortDirection};
pub use slate_replication::{ConflictHandler, DurableConfig, ReplicationConfig, ReplicationEngine, ReplicationState, server_wins};
pub use slate_store::{Store, StoreOptions};
pub use slate_vector::{DistanceMetric, VectorIndex, hybrid_search};
