mod client;
mod config;
mod engine;
mod error;
mod queue;
mod state;

pub use client::RestClient;
pub use config::{ConflictHandler, DurableConfig, ReplicationConfig, server_wins};
pub use engine::ReplicationEngine;
pub use error::ReplicationError;
pub use queue::{QueueItem, QueueOp, RetryQueue};
pub use state::ReplicationState;
