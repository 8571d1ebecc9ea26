mod bridge;
mod encoding;
mod error;
mod quad;

pub use bridge::{GraphBridge, RelationMapping};
pub use error::GraphError;
pub use quad::{QuadStore, Traversal};
