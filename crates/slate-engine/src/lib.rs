mod bus;
mod change;
mod collection;
mod document;
mod encoding;
mod error;
mod revision;
mod schema;

pub use bus::ChangeBus;
pub use change::{ChangeEvent, ChangeOp};
pub use collection::Collection;
pub use document::{Document, get_path};
pub use error::EngineError;
pub use revision::{next_revision_tag, parse_generation};
pub use schema::{FieldType, RequiredField, Schema};
