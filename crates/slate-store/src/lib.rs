mod error;
mod registry;
mod store;

pub use error::StoreError;
pub use registry::{SharedHandle, StoreRegistry};
pub use store::{CancelToken, NeverCancel, Store, StoreOptions, Transaction};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "memory")]
pub use memory::{MemoryStore, MemoryTransaction};

#[cfg(feature = "rocksdb")]
mod rocks;
#[cfg(feature = "rocksdb")]
pub use rocks::{RocksStore, RocksTransaction};

#[cfg(feature = "redb")]
mod redb_backend;
#[cfg(feature = "redb")]
pub use redb_backend::{RedbBackedStore, RedbTransaction};
