//! Storage collaborators.
//!
//! The key-value side is an in-memory engine behind the [`KeyValueStore`]
//! trait, grouped into instances by a [`KvEnvironment`]. The relational side
//! is a SQLite catalog available with the `sqlite` feature. Both report
//! writes to a [`ChangeObserver`], normally the listener registry.

mod environment;
mod memory;
#[cfg(feature = "sqlite")]
mod sql;
mod traits;

pub use environment::{default_root_path, KvEnvironment, ROOT_PATH_ENV};
pub use memory::MemoryKvStore;
#[cfg(feature = "sqlite")]
pub use sql::SqlCatalog;
pub use traits::{ChangeObserver, KeyValueStore};
