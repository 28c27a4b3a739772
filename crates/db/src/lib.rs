//! Record store for thebook.
//!
//! Records are plain structs; relationships are foreign-key ids resolved through
//! the [`Repository`] query methods rather than by traversal on the records.
//! [`MemoryStore`] is the in-process implementation used by the server and tests.

pub mod error;
pub mod fixtures;
pub mod memory;
pub mod models;
pub mod repository;

pub use error::{StoreError, StoreResult};
pub use fixtures::Fixtures;
pub use memory::MemoryStore;
pub use models::*;
pub use repository::Repository;
