//! [`Storage`](touchbase_core::storage::Storage) backends.

mod fs;
mod memory;
mod sqlite;

pub use fs::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
