//! Error type for `touchbase-store`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A storage backend failed while loading or creating a store.
  #[error("storage error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("blob not found: {0}")]
  NotFound(String),

  /// Write refused by a [`MemoryStorage`](crate::backend::MemoryStorage)
  /// configured to fail.
  #[error("write to {0} rejected")]
  WriteRejected(String),

  /// A queued write did not reach storage. The in-memory state is unaffected.
  #[error("failed to persist {file}: {message}")]
  Persist { file: &'static str, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
