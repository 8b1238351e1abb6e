//! Error types for `touchbase-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown frequency: {0:?}")]
  UnknownFrequency(String),

  #[error("invalid identifier: {0:?}")]
  InvalidId(String),

  #[error("timestamp out of range: {0}")]
  TimestampOutOfRange(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
