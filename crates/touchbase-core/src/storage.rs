//! The persistence adapter contract.
//!
//! Each entity store owns one named blob (its whole state as JSON). Backends
//! only move text in and out; they know nothing about the shape inside.

use std::future::Future;

/// Durable storage for named text blobs.
///
/// All methods return `Send` futures so the trait can be driven from spawned
/// tokio tasks (the store write queue runs on one).
pub trait Storage: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether a blob named `name` has been written before.
  fn exists<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Read the full contents of `name`. Fails if the blob is missing or
  /// unreadable.
  fn read_text<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Replace the contents of `name` with `text`.
  fn write_text<'a>(
    &'a self,
    name: &'a str,
    text: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
