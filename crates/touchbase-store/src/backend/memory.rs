//! [`MemoryStorage`]: an in-process blob map.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use touchbase_core::storage::Storage;

use crate::{Error, Result};

#[derive(Default)]
struct Inner {
  blobs:       Mutex<HashMap<String, String>>,
  fail_writes: AtomicBool,
  writes:      AtomicUsize,
}

/// Ephemeral storage that lives as long as the process.
///
/// Clones share the same map. Writes can be made to fail on demand with
/// [`MemoryStorage::fail_writes`].
#[derive(Clone, Default)]
pub struct MemoryStorage {
  inner: Arc<Inner>,
}

impl MemoryStorage {
  pub fn new() -> Self { Self::default() }

  /// Make every subsequent write fail (`true`) or succeed (`false`).
  pub fn fail_writes(&self, fail: bool) {
    self.inner.fail_writes.store(fail, Ordering::SeqCst);
  }

  /// Number of successful writes so far.
  pub fn write_count(&self) -> usize { self.inner.writes.load(Ordering::SeqCst) }

  /// Current contents of `name`, bypassing the async interface.
  pub fn peek(&self, name: &str) -> Option<String> { self.blobs().get(name).cloned() }

  /// Seed `name` with `text` without counting it as a write.
  pub fn insert(&self, name: &str, text: impl Into<String>) {
    self.blobs().insert(name.to_owned(), text.into());
  }

  fn blobs(&self) -> MutexGuard<'_, HashMap<String, String>> {
    self.inner.blobs.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Storage for MemoryStorage {
  type Error = Error;

  async fn exists(&self, name: &str) -> Result<bool> { Ok(self.blobs().contains_key(name)) }

  async fn read_text(&self, name: &str) -> Result<String> {
    self.peek(name).ok_or_else(|| Error::NotFound(name.to_owned()))
  }

  async fn write_text(&self, name: &str, text: &str) -> Result<()> {
    if self.inner.fail_writes.load(Ordering::SeqCst) {
      return Err(Error::WriteRejected(name.to_owned()));
    }
    self.blobs().insert(name.to_owned(), text.to_owned());
    self.inner.writes.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}
