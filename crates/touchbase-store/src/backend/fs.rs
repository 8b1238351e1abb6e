//! [`FileStorage`]: one file per blob under a root directory.

use std::path::{Path, PathBuf};

use touchbase_core::storage::Storage;
use uuid::Uuid;

use crate::{Error, Result};

/// Blob storage on the local filesystem.
///
/// Writes go to a uniquely named temporary file first and are renamed over
/// the target, so a reader never sees a half-written blob.
#[derive(Debug, Clone)]
pub struct FileStorage {
  root: PathBuf,
}

impl FileStorage {
  /// Use `root` as the storage directory, creating it if needed.
  pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
    let root = root.into();
    tokio::fs::create_dir_all(&root).await?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path { &self.root }

  fn path(&self, name: &str) -> PathBuf { self.root.join(name) }
}

impl Storage for FileStorage {
  type Error = Error;

  async fn exists(&self, name: &str) -> Result<bool> {
    Ok(tokio::fs::try_exists(self.path(name)).await?)
  }

  async fn read_text(&self, name: &str) -> Result<String> {
    match tokio::fs::read_to_string(self.path(name)).await {
      Ok(text) => Ok(text),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        Err(Error::NotFound(name.to_owned()))
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn write_text(&self, name: &str, text: &str) -> Result<()> {
    let path = self.path(name);
    let temp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

    tokio::fs::write(&temp, text).await?;
    if let Err(e) = tokio::fs::rename(&temp, &path).await {
      let _ = tokio::fs::remove_file(&temp).await;
      return Err(e.into());
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("touchbase-fs-{}", Uuid::new_v4().simple()))
  }

  #[tokio::test]
  async fn write_replaces_and_leaves_no_temp_files() {
    let dir = scratch_dir();
    let s = FileStorage::open(&dir).await.unwrap();

    assert!(!s.exists("localstorage_contacts.db").await.unwrap());
    s.write_text("localstorage_contacts.db", "{\"contacts\":{}}").await.unwrap();
    s.write_text("localstorage_contacts.db", "{}").await.unwrap();

    assert!(s.exists("localstorage_contacts.db").await.unwrap());
    assert_eq!(s.read_text("localstorage_contacts.db").await.unwrap(), "{}");

    let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
      names.push(entry.file_name().to_string_lossy().into_owned());
    }
    assert_eq!(names, vec!["localstorage_contacts.db".to_owned()]);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
  }

  #[tokio::test]
  async fn read_missing_is_not_found() {
    let dir = scratch_dir();
    let s = FileStorage::open(&dir).await.unwrap();
    assert!(matches!(s.read_text("missing.db").await, Err(Error::NotFound(_))));
    tokio::fs::remove_dir_all(&dir).await.unwrap();
  }
}
