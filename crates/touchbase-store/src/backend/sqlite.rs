//! [`SqliteStorage`]: store blobs as rows of a single SQLite table.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::OptionalExtension as _;
use touchbase_core::storage::Storage;

use crate::{Error, Result, schema::SCHEMA};

/// Blob storage backed by one SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStorage {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStorage {
  /// Open (or create) a database at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let storage = Self { conn };
    storage.init_schema().await?;
    Ok(storage)
  }

  /// Open an in-memory database; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let storage = Self { conn };
    storage.init_schema().await?;
    Ok(storage)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// When `name` was last written, as stored.
  pub async fn written_at(&self, name: &str) -> Result<Option<String>> {
    let name = name.to_owned();
    let at = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT written_at FROM blobs WHERE name = ?1",
              rusqlite::params![name],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(at)
  }
}

impl Storage for SqliteStorage {
  type Error = Error;

  async fn exists(&self, name: &str) -> Result<bool> {
    let name = name.to_owned();
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM blobs WHERE name = ?1",
              rusqlite::params![name],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  async fn read_text(&self, name: &str) -> Result<String> {
    let key = name.to_owned();
    let body: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT body FROM blobs WHERE name = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    body.ok_or_else(|| Error::NotFound(name.to_owned()))
  }

  async fn write_text(&self, name: &str, text: &str) -> Result<()> {
    let name = name.to_owned();
    let body = text.to_owned();
    let at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO blobs (name, body, written_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(name) DO UPDATE SET body = excluded.body, written_at = excluded.written_at",
          rusqlite::params![name, body, at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn write_then_read() {
    let s = SqliteStorage::open_in_memory().await.unwrap();
    assert!(!s.exists("a.db").await.unwrap());

    s.write_text("a.db", "{\"x\":1}").await.unwrap();
    assert!(s.exists("a.db").await.unwrap());
    assert_eq!(s.read_text("a.db").await.unwrap(), "{\"x\":1}");
    assert!(s.written_at("a.db").await.unwrap().is_some());

    s.write_text("a.db", "{}").await.unwrap();
    assert_eq!(s.read_text("a.db").await.unwrap(), "{}");
  }

  #[tokio::test]
  async fn read_missing_is_not_found() {
    let s = SqliteStorage::open_in_memory().await.unwrap();
    assert!(matches!(s.read_text("nope").await, Err(Error::NotFound(_))));
  }
}
