//! SQL schema for the SQLite blob backend.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per entity store; `body` is the store's whole state as JSON.
CREATE TABLE IF NOT EXISTS blobs (
    name        TEXT PRIMARY KEY,
    body        TEXT NOT NULL,
    written_at  TEXT NOT NULL    -- RFC 3339 UTC
);

PRAGMA user_version = 1;
";
