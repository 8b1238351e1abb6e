//! Persisted entity cache for touchbase.
//!
//! Four write-through stores (contacts, groups, check-ins, the signed-in
//! user) share one generic engine, [`Store`]. Each keeps its state in memory
//! and mirrors it as a JSON blob through a
//! [`Storage`](touchbase_core::storage::Storage) backend. [`CacheContext`]
//! ties the stores together and runs the workflows that talk to the remote
//! source.

pub mod backend;
pub mod checkins;
pub mod contacts;
pub mod context;
pub mod engine;
pub mod error;
pub mod groups;
pub mod index;
pub mod user;

mod inflight;
mod schema;
mod writer;

pub use context::{CacheContext, InitReport, PendingReorder, StoreEvent};
pub use engine::{InitOutcome, Store};
pub use error::{Error, Result};
pub use writer::WriteTicket;
