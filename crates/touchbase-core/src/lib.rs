//! Core types and trait definitions for the touchbase entity cache.
//!
//! No storage or HTTP code lives here. The crate defines the typed entity
//! records and due-date bucketing, along with the contracts for persistence
//! and remote fetches.

pub mod due;
pub mod entity;
pub mod error;
pub mod frequency;
pub mod id;
pub mod record;
pub mod remote;
pub mod storage;

pub use error::{Error, Result};
