//! The `Entity` trait binding each record type to its identifier.

use std::{fmt::Display, hash::Hash};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
  id::{CheckInId, GroupId, PersonId, UserId},
  record::{CheckIn, Group, Person, User},
};

/// The kinds of entity the cache holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Person,
  Group,
  CheckIn,
  User,
}

/// A record that can live in a keyed entity collection.
///
/// Implementors expose their own identifier; collections are always keyed by
/// it, never by an externally supplied key.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  type Id: Copy + Eq + Ord + Hash + Display + Send + Sync + Serialize + DeserializeOwned + 'static;

  const KIND: EntityKind;

  fn id(&self) -> Self::Id;
}

impl Entity for Person {
  type Id = PersonId;

  const KIND: EntityKind = EntityKind::Person;

  fn id(&self) -> PersonId { self.person_id }
}

impl Entity for Group {
  type Id = GroupId;

  const KIND: EntityKind = EntityKind::Group;

  fn id(&self) -> GroupId { self.group_id }
}

impl Entity for CheckIn {
  type Id = CheckInId;

  const KIND: EntityKind = EntityKind::CheckIn;

  fn id(&self) -> CheckInId { self.check_in_id }
}

impl Entity for User {
  type Id = UserId;

  const KIND: EntityKind = EntityKind::User;

  fn id(&self) -> UserId { self.user_id }
}
