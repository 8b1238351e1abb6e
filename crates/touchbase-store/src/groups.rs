//! The Groups store, which also owns the cross-reference index.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use touchbase_core::{
  due::{DueClass, due_class},
  id::{CheckInId, GroupId, PersonId},
  record::{Group, GroupDue, GroupLastCheckIn, Person},
  storage::Storage,
};

use crate::{
  contacts::Contacts,
  engine::{Collection, EntityState, Store, StoreState, rekey},
  index::CrossReferenceIndex,
  writer::WriteTicket,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupsState {
  #[serde(default)]
  pub groups: Collection<Group>,
  #[serde(flatten)]
  pub index:  CrossReferenceIndex,
}

impl StoreState for GroupsState {
  const FILE_NAME: &'static str = "localstorage_groups.db";

  fn normalize(&mut self) -> usize { rekey(&mut self.groups) + self.index.heal() }
}

impl EntityState for GroupsState {
  type Entity = Group;

  fn entities(&self) -> &Collection<Group> { &self.groups }

  fn entities_mut(&mut self) -> &mut Collection<Group> { &mut self.groups }
}

pub type Groups<S> = Store<GroupsState, S>;

impl<S: Storage> Store<GroupsState, S> {
  pub fn group(&self, id: GroupId) -> Option<Group> { self.get(id) }

  /// Groups for `ids`; every group when `ids` is empty.
  pub fn groups(&self, ids: &[GroupId]) -> Vec<Group> { self.by_ids(ids) }

  // ── Cross-reference index ─────────────────────────────────────────────────

  pub fn set_person_groups(&self, person: PersonId, groups: Vec<GroupId>) -> WriteTicket {
    self.update(|state| state.index.set_person_groups(person, groups)).1
  }

  pub fn set_group_persons(&self, group: GroupId, persons: Vec<PersonId>) -> WriteTicket {
    self.update(|state| state.index.set_group_persons(group, persons)).1
  }

  pub fn merge_person_groups(&self, map: BTreeMap<PersonId, Vec<GroupId>>) -> WriteTicket {
    self.update(|state| state.index.merge_person_groups(map)).1
  }

  pub fn merge_group_persons(&self, map: BTreeMap<GroupId, Vec<PersonId>>) -> WriteTicket {
    self.update(|state| state.index.merge_group_persons(map)).1
  }

  pub fn person_group_ids(&self, person: PersonId) -> Vec<GroupId> {
    self.read(|state| state.index.person_group_ids(person).to_vec())
  }

  pub fn group_person_ids(&self, group: GroupId) -> Vec<PersonId> {
    self.read(|state| state.index.group_person_ids(group).to_vec())
  }

  pub fn inconsistencies(&self) -> Vec<(PersonId, GroupId)> {
    self.read(|state| state.index.inconsistencies())
  }

  /// Groups of `person`, in index order. Groups not cached are skipped.
  pub fn resolve_person_groups(&self, person: PersonId) -> Vec<Group> {
    self.read(|state| {
      state
        .index
        .person_group_ids(person)
        .iter()
        .filter_map(|group| {
          let found = state.groups.get(group).cloned();
          if found.is_none() {
            tracing::trace!(%person, %group, "group not cached; skipped");
          }
          found
        })
        .collect()
    })
  }

  /// Members of `group`, resolved through `contacts`. Contacts not cached are
  /// skipped.
  pub fn resolve_group_persons<C: Storage>(&self, group: GroupId, contacts: &Contacts<C>) -> Vec<Person> {
    self
      .group_person_ids(group)
      .into_iter()
      .filter_map(|person| {
        let found = contacts.get(person);
        if found.is_none() {
          tracing::trace!(%person, %group, "contact not cached; skipped");
        }
        found
      })
      .collect()
  }

  // ── Scheduling ────────────────────────────────────────────────────────────

  /// Record a completed group check-in. Returns `None` when the group is not
  /// cached.
  pub fn record_check_in(&self, due: &GroupDue, check_in_ids: Vec<CheckInId>) -> Option<WriteTicket> {
    if !self.contains(due.group_id) {
      tracing::debug!(group = %due.group_id, "check-in for uncached group ignored");
      return None;
    }

    let (_, ticket) = self.update(|state| {
      if let Some(group) = state.groups.get_mut(&due.group_id) {
        group.last.check_in = Some(GroupLastCheckIn { check_in_ids, time: due.last });
        group.due.check_in = Some(due.time);
      }
    });
    Some(ticket)
  }

  /// Groups ordered by due time, soonest first, undated last.
  pub fn due_list(&self, now: DateTime<Utc>) -> Vec<(Group, DueClass)> {
    let mut list: Vec<_> = self
      .all()
      .into_iter()
      .map(|g| {
        let class = due_class(g.due_at(), now);
        (g, class)
      })
      .collect();
    list.sort_by_key(|(g, _)| (g.due_at().is_none(), g.due_at()));
    list
  }
}
