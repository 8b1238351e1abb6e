//! The person ↔ group cross-reference index.
//!
//! Both directions are stored. Writing one adjacency list immediately
//! reconciles the other direction to agree with it, so
//! `g ∈ person_groups[p]` holds exactly when `p ∈ group_persons[g]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use touchbase_core::id::{GroupId, PersonId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReferenceIndex {
  #[serde(default)]
  person_groups: BTreeMap<PersonId, Vec<GroupId>>,
  #[serde(default)]
  group_persons: BTreeMap<GroupId, Vec<PersonId>>,
}

fn dedup<T: PartialEq + Copy>(ids: impl IntoIterator<Item = T>) -> Vec<T> {
  let mut out = Vec::new();
  for id in ids {
    if !out.contains(&id) {
      out.push(id);
    }
  }
  out
}

fn add<T: PartialEq>(list: &mut Vec<T>, id: T) -> bool {
  if list.contains(&id) {
    false
  } else {
    list.push(id);
    true
  }
}

fn remove<T: PartialEq>(list: &mut Vec<T>, id: &T) -> bool {
  let before = list.len();
  list.retain(|x| x != id);
  list.len() != before
}

impl CrossReferenceIndex {
  /// Groups `person` belongs to, in stored order.
  pub fn person_group_ids(&self, person: PersonId) -> &[GroupId] {
    self.person_groups.get(&person).map(Vec::as_slice).unwrap_or_default()
  }

  /// Members of `group`, in stored order.
  pub fn group_person_ids(&self, group: GroupId) -> &[PersonId] {
    self.group_persons.get(&group).map(Vec::as_slice).unwrap_or_default()
  }

  /// Replace the groups of `person`. Returns the number of reverse entries
  /// repaired.
  pub fn set_person_groups(&mut self, person: PersonId, groups: Vec<GroupId>) -> usize {
    let groups = dedup(groups);
    let previous = self.person_groups.insert(person, groups.clone()).unwrap_or_default();
    let mut repairs = 0;

    for group in previous.iter().filter(|g| !groups.contains(g)) {
      if let Some(members) = self.group_persons.get_mut(group) {
        if remove(members, &person) {
          tracing::debug!(%person, %group, "dropped person from group members");
          repairs += 1;
        }
      }
    }
    for &group in &groups {
      if add(self.group_persons.entry(group).or_default(), person) {
        tracing::debug!(%person, %group, "added person to group members");
        repairs += 1;
      }
    }

    debug_assert!(self.inconsistencies().is_empty());
    repairs
  }

  /// Replace the members of `group`. Returns the number of reverse entries
  /// repaired.
  pub fn set_group_persons(&mut self, group: GroupId, persons: Vec<PersonId>) -> usize {
    let persons = dedup(persons);
    let previous = self.group_persons.insert(group, persons.clone()).unwrap_or_default();
    let mut repairs = 0;

    for person in previous.iter().filter(|p| !persons.contains(p)) {
      if let Some(groups) = self.person_groups.get_mut(person) {
        if remove(groups, &group) {
          tracing::debug!(%person, %group, "dropped group from person's groups");
          repairs += 1;
        }
      }
    }
    for &person in &persons {
      if add(self.person_groups.entry(person).or_default(), group) {
        tracing::debug!(%person, %group, "added group to person's groups");
        repairs += 1;
      }
    }

    debug_assert!(self.inconsistencies().is_empty());
    repairs
  }

  /// Key-wise assignment of many persons' groups.
  pub fn merge_person_groups(&mut self, map: BTreeMap<PersonId, Vec<GroupId>>) -> usize {
    map
      .into_iter()
      .map(|(person, groups)| self.set_person_groups(person, groups))
      .sum()
  }

  /// Key-wise assignment of many groups' members.
  pub fn merge_group_persons(&mut self, map: BTreeMap<GroupId, Vec<PersonId>>) -> usize {
    map
      .into_iter()
      .map(|(group, persons)| self.set_group_persons(group, persons))
      .sum()
  }

  /// Every pair present in one direction but missing from the other.
  pub fn inconsistencies(&self) -> Vec<(PersonId, GroupId)> {
    let forward = self
      .person_groups
      .iter()
      .flat_map(|(&p, groups)| groups.iter().map(move |&g| (p, g)))
      .filter(|&(p, g)| !self.group_person_ids(g).contains(&p));
    let backward = self
      .group_persons
      .iter()
      .flat_map(|(&g, persons)| persons.iter().map(move |&p| (p, g)))
      .filter(|&(p, g)| !self.person_group_ids(p).contains(&g));
    forward.chain(backward).collect()
  }

  /// Make both directions agree by adding every missing reverse entry.
  ///
  /// Used after loading persisted state, where neither side was just written.
  pub fn heal(&mut self) -> usize {
    let missing = self.inconsistencies();
    for &(person, group) in &missing {
      add(self.person_groups.entry(person).or_default(), group);
      add(self.group_persons.entry(group).or_default(), person);
    }
    missing.len()
  }
}
