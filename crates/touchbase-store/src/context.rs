//! [`CacheContext`]: the four entity stores plus the workflows that span them.
//!
//! The context is created once at startup over a shared storage backend and
//! passed to whatever needs the cache. Workflows that touch the remote source
//! take the API client as an argument; the cache never retries or interprets
//! a remote failure.

use std::{future::IntoFuture as _, sync::Arc};

use tokio::sync::broadcast;
use touchbase_core::{
  id::{CheckInId, GroupId, PersonId, UserId},
  record::{CheckIn, Group, GroupDue, Person, PersonDue},
  remote::{ApiError, CheckInApi, GroupApi, PersonApi},
  storage::Storage,
};

use crate::{
  Result,
  checkins::CheckIns,
  contacts::Contacts,
  engine::InitOutcome,
  groups::Groups,
  user::UserStore,
  writer::WriteTicket,
};

const EVENT_CAPACITY: usize = 64;

/// Change notifications for views that render from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
  Initialized,
  Reset,
  CheckInsSynced { count: usize },
  /// New or updated check-ins are in the cache; orderings are unchanged.
  CheckInsApplied { check_ins: Vec<CheckInId> },
  /// Due dates changed, so due-ordered lists should be re-sorted.
  Reordered { persons: Vec<PersonId>, group: Option<GroupId> },
}

/// Per-store result of [`CacheContext::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
  pub contacts:  InitOutcome,
  pub groups:    InitOutcome,
  pub check_ins: InitOutcome,
  pub user:      InitOutcome,
}

pub struct CacheContext<S> {
  contacts:  Contacts<S>,
  groups:    Groups<S>,
  check_ins: CheckIns<S>,
  user:      UserStore<S>,
  events:    broadcast::Sender<StoreEvent>,
}

impl<S: Storage> CacheContext<S> {
  /// Create the stores over `storage`. Must be called inside a tokio runtime.
  pub fn new(storage: Arc<S>) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      contacts: Contacts::new(storage.clone()),
      groups: Groups::new(storage.clone()),
      check_ins: CheckIns::new(storage.clone()),
      user: UserStore::new(storage),
      events,
    }
  }

  pub fn contacts(&self) -> &Contacts<S> { &self.contacts }

  pub fn groups(&self) -> &Groups<S> { &self.groups }

  pub fn check_ins(&self) -> &CheckIns<S> { &self.check_ins }

  pub fn user(&self) -> &UserStore<S> { &self.user }

  pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> { self.events.subscribe() }

  fn emit(&self, event: StoreEvent) {
    // No subscribers is fine.
    let _ = self.events.send(event);
  }

  // ─── Lifecycle ─────────────────────────────────────────────────────────────

  /// Load all four stores concurrently.
  pub async fn initialize(&self) -> InitReport {
    let (contacts, groups, check_ins, user) = tokio::join!(
      self.contacts.initialize(),
      self.groups.initialize(),
      self.check_ins.initialize(),
      self.user.initialize(),
    );
    let report = InitReport { contacts, groups, check_ins, user };
    tracing::info!(?report, "cache initialized");
    self.emit(StoreEvent::Initialized);
    report
  }

  /// Clear every store, as on sign-out, and wait for the writes.
  pub async fn reset(&self) -> Result<()> {
    let (contacts, groups, check_ins, user) = tokio::join!(
      self.contacts.reset().into_future(),
      self.groups.reset().into_future(),
      self.check_ins.reset().into_future(),
      self.user.reset().into_future(),
    );
    self.emit(StoreEvent::Reset);
    contacts?;
    groups?;
    check_ins?;
    user?;
    Ok(())
  }

  /// Wait until everything mutated so far has been written.
  pub async fn flush(&self) -> Result<()> {
    let (contacts, groups, check_ins, user) = tokio::join!(
      self.contacts.flush().into_future(),
      self.groups.flush().into_future(),
      self.check_ins.flush().into_future(),
      self.user.flush().into_future(),
    );
    contacts?;
    groups?;
    check_ins?;
    user?;
    Ok(())
  }

  // ─── Remote workflows ──────────────────────────────────────────────────────

  /// A contact from cache, fetching it on a miss.
  pub async fn get_contact<A: PersonApi>(
    &self,
    api: &A,
    user: UserId,
    person: PersonId,
  ) -> Result<Person, ApiError> {
    self.contacts.get_or_fetch(person, |id| api.get_person(user, id)).await
  }

  /// A group from cache, fetching it on a miss.
  pub async fn get_group<A: GroupApi>(
    &self,
    api: &A,
    user: UserId,
    group: GroupId,
  ) -> Result<Group, ApiError> {
    self.groups.get_or_fetch(group, |id| api.get_group(user, id)).await
  }

  /// Replace the cached check-ins with the remote list. Returns how many
  /// were received.
  pub async fn sync_check_ins<A: CheckInApi>(&self, api: &A, user: UserId) -> Result<usize, ApiError> {
    let list = api.list_check_ins(user).await?;
    let count = list.len();
    let _ = self.check_ins.replace_all(list);
    tracing::debug!(%user, count, "check-ins synced");
    self.emit(StoreEvent::CheckInsSynced { count });
    Ok(count)
  }

  /// Send a check-in to one contact.
  ///
  /// The new check-in is cached immediately. The contact's schedule is only
  /// updated when the returned [`PendingReorder`] is committed.
  pub async fn check_in_with_person<A: CheckInApi>(
    &self,
    api: &A,
    user: UserId,
    person: PersonId,
    text: impl Into<String>,
  ) -> Result<PendingReorder<'_, S>, ApiError> {
    let receipt = api.check_in_with_person(user, person, text.into()).await?;
    Ok(self.apply_check_ins(vec![(receipt.due, receipt.check_in)], None))
  }

  /// Send a check-in to every member of a group. Scheduling updates for the
  /// members and the group wait for [`PendingReorder::commit`].
  pub async fn check_in_with_group<A: CheckInApi>(
    &self,
    api: &A,
    user: UserId,
    group: GroupId,
    text: impl Into<String>,
  ) -> Result<PendingReorder<'_, S>, ApiError> {
    let receipt = api.check_in_with_group(user, group, text.into()).await?;
    let members = receipt.check_ins.into_iter().map(|r| (r.due, r.check_in)).collect();
    Ok(self.apply_check_ins(members, Some(receipt.due)))
  }

  fn apply_check_ins(&self, members: Vec<(PersonDue, CheckIn)>, group: Option<GroupDue>) -> PendingReorder<'_, S> {
    let ids: Vec<CheckInId> = members.iter().map(|(_, c)| c.check_in_id).collect();
    for (_, check_in) in &members {
      let _ = self.check_ins.upsert(check_in.clone());
    }
    self.emit(StoreEvent::CheckInsApplied { check_ins: ids });
    PendingReorder { ctx: self, members, group }
  }

  /// Reply to a check-in and cache the updated original.
  pub async fn reply<A: CheckInApi>(
    &self,
    api: &A,
    user: UserId,
    check_in: CheckInId,
    text: impl Into<String>,
  ) -> Result<CheckIn, ApiError> {
    let updated = api.reply(user, check_in, text.into()).await?;
    let _ = self.check_ins.upsert(updated.clone());
    self.emit(StoreEvent::CheckInsApplied { check_ins: vec![updated.check_in_id] });
    Ok(updated)
  }
}

// ─── Two-phase reorder ───────────────────────────────────────────────────────

/// Scheduling updates held back until the caller has shown the new
/// check-ins.
///
/// Dropping it without [`commit`](Self::commit) leaves the schedules as they
/// were.
#[must_use = "due dates are only updated on commit"]
pub struct PendingReorder<'a, S> {
  ctx:     &'a CacheContext<S>,
  members: Vec<(PersonDue, CheckIn)>,
  group:   Option<GroupDue>,
}

impl<S: Storage> PendingReorder<'_, S> {
  /// The check-ins created by the call, one per contact.
  pub fn check_ins(&self) -> impl Iterator<Item = &CheckIn> { self.members.iter().map(|(_, c)| c) }

  /// Apply the new due dates and announce the reorder.
  pub fn commit(self) -> Vec<WriteTicket> {
    let mut tickets: Vec<WriteTicket> = self
      .members
      .iter()
      .filter_map(|(due, check_in)| self.ctx.contacts.record_check_in(due, check_in))
      .collect();

    let group = self.group.map(|due| {
      let ids = self.members.iter().map(|(_, c)| c.check_in_id).collect();
      tickets.extend(self.ctx.groups.record_check_in(&due, ids));
      due.group_id
    });

    self.ctx.emit(StoreEvent::Reordered {
      persons: self.members.iter().map(|(due, _)| due.person_id).collect(),
      group,
    });
    tickets
  }
}
