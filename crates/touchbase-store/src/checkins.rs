//! The CheckIns store and the derived views over it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use touchbase_core::{
  id::{CheckInId, UserId},
  record::CheckIn,
  storage::Storage,
};

use crate::{
  engine::{Collection, EntityState, Store, StoreState, rekey},
  writer::WriteTicket,
};

/// Read check-ins older than this many seconds drop out of the views.
pub const DEFAULT_EXPIRY: i64 = 90 * 24 * 60 * 60;

fn default_expiry() -> i64 { DEFAULT_EXPIRY }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInsState {
  #[serde(default)]
  pub check_ins: Collection<CheckIn>,
  #[serde(default = "default_expiry")]
  pub expiry:    i64,
}

impl Default for CheckInsState {
  fn default() -> Self { Self { check_ins: Collection::<CheckIn>::new(), expiry: DEFAULT_EXPIRY } }
}

impl StoreState for CheckInsState {
  const FILE_NAME: &'static str = "localstorage_checkins.db";

  fn normalize(&mut self) -> usize { rekey(&mut self.check_ins) }
}

impl EntityState for CheckInsState {
  type Entity = CheckIn;

  fn entities(&self) -> &Collection<CheckIn> { &self.check_ins }

  fn entities_mut(&mut self) -> &mut Collection<CheckIn> { &mut self.check_ins }
}

impl CheckInsState {
  /// Unread check-ins are always visible; read ones only within the expiry
  /// window.
  fn visible(&self, check_in: &CheckIn, now: i64) -> bool {
    !check_in.is_read() || check_in.time >= now.saturating_sub(self.expiry)
  }
}

pub type CheckIns<S> = Store<CheckInsState, S>;

impl<S: Storage> Store<CheckInsState, S> {
  pub fn expiry(&self) -> i64 { self.read(|state| state.expiry) }

  /// Change the retention window for read check-ins.
  pub fn set_expiry(&self, secs: i64) -> WriteTicket { self.update(|state| state.expiry = secs).1 }

  /// Visible check-ins among `ids`, in id order.
  ///
  /// With no ids, returns every visible check-in if `return_all_if_empty`,
  /// otherwise nothing.
  pub fn filter_by_ids(
    &self,
    ids: &[CheckInId],
    return_all_if_empty: bool,
    now: DateTime<Utc>,
  ) -> Vec<CheckIn> {
    let now = now.timestamp();
    if ids.is_empty() && !return_all_if_empty {
      return Vec::new();
    }
    self.read(|state| {
      state
        .check_ins
        .values()
        .filter(|c| ids.is_empty() || ids.contains(&c.check_in_id))
        .filter(|c| state.visible(c, now))
        .cloned()
        .collect()
    })
  }

  /// Check-ins addressed to `user`.
  pub fn incoming_for(&self, user: UserId) -> Vec<CheckIn> {
    self.read(|state| {
      state
        .check_ins
        .values()
        .filter(|c| c.is_to_user(user))
        .cloned()
        .collect()
    })
  }

  pub fn has_incoming_for(&self, user: UserId) -> bool {
    self.read(|state| state.check_ins.values().any(|c| c.is_to_user(user)))
  }

  /// Unread, visible messages in the threads addressed to `user`, in id
  /// order.
  ///
  /// Each incoming check-in contributes itself and its first two replies;
  /// deeper replies are not followed.
  pub fn unread_for(&self, user: UserId, now: DateTime<Utc>) -> Vec<CheckIn> {
    let ids: Vec<CheckInId> = self
      .incoming_for(user)
      .iter()
      .flat_map(CheckIn::thread_ids)
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();
    if ids.is_empty() {
      return Vec::new();
    }

    self
      .filter_by_ids(&ids, false, now)
      .into_iter()
      .filter(|c| !c.is_read())
      .collect()
  }

  pub fn unread_count_for(&self, user: UserId, now: DateTime<Utc>) -> usize {
    self.unread_for(user, now).len()
  }

  /// Mark a check-in read at `at`. Returns `None` when it is not cached.
  pub fn mark_read(&self, id: CheckInId, at: i64) -> Option<WriteTicket> {
    if !self.contains(id) {
      return None;
    }
    let (_, ticket) = self.update(|state| {
      if let Some(check_in) = state.check_ins.get_mut(&id) {
        check_in.read = Some(at);
      }
    });
    Some(ticket)
  }

  /// Link `reply` into the thread of `id`, filling `reply1` then `reply2`.
  ///
  /// Returns `None` when the check-in is not cached or already has two
  /// replies.
  pub fn append_reply(&self, id: CheckInId, reply: CheckInId) -> Option<WriteTicket> {
    let open = self.read(|state| {
      state
        .check_ins
        .get(&id)
        .is_some_and(|c| c.reply1.is_none() || c.reply2.is_none())
    });
    if !open {
      tracing::debug!(check_in = %id, %reply, "reply not linked");
      return None;
    }

    let (_, ticket) = self.update(|state| {
      if let Some(check_in) = state.check_ins.get_mut(&id) {
        if check_in.reply1.is_none() {
          check_in.reply1 = Some(reply);
        } else if check_in.reply2.is_none() {
          check_in.reply2 = Some(reply);
        }
      }
    });
    Some(ticket)
  }
}
