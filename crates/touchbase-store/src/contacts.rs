//! The Contacts store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use touchbase_core::{
  due::{DueClass, due_class},
  id::PersonId,
  record::{CheckIn, LastCheckIn, Person, PersonDue},
  storage::Storage,
};

use crate::{
  engine::{Collection, EntityState, Store, StoreState, rekey},
  writer::WriteTicket,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactsState {
  #[serde(default)]
  pub contacts: Collection<Person>,
}

impl StoreState for ContactsState {
  const FILE_NAME: &'static str = "localstorage_contacts.db";

  fn normalize(&mut self) -> usize { rekey(&mut self.contacts) }
}

impl EntityState for ContactsState {
  type Entity = Person;

  fn entities(&self) -> &Collection<Person> { &self.contacts }

  fn entities_mut(&mut self) -> &mut Collection<Person> { &mut self.contacts }
}

pub type Contacts<S> = Store<ContactsState, S>;

fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
  matches!((a, b), (Some(a), Some(b)) if !a.is_empty() && a == b)
}

impl<S: Storage> Store<ContactsState, S> {
  pub fn person(&self, id: PersonId) -> Option<Person> { self.get(id) }

  /// Contacts for `ids`; every contact when `ids` is empty.
  pub fn persons(&self, ids: &[PersonId]) -> Vec<Person> { self.by_ids(ids) }

  /// Display name of a cached contact.
  pub fn person_name(&self, id: PersonId) -> Option<String> {
    self.read(|state| state.contacts.get(&id).map(|p| p.name.clone()))
  }

  /// Name of an existing contact sharing `email` (case-insensitive) or the
  /// same dial code and phone number. `exclude` skips one contact, typically
  /// the one being edited.
  pub fn exists(
    &self,
    email: Option<&str>,
    dial_code: Option<&str>,
    phone: Option<&str>,
    exclude: Option<PersonId>,
  ) -> Option<String> {
    let email = email.map(str::to_lowercase);
    self.read(|state| {
      state
        .contacts
        .values()
        .filter(|p| Some(p.person_id) != exclude)
        .find(|p| {
          let email_match = matches!(
            (p.email.as_deref(), email.as_deref()),
            (Some(a), Some(b)) if !b.is_empty() && a.to_lowercase() == b
          );
          let phone_match = same_text(p.dial_code.as_deref(), dial_code)
            && same_text(p.phone.as_deref(), phone);
          email_match || phone_match
        })
        .map(|p| p.name.clone())
    })
  }

  /// Time of the most recent check-in with `id`, if any.
  pub fn last_check_in(&self, id: PersonId) -> Option<i64> {
    self.read(|state| state.contacts.get(&id).and_then(Person::last_check_in_at))
  }

  /// Record a completed check-in and the contact's next due time.
  ///
  /// When the receipt has no due time it is derived from the contact's
  /// frequency. Returns `None` when the contact is not cached.
  pub fn record_check_in(&self, due: &PersonDue, check_in: &CheckIn) -> Option<WriteTicket> {
    if !self.contains(due.person_id) {
      tracing::debug!(person = %due.person_id, "check-in for uncached contact ignored");
      return None;
    }

    let (_, ticket) = self.update(|state| {
      let Some(person) = state.contacts.get_mut(&due.person_id) else {
        return;
      };
      person.last.check_in = Some(LastCheckIn {
        check_in_id: check_in.check_in_id,
        time:        check_in.time,
      });

      let next = match due.time {
        Some(time) => Some(time),
        None => match person.frequency.unwrap_or_default().next_due(check_in.time) {
          Ok(time) => Some(time),
          Err(error) => {
            tracing::warn!(person = %due.person_id, error = %error, "could not compute next due time");
            None
          }
        },
      };
      if next.is_some() {
        person.due.check_in = next;
      }
    });
    Some(ticket)
  }

  /// Contacts ordered by due time, soonest first, undated last.
  pub fn due_list(&self, now: DateTime<Utc>) -> Vec<(Person, DueClass)> {
    let mut list: Vec<_> = self
      .all()
      .into_iter()
      .map(|p| {
        let class = due_class(p.due_at(), now);
        (p, class)
      })
      .collect();
    list.sort_by_key(|(p, _)| (p.due_at().is_none(), p.due_at()));
    list
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::TimeZone;
  use touchbase_core::{frequency::Frequency, id::CheckInId};

  use super::*;
  use crate::backend::MemoryStorage;

  fn contacts() -> Contacts<MemoryStorage> { Contacts::new(Arc::new(MemoryStorage::new())) }

  fn person(id: u64, name: &str, email: &str, dial: &str, phone: &str) -> Person {
    let mut p = Person::new(PersonId(id), name);
    p.email = Some(email.into());
    p.dial_code = Some(dial.into());
    p.phone = Some(phone.into());
    p
  }

  #[tokio::test]
  async fn exists_matches_email_or_phone() {
    let c = contacts();
    c.upsert(person(1, "John", "John-Appleseed@mac.com", "+1", "5551234")).await.unwrap();
    c.upsert(person(2, "Kate", "kate@mac.com", "+44", "7700900")).await.unwrap();

    assert_eq!(c.exists(Some("john-appleseed@MAC.com"), None, None, None).as_deref(), Some("John"));
    assert_eq!(c.exists(None, Some("+44"), Some("7700900"), None).as_deref(), Some("Kate"));
    assert_eq!(c.exists(None, Some("+1"), Some("7700900"), None), None);
    assert_eq!(c.exists(Some("kate@mac.com"), None, None, Some(PersonId(2))), None);
    assert_eq!(c.exists(Some(""), None, None, None), None);
  }

  #[tokio::test]
  async fn record_check_in_sets_last_and_due() {
    let c = contacts();
    c.upsert(Person::new(PersonId(1), "John")).await.unwrap();

    let check_in = CheckIn::new(CheckInId(5), "hi", 1_000);
    let due = PersonDue { person_id: PersonId(1), time: Some(9_000) };
    c.record_check_in(&due, &check_in).unwrap().await.unwrap();

    let p = c.person(PersonId(1)).unwrap();
    assert_eq!(p.due_at(), Some(9_000));
    assert_eq!(c.last_check_in(PersonId(1)), Some(1_000));
    assert_eq!(p.last.check_in.unwrap().check_in_id, CheckInId(5));
  }

  #[tokio::test]
  async fn record_check_in_falls_back_to_frequency() {
    let c = contacts();
    let mut p = Person::new(PersonId(1), "John");
    p.frequency = Some(Frequency::Daily);
    c.upsert(p).await.unwrap();

    let due = PersonDue { person_id: PersonId(1), time: None };
    c.record_check_in(&due, &CheckIn::new(CheckInId(5), "hi", 1_000)).unwrap().await.unwrap();
    assert_eq!(c.person(PersonId(1)).unwrap().due_at(), Some(1_000 + 86_400));
  }

  #[tokio::test]
  async fn record_check_in_ignores_unknown_contact() {
    let c = contacts();
    let due = PersonDue { person_id: PersonId(3), time: Some(1) };
    assert!(c.record_check_in(&due, &CheckIn::new(CheckInId(1), "", 0)).is_none());
    assert!(c.is_empty());
  }

  #[tokio::test]
  async fn due_list_sorts_undated_last() {
    let c = contacts();
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let mut a = Person::new(PersonId(1), "a");
    a.due.check_in = Some(now.timestamp() + 30 * 86_400);
    let mut b = Person::new(PersonId(2), "b");
    b.due.check_in = Some(now.timestamp() - 86_400 * 3);
    let undated = Person::new(PersonId(3), "c");
    c.replace_all([undated, a, b]).await.unwrap();

    let list = c.due_list(now);
    let order: Vec<_> = list.iter().map(|(p, class)| (p.person_id.get(), *class)).collect();
    assert_eq!(order, [(2, DueClass::Overdue), (1, DueClass::NotDue), (3, DueClass::NotDue)]);
  }
}
