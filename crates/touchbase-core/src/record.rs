//! Entity records held by the cache.
//!
//! Each record names its identifier and the scheduling fields the cache
//! maintains. Any other field the remote source sends is kept verbatim in
//! `extra`, so a record written back to disk is exactly what was received.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

use crate::{
  frequency::Frequency,
  id::{CheckInId, GroupId, PersonId, UserId},
};

/// Fields the cache does not interpret.
pub type Extra = Map<String, Value>;

// ─── Scheduling ──────────────────────────────────────────────────────────────

/// Next expected check-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Due {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub check_in: Option<i64>,
}

/// Most recent check-in with a single person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCheckIn {
  pub check_in_id: CheckInId,
  pub time:        i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonLast {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub check_in: Option<LastCheckIn>,
}

/// Most recent check-in with a whole group: one check-in per member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLastCheckIn {
  #[serde(default)]
  pub check_in_ids: Vec<CheckInId>,
  pub time:         i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLast {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub check_in: Option<GroupLastCheckIn>,
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// A contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
  pub person_id:       PersonId,
  #[serde(default)]
  pub name:            String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:           Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dial_code:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone:           Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub country_code:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub national_number: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub frequency:       Option<Frequency>,
  #[serde(default)]
  pub due:             Due,
  #[serde(default)]
  pub last:            PersonLast,
  #[serde(flatten)]
  pub extra:           Extra,
}

impl Person {
  pub fn new(person_id: PersonId, name: impl Into<String>) -> Self {
    Self {
      person_id,
      name: name.into(),
      email: None,
      dial_code: None,
      phone: None,
      country_code: None,
      national_number: None,
      frequency: None,
      due: Due::default(),
      last: PersonLast::default(),
      extra: Extra::new(),
    }
  }

  pub fn due_at(&self) -> Option<i64> { self.due.check_in }

  pub fn last_check_in_at(&self) -> Option<i64> {
    self.last.check_in.as_ref().map(|c| c.time)
  }
}

// ─── Group ───────────────────────────────────────────────────────────────────

/// A named group of contacts checked in with together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
  pub group_id:   GroupId,
  #[serde(default)]
  pub group_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub frequency:  Option<Frequency>,
  /// Pending notification count, as reported by the remote source.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notify:     Option<u32>,
  #[serde(default)]
  pub due:        Due,
  #[serde(default)]
  pub last:       GroupLast,
  #[serde(flatten)]
  pub extra:      Extra,
}

impl Group {
  pub fn new(group_id: GroupId, group_name: impl Into<String>) -> Self {
    Self {
      group_id,
      group_name: group_name.into(),
      frequency: None,
      notify: None,
      due: Due::default(),
      last: GroupLast::default(),
      extra: Extra::new(),
    }
  }

  pub fn due_at(&self) -> Option<i64> { self.due.check_in }
}

// ─── Check-in ────────────────────────────────────────────────────────────────

/// One end of a check-in: a contact or the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Party {
  Person {
    #[serde(rename = "personId")]
    person_id: PersonId,
  },
  User {
    #[serde(rename = "userId")]
    user_id: UserId,
  },
}

impl Party {
  pub fn user_id(&self) -> Option<UserId> {
    match self {
      Self::User { user_id } => Some(*user_id),
      Self::Person { .. } => None,
    }
  }

  pub fn person_id(&self) -> Option<PersonId> {
    match self {
      Self::Person { person_id } => Some(*person_id),
      Self::User { .. } => None,
    }
  }
}

/// A single directional message between the user and a contact.
///
/// Replies are chained through `reply1` and `reply2`; a thread is at most
/// three messages deep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
  pub check_in_id: CheckInId,
  #[serde(default)]
  pub text:        String,
  /// Creation time.
  #[serde(default)]
  pub time:        i64,
  /// Time the check-in was read; absent, empty or `0` means unread.
  #[serde(
    default,
    deserialize_with = "optional_time",
    skip_serializing_if = "Option::is_none"
  )]
  pub read:        Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub to:          Option<Party>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from:        Option<Party>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reply1:      Option<CheckInId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reply2:      Option<CheckInId>,
  #[serde(flatten)]
  pub extra:       Extra,
}

impl CheckIn {
  pub fn new(check_in_id: CheckInId, text: impl Into<String>, time: i64) -> Self {
    Self {
      check_in_id,
      text: text.into(),
      time,
      read: None,
      to: None,
      from: None,
      reply1: None,
      reply2: None,
      extra: Extra::new(),
    }
  }

  pub fn is_read(&self) -> bool { self.read.is_some_and(|t| t > 0) }

  /// Whether this check-in is addressed directly to `user`.
  pub fn is_to_user(&self, user: UserId) -> bool {
    self.to.and_then(|p| p.user_id()) == Some(user)
  }

  /// This check-in followed by its replies, in thread order.
  pub fn thread_ids(&self) -> impl Iterator<Item = CheckInId> {
    std::iter::once(self.check_in_id).chain(self.reply1).chain(self.reply2)
  }
}

/// A timestamp that may arrive as a number, a numeric string, an empty
/// string or `null`. Empty and `null` both mean "not set".
fn optional_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
  deserializer.deserialize_any(OptionalTime)
}

struct OptionalTime;

impl<'de> de::Visitor<'de> for OptionalTime {
  type Value = Option<i64>;

  fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("a timestamp, a numeric string, an empty string or null")
  }

  fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> { Ok(None) }

  fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> { Ok(None) }

  fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
    deserializer.deserialize_any(self)
  }

  fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> { Ok(Some(v)) }

  fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
    i64::try_from(v)
      .map(Some)
      .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
  }

  fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
      Ok(Some(v as i64))
    } else {
      Err(E::invalid_value(de::Unexpected::Float(v), &self))
    }
  }

  fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
    let trimmed = v.trim();
    if trimmed.is_empty() {
      return Ok(None);
    }
    trimmed
      .parse()
      .map(Some)
      .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
  }
}

// ─── User ────────────────────────────────────────────────────────────────────

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub user_id: UserId,
  #[serde(default)]
  pub name:    String,
  #[serde(flatten)]
  pub extra:   Extra,
}

// ─── Remote receipts ─────────────────────────────────────────────────────────

/// New schedule for a contact after a completed check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDue {
  pub person_id: PersonId,
  /// Next due time; computed from the contact's frequency when absent.
  #[serde(default)]
  pub time:      Option<i64>,
}

/// New schedule for a group after a completed group check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDue {
  pub group_id: GroupId,
  pub time:     i64,
  /// Time of the group check-in just completed.
  pub last:     i64,
}

/// Result of checking in with one contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonCheckInReceipt {
  pub check_in: CheckIn,
  pub due:      PersonDue,
}

/// Result of checking in with a group: one receipt per member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCheckInReceipt {
  pub check_ins: Vec<PersonCheckInReceipt>,
  pub due:       GroupDue,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn person_keeps_unknown_fields() {
    let raw = json!({
      "personId": 42,
      "name": "John Appleseed",
      "email": "John-Appleseed@mac.com",
      "frequency": 2,
      "due": { "checkIn": 1694042853 },
      "last": { "checkIn": { "checkInId": 1, "time": 1694042853 } },
      "avatar": "john.png"
    });
    let person: Person = serde_json::from_value(raw).unwrap();
    assert_eq!(person.person_id, PersonId(42));
    assert_eq!(person.frequency, Some(Frequency::Fortnightly));
    assert_eq!(person.due_at(), Some(1694042853));
    assert_eq!(person.last_check_in_at(), Some(1694042853));
    assert!(person.extra.contains_key("avatar"));

    let back = serde_json::to_value(&person).unwrap();
    assert_eq!(back["avatar"], "john.png");
    assert_eq!(back["personId"], 42);
  }

  #[test]
  fn check_in_with_string_reply_ids() {
    let raw = json!({
      "checkInId": "2",
      "text": "hi",
      "time": 1692158913,
      "to": { "userId": 9 },
      "from": { "personId": 1 },
      "reply1": "1"
    });
    let c: CheckIn = serde_json::from_value(raw).unwrap();
    assert_eq!(c.check_in_id, CheckInId(2));
    assert_eq!(c.reply1, Some(CheckInId(1)));
    assert!(c.is_to_user(UserId(9)));
    assert!(!c.is_to_user(UserId(1)));
    assert_eq!(c.from.and_then(|p| p.person_id()), Some(PersonId(1)));
    assert_eq!(c.thread_ids().collect::<Vec<_>>(), vec![CheckInId(2), CheckInId(1)]);
  }

  #[test]
  fn zero_read_counts_as_unread() {
    let mut c = CheckIn::new(CheckInId(1), "x", 10);
    assert!(!c.is_read());
    c.read = Some(0);
    assert!(!c.is_read());
    c.read = Some(11);
    assert!(c.is_read());
  }

  #[test]
  fn read_accepts_empty_and_string_times() {
    let parse = |read: Value| {
      let raw = json!({ "checkInId": 3, "text": "x", "time": 5, "read": read, "mood": "ok" });
      serde_json::from_value::<CheckIn>(raw).unwrap()
    };
    assert_eq!(parse(json!("")).read, None);
    assert_eq!(parse(Value::Null).read, None);
    assert_eq!(parse(json!("1700000000")).read, Some(1_700_000_000));
    assert_eq!(parse(json!(1_700_000_000)).read, Some(1_700_000_000));
    assert!(!parse(json!("")).is_read());
    assert!(parse(json!("12")).is_read());

    let bad = json!({ "checkInId": 3, "read": "soon" });
    assert!(serde_json::from_value::<CheckIn>(bad).is_err());
  }

  #[test]
  fn group_defaults_missing_scheduling() {
    let g: Group = serde_json::from_value(json!({ "groupId": 5, "groupName": "Family" })).unwrap();
    assert_eq!(g.due, Due::default());
    assert_eq!(g.last, GroupLast::default());
  }
}
