//! Typed entity identifiers.
//!
//! The remote source is inconsistent about id encoding: the same field can
//! arrive as `42` or `"42"`, and JSON object keys are always strings. Each id
//! therefore serializes as a plain number but deserializes from either form.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::Error;

macro_rules! entity_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
    #[serde(transparent)]
    pub struct $name(pub u64);

    impl $name {
      pub fn get(self) -> u64 { self.0 }
    }

    impl From<u64> for $name {
      fn from(raw: u64) -> Self { Self(raw) }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl FromStr for $name {
      type Err = Error;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
          .parse::<u64>()
          .map(Self)
          .map_err(|_| Error::InvalidId(s.to_owned()))
      }
    }

    impl<'de> Deserialize<'de> for $name {
      fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientId).map(Self)
      }
    }
  };
}

entity_id!(
  /// Identifies a contact (a person the user checks in with).
  PersonId
);
entity_id!(
  /// Identifies a group of contacts.
  GroupId
);
entity_id!(
  /// Identifies a single check-in message.
  CheckInId
);
entity_id!(
  /// Identifies the signed-in user.
  UserId
);

// ─── Lenient visitor ─────────────────────────────────────────────────────────

struct LenientId;

impl de::Visitor<'_> for LenientId {
  type Value = u64;

  fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("a non-negative integer id or a numeric string")
  }

  fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> { Ok(v) }

  fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
    u64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
  }

  fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
    if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
      Ok(v as u64)
    } else {
      Err(E::invalid_value(de::Unexpected::Float(v), &self))
    }
  }

  fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
    v.trim()
      .parse()
      .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;

  #[test]
  fn accepts_numbers_and_numeric_strings() {
    let a: CheckInId = serde_json::from_str("7").unwrap();
    let b: CheckInId = serde_json::from_str("\"7\"").unwrap();
    assert_eq!(a, b);
    assert_eq!(a, CheckInId(7));
  }

  #[test]
  fn rejects_negative_and_garbage() {
    assert!(serde_json::from_str::<PersonId>("-1").is_err());
    assert!(serde_json::from_str::<PersonId>("\"abc\"").is_err());
  }

  #[test]
  fn map_keys_serialize_as_strings() {
    let mut map = BTreeMap::new();
    map.insert(GroupId(3), "x");
    let json = serde_json::to_string(&map).unwrap();
    assert_eq!(json, r#"{"3":"x"}"#);

    let back: BTreeMap<GroupId, String> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.get(&GroupId(3)).map(String::as_str), Some("x"));
  }

  #[test]
  fn parses_from_str() {
    assert_eq!(" 12 ".parse::<UserId>().unwrap(), UserId(12));
    assert!(matches!("x".parse::<UserId>(), Err(Error::InvalidId(_))));
  }
}
