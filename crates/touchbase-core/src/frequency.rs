//! Reminder cadence for a contact or group.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{Error, Result};

/// How often the user wants to check in.
///
/// Serialized as its display label (`"Fortnightly"`). On input the numeric
/// code (`0..=6`, in declaration order) is accepted as well, since older
/// records carry `"frequency": 2`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter,
)]
pub enum Frequency {
  #[strum(serialize = "Daily")]
  Daily,
  #[default]
  #[strum(serialize = "Weekly")]
  Weekly,
  #[strum(serialize = "Fortnightly")]
  Fortnightly,
  #[strum(serialize = "Monthly")]
  Monthly,
  #[strum(serialize = "Every 2 months")]
  EveryTwoMonths,
  #[strum(serialize = "Every 3 months")]
  EveryThreeMonths,
  #[strum(serialize = "Every 6 months")]
  EverySixMonths,
}

impl Frequency {
  /// Numeric code used by older records.
  pub fn code(self) -> u8 {
    Self::iter().position(|f| f == self).unwrap_or_default() as u8
  }

  pub fn from_code(code: u64) -> Option<Self> {
    usize::try_from(code).ok().and_then(|i| Self::iter().nth(i))
  }

  /// Parse a display label, case-insensitively.
  pub fn parse_label(label: &str) -> Result<Self> {
    let trimmed = label.trim();
    Self::from_str(trimmed)
      .ok()
      .or_else(|| Self::iter().find(|f| f.to_string().eq_ignore_ascii_case(trimmed)))
      .ok_or_else(|| Error::UnknownFrequency(label.to_owned()))
  }

  /// Timestamp of the next check-in due after `from` (Unix seconds).
  ///
  /// Monthly cadences step calendar months, clamping to the last day of the
  /// target month.
  pub fn next_due(self, from: i64) -> Result<i64> {
    let start =
      DateTime::<Utc>::from_timestamp(from, 0).ok_or(Error::TimestampOutOfRange(from))?;
    let next = match self {
      Self::Daily => start.checked_add_days(Days::new(1)),
      Self::Weekly => start.checked_add_days(Days::new(7)),
      Self::Fortnightly => start.checked_add_days(Days::new(14)),
      Self::Monthly => start.checked_add_months(Months::new(1)),
      Self::EveryTwoMonths => start.checked_add_months(Months::new(2)),
      Self::EveryThreeMonths => start.checked_add_months(Months::new(3)),
      Self::EverySixMonths => start.checked_add_months(Months::new(6)),
    };
    next
      .map(|dt| dt.timestamp())
      .ok_or(Error::TimestampOutOfRange(from))
  }
}

impl Serialize for Frequency {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Frequency {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    deserializer.deserialize_any(FrequencyVisitor)
  }
}

struct FrequencyVisitor;

impl de::Visitor<'_> for FrequencyVisitor {
  type Value = Frequency;

  fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("a frequency label or numeric code")
  }

  fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Frequency, E> {
    Frequency::from_code(v)
      .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
  }

  fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Frequency, E> {
    u64::try_from(v)
      .ok()
      .and_then(Frequency::from_code)
      .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
  }

  fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Frequency, E> {
    if let Ok(code) = v.trim().parse::<u64>() {
      return self.visit_u64(code);
    }
    Frequency::parse_label(v).map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn labels_and_codes_agree() {
    assert_eq!(Frequency::Fortnightly.code(), 2);
    assert_eq!(Frequency::from_code(2), Some(Frequency::Fortnightly));
    assert_eq!(Frequency::from_code(7), None);
    assert_eq!(Frequency::EveryTwoMonths.to_string(), "Every 2 months");
  }

  #[test]
  fn deserializes_label_or_code() {
    let a: Frequency = serde_json::from_str("2").unwrap();
    let b: Frequency = serde_json::from_str("\"Fortnightly\"").unwrap();
    let c: Frequency = serde_json::from_str("\"every 3 months\"").unwrap();
    assert_eq!(a, Frequency::Fortnightly);
    assert_eq!(b, Frequency::Fortnightly);
    assert_eq!(c, Frequency::EveryThreeMonths);
    assert!(serde_json::from_str::<Frequency>("\"Yearly\"").is_err());
  }

  #[test]
  fn serializes_as_label() {
    let json = serde_json::to_string(&Frequency::EverySixMonths).unwrap();
    assert_eq!(json, "\"Every 6 months\"");
  }

  #[test]
  fn next_due_steps_days_and_months() {
    // 2024-01-31T00:00:00Z
    let jan31 = 1_706_659_200;
    assert_eq!(Frequency::Weekly.next_due(jan31).unwrap(), jan31 + 7 * 86_400);
    // One calendar month later clamps to 2024-02-29.
    assert_eq!(Frequency::Monthly.next_due(jan31).unwrap(), 1_709_164_800);
  }
}
