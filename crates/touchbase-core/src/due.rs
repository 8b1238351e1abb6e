//! Due-date bucketing.
//!
//! A timestamp is first reduced to a [`DueSpan`] relative to "now" (today,
//! tomorrow, in N days/weeks/months, N days ago, ...). The span drives both the
//! short phrase shown next to a contact and the [`DueClass`] bucket used to
//! order contacts and groups by urgency.

use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};

const DAY: f64 = 86_400.0;

/// Urgency bucket of a due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DueClass {
  Overdue,
  Due,
  Soon,
  NotDue,
}

/// A timestamp expressed relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueSpan {
  Today,
  Tomorrow,
  InDays(i64),
  InWeeks(i64),
  InMonth,
  InMonths(i64),
  InYears(i64),
  Yesterday,
  DaysAgo(i64),
  WeekAgo,
  WeeksAgo(i64),
  MonthAgo,
  MonthsAgo(i64),
  YearsAgo(i64),
}

impl DueSpan {
  /// Express `timestamp` (Unix seconds) relative to `now`.
  ///
  /// With `date_only`, "now" is truncated to midnight so calendar dates
  /// compare by day rather than by time of day.
  pub fn between(timestamp: i64, now: DateTime<Utc>, date_only: bool) -> Self {
    let today = if date_only {
      now.date_naive().and_time(NaiveTime::MIN).and_utc()
    } else {
      now
    };
    let diff = today.timestamp().saturating_sub(timestamp) as f64;

    if diff < 0.0 {
      Self::forward(-diff)
    } else {
      Self::backward(diff)
    }
  }

  fn forward(secs: f64) -> Self {
    let days = secs / DAY;
    let weeks = (days / 7.0).floor() as i64;
    let months = days / 30.0;

    if secs < DAY {
      Self::Today
    } else if days < 2.0 {
      Self::Tomorrow
    } else if weeks > 4 && weeks < 8 {
      Self::InWeeks(weeks)
    } else if weeks == 4 {
      Self::InMonth
    } else if months > 12.0 {
      Self::InYears((months / 12.0).floor() as i64)
    } else if months > 1.0 {
      Self::InMonths(months.ceil() as i64)
    } else {
      let whole = days.floor() as i64;
      if whole % 7 == 0 {
        Self::InWeeks(whole / 7)
      } else {
        Self::InDays(whole)
      }
    }
  }

  fn backward(secs: f64) -> Self {
    let days = secs / DAY;
    let weeks = days / 7.0;
    let months = days / 30.0;

    if days < 1.0 {
      Self::Today
    } else if days < 2.0 {
      Self::Yesterday
    } else if months > 12.0 {
      Self::YearsAgo((months / 12.0).floor() as i64)
    } else if months > 1.0 {
      Self::MonthsAgo(months.ceil() as i64)
    } else if weeks.ceil() as i64 == 4 {
      Self::MonthAgo
    } else if weeks > 1.0 {
      Self::WeeksAgo(weeks.ceil() as i64)
    } else if (6.0..=7.0).contains(&days) {
      Self::WeekAgo
    } else {
      Self::DaysAgo(days.ceil() as i64)
    }
  }

  pub fn is_past(self) -> bool {
    matches!(
      self,
      Self::Yesterday
        | Self::DaysAgo(_)
        | Self::WeekAgo
        | Self::WeeksAgo(_)
        | Self::MonthAgo
        | Self::MonthsAgo(_)
        | Self::YearsAgo(_)
    )
  }

  pub fn class(self) -> DueClass {
    match self {
      s if s.is_past() => DueClass::Overdue,
      Self::Today | Self::Tomorrow | Self::InWeeks(1) => DueClass::Due,
      Self::InDays(n) if n <= 7 => DueClass::Due,
      Self::InDays(n) if n <= 14 => DueClass::Soon,
      Self::InWeeks(2) => DueClass::Soon,
      _ => DueClass::NotDue,
    }
  }
}

impl fmt::Display for DueSpan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let plural = |n: i64| if n == 1 { "" } else { "s" };
    match *self {
      Self::Today => f.write_str("today"),
      Self::Tomorrow => f.write_str("tomorrow"),
      Self::InDays(n) => write!(f, "in {n} day{}", plural(n)),
      Self::InWeeks(n) => write!(f, "in {n} week{}", plural(n)),
      Self::InMonth => f.write_str("in 1 month"),
      Self::InMonths(n) => write!(f, "in ~ {n} months"),
      Self::InYears(n) => write!(f, "in {n}+ year{}", plural(n)),
      Self::Yesterday => f.write_str("yesterday"),
      Self::DaysAgo(n) => write!(f, "{n} days ago"),
      Self::WeekAgo => f.write_str("1 week ago"),
      Self::WeeksAgo(n) => write!(f, "{n} weeks ago"),
      Self::MonthAgo => f.write_str("1 month ago"),
      Self::MonthsAgo(n) => write!(f, "{n} months ago"),
      Self::YearsAgo(n) => write!(f, "{n}+ years ago"),
    }
  }
}

/// Bucket an optional due timestamp. A missing due date is never urgent.
pub fn due_class(timestamp: Option<i64>, now: DateTime<Utc>) -> DueClass {
  timestamp
    .map(|ts| DueSpan::between(ts, now, false).class())
    .unwrap_or(DueClass::NotDue)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  const D: i64 = 86_400;

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap() }

  fn span(offset: i64) -> DueSpan {
    DueSpan::between(now().timestamp() + offset, now(), false)
  }

  #[test]
  fn near_forward_dates() {
    assert_eq!(span(3600), DueSpan::Today);
    assert_eq!(span(D + 3600), DueSpan::Tomorrow);
    assert_eq!(span(3 * D + 10), DueSpan::InDays(3));
  }

  #[test]
  fn week_tie_breaks() {
    assert_eq!(span(7 * D + 10), DueSpan::InWeeks(1));
    assert_eq!(span(7 * D + 10).to_string(), "in 1 week");
    assert_eq!(span(14 * D + 10), DueSpan::InWeeks(2));
    assert_eq!(span(28 * D + 10), DueSpan::InMonth);
    assert_eq!(span(35 * D + 10), DueSpan::InWeeks(5));
    assert_eq!(span(10 * D + 10), DueSpan::InDays(10));
  }

  #[test]
  fn far_forward_dates() {
    assert_eq!(span(70 * D), DueSpan::InMonths(3));
    assert_eq!(span(400 * D), DueSpan::InYears(1));
    assert_eq!(span(400 * D).to_string(), "in 1+ year");
  }

  #[test]
  fn backward_dates() {
    assert_eq!(span(-3600), DueSpan::Today);
    assert_eq!(span(-(D + 10)), DueSpan::Yesterday);
    assert_eq!(span(-(3 * D)), DueSpan::DaysAgo(3));
    assert_eq!(span(-(6 * D + 10)), DueSpan::WeekAgo);
    assert_eq!(span(-(10 * D)), DueSpan::WeeksAgo(2));
    assert_eq!(span(-(25 * D)), DueSpan::MonthAgo);
    assert_eq!(span(-(45 * D)), DueSpan::MonthsAgo(2));
    assert_eq!(span(-(800 * D)), DueSpan::YearsAgo(2));
  }

  #[test]
  fn classes() {
    assert_eq!(span(-(3 * D)).class(), DueClass::Overdue);
    assert_eq!(span(-(D + 10)).class(), DueClass::Overdue);
    assert_eq!(span(3600).class(), DueClass::Due);
    assert_eq!(span(D + 3600).class(), DueClass::Due);
    assert_eq!(span(5 * D + 10).class(), DueClass::Due);
    assert_eq!(span(7 * D + 10).class(), DueClass::Due);
    assert_eq!(span(10 * D + 10).class(), DueClass::Soon);
    assert_eq!(span(14 * D + 10).class(), DueClass::Soon);
    assert_eq!(span(21 * D + 10).class(), DueClass::NotDue);
    assert_eq!(span(90 * D).class(), DueClass::NotDue);
    assert_eq!(due_class(None, now()), DueClass::NotDue);
    assert_eq!(DueClass::NotDue.to_string(), "notdue");
  }

  #[test]
  fn extreme_timestamps_saturate() {
    assert_eq!(DueSpan::between(i64::MIN, now(), false).class(), DueClass::Overdue);
    assert_eq!(DueSpan::between(i64::MAX, now(), false).class(), DueClass::NotDue);
    assert_eq!(due_class(Some(i64::MAX), now()), DueClass::NotDue);
  }

  #[test]
  fn date_only_compares_from_midnight() {
    // 11:00 tomorrow is 23h away from noon but 35h from midnight.
    let ts = now().timestamp() + 23 * 3600;
    assert_eq!(DueSpan::between(ts, now(), false), DueSpan::Today);
    assert_eq!(DueSpan::between(ts, now(), true), DueSpan::Tomorrow);
  }
}
