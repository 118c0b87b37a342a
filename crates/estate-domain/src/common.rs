//! Shared traits, identifiers, and time utilities for estate records.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Two amounts closer than this are considered equal when checking balances.
pub const BALANCE_TOLERANCE: f64 = 0.005;

/// Exposes a stable identifier for entities stored in the workspace.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Provides read-only access to an entity's display name.
pub trait NamedEntity {
    fn name(&self) -> &str;
}

/// Converts an entity into a user-facing display label.
pub trait Displayable {
    fn display_label(&self) -> String;
}

/// Derives `as_str`, `Display`, and `FromStr` for a fieldless enum from snake_case labels.
///
/// Parsing is case-insensitive and accepts `-` or spaces in place of `_`.
#[macro_export]
macro_rules! labelled_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
                match normalized.as_str() {
                    $($label => Ok($name::$variant),)+
                    other => Err(format!("unknown {} `{}`", stringify!($name), other)),
                }
            }
        }
    };
}

/// Rounds a monetary amount to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Returns true when two amounts agree within [`BALANCE_TOLERANCE`].
pub fn amounts_match(left: f64, right: f64) -> bool {
    (left - right).abs() < BALANCE_TOLERANCE
}

/// Lifecycle flag shared by structural records (properties, blocks, floors).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

crate::labelled_enum!(RecordStatus {
    Active => "active",
    Inactive => "inactive",
});

/// Urgency attached to maintenance requests and support tickets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

crate::labelled_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

/// User-facing sequential reference such as `PRP-0007`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tid(String);

impl Tid {
    pub fn format(prefix: &str, sequence: u32) -> Self {
        Self(format!("{}-{:04}", prefix, sequence))
    }

    /// Splits a reference into its prefix and sequence number.
    pub fn parse(raw: &str) -> Option<(String, u32)> {
        let (prefix, digits) = raw.trim().rsplit_once('-')?;
        if prefix.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let sequence = digits.parse().ok()?;
        Some((prefix.to_ascii_uppercase(), sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> &str {
        self.0.rsplit_once('-').map(|(prefix, _)| prefix).unwrap_or("")
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Enumerates time units used by `TimeInterval`.
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Year,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeUnit::Day => "Day",
            TimeUnit::Week => "Week",
            TimeUnit::Month => "Month",
            TimeUnit::Year => "Year",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Represents a time unit and multiplier for billing cycles.
pub struct TimeInterval {
    pub every: u32,
    pub unit: TimeUnit,
}

impl TimeInterval {
    pub fn monthly() -> Self {
        Self {
            every: 1,
            unit: TimeUnit::Month,
        }
    }

    /// The date one interval after `from`, or `None` past the calendar's range.
    pub fn next_date(&self, from: NaiveDate) -> Option<NaiveDate> {
        self.step(from, i64::from(self.every))
    }

    pub fn previous_date(&self, from: NaiveDate) -> Option<NaiveDate> {
        self.step(from, -i64::from(self.every))
    }

    /// Steps `from` forward (or backward for negative `steps`) a whole number of intervals.
    pub fn add_to(&self, from: NaiveDate, steps: i32) -> Option<NaiveDate> {
        (0..steps.unsigned_abs()).try_fold(from, |date, _| {
            if steps >= 0 {
                self.next_date(date)
            } else {
                self.previous_date(date)
            }
        })
    }

    /// The `n`-th occurrence counted from `from`, computed directly so month-end
    /// anchors do not drift (Jan 31 stays on the last day of each month).
    pub fn nth_date(&self, from: NaiveDate, n: u32) -> Option<NaiveDate> {
        self.step(from, i64::from(self.every).checked_mul(i64::from(n))?)
    }

    fn step(&self, from: NaiveDate, count: i64) -> Option<NaiveDate> {
        match self.unit {
            TimeUnit::Day => from.checked_add_signed(Duration::try_days(count)?),
            TimeUnit::Week => from.checked_add_signed(Duration::try_weeks(count)?),
            TimeUnit::Month => shift_month(from, count),
            TimeUnit::Year => shift_month(from, count.checked_mul(12)?),
        }
    }

    pub fn label(&self) -> String {
        match (self.every, &self.unit) {
            (1, TimeUnit::Day) => "Daily".into(),
            (1, TimeUnit::Week) => "Weekly".into(),
            (1, TimeUnit::Month) => "Monthly".into(),
            (1, TimeUnit::Year) => "Yearly".into(),
            (n, unit) => format!("Every {} {}{}", n, unit, if n > 1 { "s" } else { "" }),
        }
    }
}

impl Default for TimeInterval {
    fn default() -> Self {
        Self::monthly()
    }
}

/// Moves a date by whole months, clamping the day to the target month's length.
/// `None` when the result falls outside the representable calendar.
pub fn shift_month(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let index = i64::from(date.year())
        .checked_mul(12)?
        .checked_add(i64::from(date.month0()))?
        .checked_add(months)?;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = index.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.with_day(date.day().min(days_in_month(year, month)))
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Inclusive day count between two dates; zero when `end` precedes `start`.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        0
    } else {
        (end - start).num_days() + 1
    }
}

/// True when two inclusive date ranges share at least one day.
pub fn ranges_overlap(
    first: (NaiveDate, NaiveDate),
    second: (NaiveDate, NaiveDate),
) -> bool {
    first.0 <= second.1 && second.0 <= first.1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_interval_clamps_to_month_end() {
        let interval = TimeInterval::monthly();
        assert_eq!(interval.next_date(date(2024, 1, 31)), Some(date(2024, 2, 29)));
        assert_eq!(interval.next_date(date(2023, 1, 31)), Some(date(2023, 2, 28)));
        assert_eq!(interval.previous_date(date(2024, 3, 31)), Some(date(2024, 2, 29)));
        assert_eq!(interval.nth_date(date(2024, 1, 31), 2), Some(date(2024, 3, 31)));
    }

    #[test]
    fn year_interval_crosses_leap_day() {
        let interval = TimeInterval {
            every: 1,
            unit: TimeUnit::Year,
        };
        assert_eq!(interval.next_date(date(2024, 2, 29)), Some(date(2025, 2, 28)));
        assert_eq!(interval.add_to(date(2024, 6, 1), -2), Some(date(2022, 6, 1)));
    }

    #[test]
    fn steps_past_the_calendar_are_none() {
        let start = date(2025, 1, 1);
        let months = TimeInterval { every: 4_000_000, unit: TimeUnit::Month };
        assert_eq!(months.next_date(start), None);
        assert_eq!(months.nth_date(start, u32::MAX), None);
        let days = TimeInterval { every: 1_000_000_000, unit: TimeUnit::Day };
        assert_eq!(days.next_date(start), None);
        let years = TimeInterval { every: u32::MAX, unit: TimeUnit::Year };
        assert_eq!(years.previous_date(start), None);
        assert_eq!(shift_month(start, i64::MAX), None);
    }

    #[test]
    fn tid_formats_and_parses() {
        let tid = Tid::format("PRP", 7);
        assert_eq!(tid.as_str(), "PRP-0007");
        assert_eq!(tid.prefix(), "PRP");
        assert_eq!(Tid::parse("prp-0007"), Some(("PRP".into(), 7)));
        assert_eq!(Tid::parse("PRP-"), None);
        assert_eq!(Tid::parse("nodash"), None);
    }

    #[test]
    fn overlap_is_inclusive() {
        let a = (date(2025, 1, 1), date(2025, 1, 10));
        let b = (date(2025, 1, 10), date(2025, 1, 20));
        let c = (date(2025, 1, 11), date(2025, 1, 20));
        assert!(ranges_overlap(a, b));
        assert!(!ranges_overlap(a, c));
        assert_eq!(inclusive_days(a.0, a.1), 10);
    }
}
