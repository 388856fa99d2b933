//! The time-of-day access policy and the clock it is evaluated against.
//!
//! The window is wall-clock local time, not an elapsed duration. Callers
//! sample the clock once per attempt and use that single instant for every
//! decision and every row written.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Window ──────────────────────────────────────────────────────────────────

/// Whether `now` falls inside `[start, end]`, both ends inclusive.
///
/// A window whose start is after its end wraps midnight, so `22:00–06:00`
/// admits `23:30` and `05:00`.
pub fn within_window(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
  if start <= end {
    start <= now && now <= end
  } else {
    now >= start || now <= end
  }
}

/// The daily local-time interval during which access is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessWindow {
  start: NaiveTime,
  end:   NaiveTime,
}

impl AccessWindow {
  pub fn new(start: NaiveTime, end: NaiveTime) -> Self { Self { start, end } }

  /// Parse a window from `HH:MM` or `HH:MM:SS` strings.
  pub fn parse(start: &str, end: &str) -> Result<Self> {
    Ok(Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?))
  }

  pub fn start(&self) -> NaiveTime { self.start }

  pub fn end(&self) -> NaiveTime { self.end }

  pub fn contains(&self, now: NaiveTime) -> bool {
    within_window(now, self.start, self.end)
  }
}

impl Default for AccessWindow {
  fn default() -> Self {
    Self::new(
      NaiveTime::MIN + TimeDelta::hours(8),
      NaiveTime::MIN + TimeDelta::hours(18),
    )
  }
}

impl fmt::Display for AccessWindow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} - {}",
      self.start.format("%H:%M"),
      self.end.format("%H:%M")
    )
  }
}

pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
  let s = s.trim();
  NaiveTime::parse_from_str(s, "%H:%M:%S")
    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
    .map_err(|_| Error::InvalidTimeOfDay(s.to_owned()))
}

/// Local midnight at the start of the day containing `now`.
pub fn start_of_day(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
  now - (now.time() - NaiveTime::MIN)
}

// ─── Clock ───────────────────────────────────────────────────────────────────

/// Source of the current local time.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<FixedOffset>;
}

/// The system clock, viewed through a fixed UTC offset or, failing that,
/// through the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
  offset: Option<FixedOffset>,
}

impl SystemClock {
  /// Use the host's local time zone.
  pub fn local() -> Self { Self { offset: None } }

  /// Use a fixed offset east of UTC, in minutes.
  pub fn with_offset_minutes(minutes: i32) -> Result<Self> {
    let offset = FixedOffset::east_opt(minutes * 60)
      .ok_or(Error::InvalidOffset(minutes))?;
    Ok(Self { offset: Some(offset) })
  }
}

impl Clock for SystemClock {
  fn now(&self) -> DateTime<FixedOffset> {
    match self.offset {
      Some(offset) => Utc::now().with_timezone(&offset),
      None => Local::now().fixed_offset(),
    }
  }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
  fn now(&self) -> DateTime<FixedOffset> { self.0 }
}
