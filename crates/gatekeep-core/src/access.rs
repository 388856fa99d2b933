//! The access ledger: append-only records of gate decisions, and the report
//! types derived from it.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, alert::AlertCounts};

// ─── Direction ───────────────────────────────────────────────────────────────

/// Which way a visitor is moving through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Entry,
  Exit,
}

impl Direction {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Entry => "entry",
      Self::Exit => "exit",
    }
  }
}

impl fmt::Display for Direction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Accepts the form values `entrada`/`salida`, the English names, and a few
/// common aliases, case-insensitively. Anything else is rejected.
impl FromStr for Direction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "entrada" | "entry" | "enter" | "in" | "ingreso" | "ingress" => {
        Ok(Self::Entry)
      }
      "salida" | "exit" | "out" | "egreso" | "egress" => Ok(Self::Exit),
      _ => Err(Error::UnknownDirection(s.to_owned())),
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// An immutable audit-ledger entry for an authorized or policy-denied
/// attempt. Attempts with an unusable code never produce one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
  pub record_id:     Uuid,
  /// The staff member who performed the check.
  pub actor_id:      Uuid,
  pub visitor_id:    Option<Uuid>,
  pub credential_id: Option<Uuid>,
  pub direction:     Direction,
  pub authorized:    bool,
  pub recorded_at:   DateTime<Utc>,
}

/// Input for a new ledger row. `recorded_at` is the attempt's sampled time,
/// so the record and the policy decision agree on the instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccessRecord {
  pub actor_id:      Uuid,
  pub visitor_id:    Option<Uuid>,
  pub credential_id: Option<Uuid>,
  pub direction:     Direction,
  pub authorized:    bool,
  pub recorded_at:   DateTime<Utc>,
}

/// A ledger row joined with display names, as listed for staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEntry {
  #[serde(flatten)]
  pub record:       AccessRecord,
  pub visitor_name: Option<String>,
  pub actor_name:   Option<String>,
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::AccessLedger::list_access_records`].
#[derive(Debug, Clone, Default)]
pub struct AccessQuery {
  /// Inclusive lower bound on `recorded_at`.
  pub from:       Option<DateTime<Utc>>,
  /// Inclusive upper bound on `recorded_at`.
  pub to:         Option<DateTime<Utc>>,
  pub direction:  Option<Direction>,
  pub authorized: Option<bool>,
  pub visitor_id: Option<Uuid>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Longest span a single report may cover.
pub const MAX_REPORT_DAYS: i64 = 31;

/// A validated, inclusive reporting interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
  pub from: DateTime<Utc>,
  pub to:   DateTime<Utc>,
}

impl ReportRange {
  pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
    if to < from {
      return Err(Error::InvalidReportRange(
        "end of range precedes its start".into(),
      ));
    }
    if to - from > TimeDelta::days(MAX_REPORT_DAYS) {
      return Err(Error::InvalidReportRange(format!(
        "range may not exceed {MAX_REPORT_DAYS} days"
      )));
    }
    Ok(Self { from, to })
  }
}

/// Aggregate counts over the ledger for a [`ReportRange`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSummary {
  pub total:           u64,
  pub authorized:      u64,
  pub denied:          u64,
  pub unique_visitors: u64,
  pub entries:         u64,
  pub exits:           u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequentVisitor {
  pub visitor_id:   Uuid,
  pub name:         String,
  pub organization: Option<String>,
  pub entries:      u64,
}

/// Dashboard counters for the current local day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overview {
  pub active_visitors:      u64,
  pub active_credentials:   u64,
  pub active_users:         u64,
  pub accesses_today:       u64,
  pub alerts_today:         AlertCounts,
  pub visitors_on_premises: u64,
}

/// How many past days the daily activity report covers, besides today.
pub const STATS_DAYS: i64 = 7;

/// Ledger counts for one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
  pub date:    NaiveDate,
  pub total:   u64,
  pub entries: u64,
  pub exits:   u64,
  pub denied:  u64,
}
