//! Alerts: durable records of anomalous or denied events, independent of
//! the access ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
  pub alert_id:    Uuid,
  pub description: String,
  pub severity:    Severity,
  pub actor_id:    Option<Uuid>,
  pub visitor_id:  Option<Uuid>,
  pub raised_at:   DateTime<Utc>,
}

/// Input to [`crate::store::AlertSink::raise_alert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
  pub description: String,
  pub severity:    Severity,
  pub actor_id:    Option<Uuid>,
  pub visitor_id:  Option<Uuid>,
  pub raised_at:   DateTime<Utc>,
}

/// Parameters for [`crate::store::AlertSink::list_alerts`].
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
  pub severity: Option<Severity>,
  pub from:     Option<DateTime<Utc>>,
  pub to:       Option<DateTime<Utc>>,
  pub limit:    Option<usize>,
}

/// Alert totals broken down by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
  pub total:  u64,
  pub high:   u64,
  pub medium: u64,
  pub low:    u64,
}
