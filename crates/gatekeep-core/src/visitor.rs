//! Visitors: the people who are granted time-bounded physical access.
//!
//! A visitor exclusively owns its credentials. Deactivating a visitor
//! deactivates every credential it holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Lifecycle state of a visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitorState {
  Active,
  Inactive,
}

impl VisitorState {
  pub fn is_active(self) -> bool { matches!(self, Self::Active) }

  /// The state a toggle action moves to.
  pub fn toggled(self) -> Self {
    match self {
      Self::Active => Self::Inactive,
      Self::Inactive => Self::Active,
    }
  }
}

/// A registered visitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visitor {
  pub visitor_id:     Uuid,
  pub name:           String,
  /// External identification document number. Unique across visitors and
  /// frozen once any access record references the visitor.
  pub identification: String,
  pub organization:   Option<String>,
  pub visit_reason:   Option<String>,
  pub state:          VisitorState,
  pub registered_at:  DateTime<Utc>,
}

/// Caller-supplied visitor details, used both to register a visitor and to
/// replace the details of an existing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorDetails {
  pub name:           String,
  pub identification: String,
  pub organization:   Option<String>,
  pub visit_reason:   Option<String>,
}

impl VisitorDetails {
  /// Trim every field, drop blank optional ones, and require a name and an
  /// identification.
  pub fn normalized(self) -> Result<Self> {
    let required = |value: String, field| {
      let value = value.trim().to_owned();
      if value.is_empty() { Err(Error::MissingField(field)) } else { Ok(value) }
    };
    let optional = |value: Option<String>| {
      value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
    };

    Ok(Self {
      name:           required(self.name, "name")?,
      identification: required(self.identification, "identification")?,
      organization:   optional(self.organization),
      visit_reason:   optional(self.visit_reason),
    })
  }
}

/// A visitor as listed for staff: the visitor, its current active code (if
/// any), and how many entries it has on record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorSummary {
  #[serde(flatten)]
  pub visitor:     Visitor,
  pub active_code: Option<String>,
  pub entry_count: u64,
}

/// Parameters for [`crate::store::VisitorRegistry::list_visitors`].
#[derive(Debug, Clone, Default)]
pub struct VisitorQuery {
  pub state: Option<VisitorState>,
  /// Substring matched against name, identification and organization.
  pub text:  Option<String>,
}
