//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with
//! microsecond precision, so `<`/`>` on the column is chronological. UUIDs
//! are stored as hyphenated lowercase strings. Enumerations are stored by
//! their lowercase names.

use chrono::{DateTime, SecondsFormat, Utc};
use gatekeep_core::{
  access::{AccessRecord, Direction},
  alert::{Alert, Severity},
  credential::{Credential, CredentialState},
  staff::{User, UserState},
  visitor::{Visitor, VisitorState},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── States ──────────────────────────────────────────────────────────────────

const ACTIVE: &str = "active";
const INACTIVE: &str = "inactive";

fn decode_is_active(column: &'static str, s: &str) -> Result<bool> {
  match s {
    ACTIVE => Ok(true),
    INACTIVE => Ok(false),
    other => Err(Error::Decode { column, value: other.to_owned() }),
  }
}

pub fn encode_visitor_state(s: VisitorState) -> &'static str {
  if s.is_active() { ACTIVE } else { INACTIVE }
}

pub fn decode_visitor_state(s: &str) -> Result<VisitorState> {
  Ok(if decode_is_active("visitors.state", s)? {
    VisitorState::Active
  } else {
    VisitorState::Inactive
  })
}

pub fn encode_credential_state(s: CredentialState) -> &'static str {
  match s {
    CredentialState::Active => ACTIVE,
    CredentialState::Inactive => INACTIVE,
  }
}

pub fn decode_credential_state(s: &str) -> Result<CredentialState> {
  Ok(if decode_is_active("credentials.state", s)? {
    CredentialState::Active
  } else {
    CredentialState::Inactive
  })
}

pub fn encode_user_state(s: UserState) -> &'static str {
  if s.is_active() { ACTIVE } else { INACTIVE }
}

pub fn decode_user_state(s: &str) -> Result<UserState> {
  Ok(if decode_is_active("users.state", s)? {
    UserState::Active
  } else {
    UserState::Inactive
  })
}

// ─── Direction ───────────────────────────────────────────────────────────────

pub fn encode_direction(d: Direction) -> &'static str { d.as_str() }

pub fn decode_direction(s: &str) -> Result<Direction> {
  match s {
    "entry" => Ok(Direction::Entry),
    "exit" => Ok(Direction::Exit),
    other => Err(Error::Decode {
      column: "access_records.direction",
      value:  other.to_owned(),
    }),
  }
}

// ─── Severity ────────────────────────────────────────────────────────────────

pub fn encode_severity(s: Severity) -> &'static str {
  match s {
    Severity::Low => "low",
    Severity::Medium => "medium",
    Severity::High => "high",
  }
}

pub fn decode_severity(s: &str) -> Result<Severity> {
  match s {
    "low" => Ok(Severity::Low),
    "medium" => Ok(Severity::Medium),
    "high" => Ok(Severity::High),
    other => Err(Error::Decode {
      column: "alerts.severity",
      value:  other.to_owned(),
    }),
  }
}

// ─── LIKE patterns ───────────────────────────────────────────────────────────

/// A `LIKE … ESCAPE '\'` pattern matching `text` anywhere in the column.
pub fn like_pattern(text: &str) -> String {
  let mut pattern = String::with_capacity(text.len() + 2);
  pattern.push('%');
  for c in text.chars() {
    if matches!(c, '\\' | '%' | '_') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Each `*_COLUMNS` list matches the field order its raw type reads, starting
// at the column index handed to `read`.

pub const VISITOR_COLUMNS: &str = "v.visitor_id, v.name, v.identification, \
                                   v.organization, v.visit_reason, v.state, \
                                   v.registered_at";

/// Raw strings read directly from a `visitors` row.
pub struct RawVisitor {
  pub visitor_id:     String,
  pub name:           String,
  pub identification: String,
  pub organization:   Option<String>,
  pub visit_reason:   Option<String>,
  pub state:          String,
  pub registered_at:  String,
}

impl RawVisitor {
  pub const WIDTH: usize = 7;

  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      visitor_id:     row.get(at)?,
      name:           row.get(at + 1)?,
      identification: row.get(at + 2)?,
      organization:   row.get(at + 3)?,
      visit_reason:   row.get(at + 4)?,
      state:          row.get(at + 5)?,
      registered_at:  row.get(at + 6)?,
    })
  }

  pub fn into_visitor(self) -> Result<Visitor> {
    Ok(Visitor {
      visitor_id:     decode_uuid(&self.visitor_id)?,
      name:           self.name,
      identification: self.identification,
      organization:   self.organization,
      visit_reason:   self.visit_reason,
      state:          decode_visitor_state(&self.state)?,
      registered_at:  decode_dt(&self.registered_at)?,
    })
  }
}

pub const CREDENTIAL_COLUMNS: &str = "c.credential_id, c.visitor_id, c.code, \
                                      c.state, c.expires_at, c.issued_at";

/// Raw strings read directly from a `credentials` row.
pub struct RawCredential {
  pub credential_id: String,
  pub visitor_id:    String,
  pub code:          String,
  pub state:         String,
  pub expires_at:    Option<String>,
  pub issued_at:     String,
}

impl RawCredential {
  pub const WIDTH: usize = 6;

  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      credential_id: row.get(at)?,
      visitor_id:    row.get(at + 1)?,
      code:          row.get(at + 2)?,
      state:         row.get(at + 3)?,
      expires_at:    row.get(at + 4)?,
      issued_at:     row.get(at + 5)?,
    })
  }

  pub fn into_credential(self) -> Result<Credential> {
    Ok(Credential {
      credential_id: decode_uuid(&self.credential_id)?,
      visitor_id:    decode_uuid(&self.visitor_id)?,
      code:          self.code,
      state:         decode_credential_state(&self.state)?,
      expires_at:    self.expires_at.as_deref().map(decode_dt).transpose()?,
      issued_at:     decode_dt(&self.issued_at)?,
    })
  }
}

pub const RECORD_COLUMNS: &str = "a.record_id, a.actor_id, a.visitor_id, \
                                  a.credential_id, a.direction, a.authorized, \
                                  a.recorded_at";

/// Raw values read directly from an `access_records` row.
pub struct RawAccessRecord {
  pub record_id:     String,
  pub actor_id:      String,
  pub visitor_id:    Option<String>,
  pub credential_id: Option<String>,
  pub direction:     String,
  pub authorized:    bool,
  pub recorded_at:   String,
}

impl RawAccessRecord {
  pub const WIDTH: usize = 7;

  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:     row.get(at)?,
      actor_id:      row.get(at + 1)?,
      visitor_id:    row.get(at + 2)?,
      credential_id: row.get(at + 3)?,
      direction:     row.get(at + 4)?,
      authorized:    row.get(at + 5)?,
      recorded_at:   row.get(at + 6)?,
    })
  }

  pub fn into_record(self) -> Result<AccessRecord> {
    Ok(AccessRecord {
      record_id:     decode_uuid(&self.record_id)?,
      actor_id:      decode_uuid(&self.actor_id)?,
      visitor_id:    decode_opt_uuid(self.visitor_id)?,
      credential_id: decode_opt_uuid(self.credential_id)?,
      direction:     decode_direction(&self.direction)?,
      authorized:    self.authorized,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}

pub const ALERT_COLUMNS: &str =
  "alert_id, description, severity, actor_id, visitor_id, raised_at";

/// Raw strings read directly from an `alerts` row.
pub struct RawAlert {
  pub alert_id:    String,
  pub description: String,
  pub severity:    String,
  pub actor_id:    Option<String>,
  pub visitor_id:  Option<String>,
  pub raised_at:   String,
}

impl RawAlert {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      alert_id:    row.get(0)?,
      description: row.get(1)?,
      severity:    row.get(2)?,
      actor_id:    row.get(3)?,
      visitor_id:  row.get(4)?,
      raised_at:   row.get(5)?,
    })
  }

  pub fn into_alert(self) -> Result<Alert> {
    Ok(Alert {
      alert_id:    decode_uuid(&self.alert_id)?,
      description: self.description,
      severity:    decode_severity(&self.severity)?,
      actor_id:    decode_opt_uuid(self.actor_id)?,
      visitor_id:  decode_opt_uuid(self.visitor_id)?,
      raised_at:   decode_dt(&self.raised_at)?,
    })
  }
}

pub const USER_COLUMNS: &str =
  "u.user_id, u.name, u.email, u.role_id, u.state, u.created_at";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:    String,
  pub name:       String,
  pub email:      String,
  pub role_id:    String,
  pub state:      String,
  pub created_at: String,
}

impl RawUser {
  pub const WIDTH: usize = 6;

  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(at)?,
      name:       row.get(at + 1)?,
      email:      row.get(at + 2)?,
      role_id:    row.get(at + 3)?,
      state:      row.get(at + 4)?,
      created_at: row.get(at + 5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      name:       self.name,
      email:      self.email,
      role_id:    decode_uuid(&self.role_id)?,
      state:      decode_user_state(&self.state)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
