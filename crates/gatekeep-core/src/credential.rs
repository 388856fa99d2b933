//! Credentials: short human-typed codes that admit one visitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::visitor::Visitor;

/// Length of a generated credential code.
pub const CODE_LENGTH: usize = 8;

/// Lifetime of a credential when the configuration does not say otherwise.
pub const DEFAULT_TTL_HOURS: i64 = 8;

/// Lifecycle state of a credential. Once inactive, a credential never
/// becomes active again; a new one is issued instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialState {
  Active,
  Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
  pub credential_id: Uuid,
  pub visitor_id:    Uuid,
  pub code:          String,
  pub state:         CredentialState,
  pub expires_at:    Option<DateTime<Utc>>,
  pub issued_at:     DateTime<Utc>,
}

impl Credential {
  /// Whether the credential is active and not yet expired at `now`.
  ///
  /// Expiry is strict: a credential expiring exactly at `now` is expired.
  pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
    self.state == CredentialState::Active
      && self.expires_at.is_none_or(|exp| exp > now)
  }
}

/// A credential that passed the lookup filter, joined to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsableCredential {
  pub credential: Credential,
  pub visitor:    Visitor,
}

impl UsableCredential {
  /// Re-check the lookup filter against `now`.
  pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
    self.visitor.state.is_active() && self.credential.is_usable_at(now)
  }
}

/// Generate a fresh credential code: the leading characters of a random v4
/// UUID, upper-cased. Uniqueness is ultimately enforced by the store.
pub fn generate_code() -> String {
  let mut code = Uuid::new_v4().simple().to_string();
  code.truncate(CODE_LENGTH);
  code.make_ascii_uppercase();
  code
}

/// Normalise a presented code the same way codes are generated.
pub fn normalize_code(raw: &str) -> String { raw.trim().to_ascii_uppercase() }
