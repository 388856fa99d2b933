//! The access gate: decides one access attempt and records it durably.
//!
//! The decision is the pure function [`decide`]. [`AccessGate`] samples the
//! clock once, hands `decide` to the store's [`AccessLedger::resolve_attempt`]
//! so that lookup, decision and writes share one transaction, and folds any
//! storage failure into [`Outcome::Unavailable`].
//!
//! The gate does not check permissions. Callers must already hold
//! [`Permission::ControlAccess`](crate::permission::Permission::ControlAccess).

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  access::{Direction, NewAccessRecord},
  alert::{NewAlert, Severity},
  credential::{UsableCredential, normalize_code},
  policy::{AccessWindow, Clock, SystemClock},
  store::AccessLedger,
};

/// Presented codes longer than this are cut short when quoted in an alert.
const MAX_QUOTED_CODE: usize = 64;

// ─── Attempt ─────────────────────────────────────────────────────────────────

/// One presentation of a code at the gate.
#[derive(Debug, Clone)]
pub struct Attempt {
  pub actor_id:  Uuid,
  /// The code exactly as presented.
  pub raw_code:  String,
  /// The code as looked up.
  pub code:      String,
  pub direction: Direction,
  /// The single sampled instant, in the gate's local offset.
  pub at:        DateTime<FixedOffset>,
}

impl Attempt {
  pub fn new(
    actor_id: Uuid,
    raw_code: &str,
    direction: Direction,
    at: DateTime<FixedOffset>,
  ) -> Self {
    Self {
      actor_id,
      raw_code: raw_code.to_owned(),
      code: normalize_code(raw_code),
      direction,
      at,
    }
  }

  fn at_utc(&self) -> DateTime<Utc> { self.at.with_timezone(&Utc) }

  fn quoted_code(&self) -> String {
    self.raw_code.chars().take(MAX_QUOTED_CODE).collect()
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
  /// No active, unexpired credential with an active visitor matched.
  InvalidOrExpired,
  /// The credential is valid but local time is outside the window.
  OutsideHours,
}

/// The result of one access attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
  Authorized {
    visitor_id:   Uuid,
    visitor_name: String,
    direction:    Direction,
  },
  Denied {
    reason: DenialReason,
  },
  /// Storage failed and nothing was committed; the attempt may be retried.
  Unavailable,
}

/// How an outcome is presented to the person at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeClass {
  Success,
  Warning,
  Danger,
}

impl Outcome {
  pub fn class(&self) -> OutcomeClass {
    match self {
      Self::Authorized { .. } => OutcomeClass::Success,
      Self::Denied { reason: DenialReason::OutsideHours } => OutcomeClass::Warning,
      Self::Denied { reason: DenialReason::InvalidOrExpired } => OutcomeClass::Danger,
      Self::Unavailable => OutcomeClass::Danger,
    }
  }

  pub fn is_authorized(&self) -> bool { matches!(self, Self::Authorized { .. }) }

  /// The message shown at the gate. Every invalid-credential cause reads the
  /// same.
  pub fn message(&self) -> String {
    match self {
      Self::Authorized { visitor_name, direction: Direction::Entry, .. } => {
        format!("Entry authorized for {visitor_name}")
      }
      Self::Authorized { visitor_name, direction: Direction::Exit, .. } => {
        format!("Exit registered for {visitor_name}")
      }
      Self::Denied { reason: DenialReason::InvalidOrExpired } => {
        "Invalid or expired code".to_owned()
      }
      Self::Denied { reason: DenialReason::OutsideHours } => {
        "Access outside permitted hours".to_owned()
      }
      Self::Unavailable => {
        "The attempt could not be recorded; please try again".to_owned()
      }
    }
  }

  fn denied(reason: DenialReason) -> Self { Self::Denied { reason } }
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// A decision plus every write it requires. Applied by the store as one
/// unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
  pub outcome:    Outcome,
  pub record:     Option<NewAccessRecord>,
  pub alert:      Option<NewAlert>,
  /// Credential to move to inactive (an authorized exit).
  pub deactivate: Option<Uuid>,
}

/// Decide an attempt given the result of the credential lookup.
///
/// - nothing usable: deny, one high alert quoting the code, no record
/// - outside the window: deny, one unauthorized record, one medium alert
/// - otherwise: authorize, one authorized record, and an exit closes the
///   credential
pub fn decide(
  found: Option<&UsableCredential>,
  attempt: &Attempt,
  window: &AccessWindow,
) -> Verdict {
  let at = attempt.at_utc();

  let Some(usable) = found.filter(|u| u.is_usable_at(at)) else {
    return Verdict {
      outcome:    Outcome::denied(DenialReason::InvalidOrExpired),
      record:     None,
      alert:      Some(NewAlert {
        description: format!(
          "Access attempt with invalid code: {}",
          attempt.quoted_code()
        ),
        severity:    Severity::High,
        actor_id:    Some(attempt.actor_id),
        visitor_id:  None,
        raised_at:   at,
      }),
      deactivate: None,
    };
  };

  let visitor = &usable.visitor;
  let credential = &usable.credential;
  let inside = window.contains(attempt.at.time());

  let record = NewAccessRecord {
    actor_id:      attempt.actor_id,
    visitor_id:    Some(visitor.visitor_id),
    credential_id: Some(credential.credential_id),
    direction:     attempt.direction,
    authorized:    inside,
    recorded_at:   at,
  };

  if !inside {
    return Verdict {
      outcome:    Outcome::denied(DenialReason::OutsideHours),
      record:     Some(record),
      alert:      Some(NewAlert {
        description: format!(
          "Access attempt outside permitted hours ({window}): {}",
          visitor.name
        ),
        severity:    Severity::Medium,
        actor_id:    Some(attempt.actor_id),
        visitor_id:  Some(visitor.visitor_id),
        raised_at:   at,
      }),
      deactivate: None,
    };
  }

  Verdict {
    outcome:    Outcome::Authorized {
      visitor_id:   visitor.visitor_id,
      visitor_name: visitor.name.clone(),
      direction:    attempt.direction,
    },
    record:     Some(record),
    alert:      None,
    deactivate: (attempt.direction == Direction::Exit)
      .then_some(credential.credential_id),
  }
}

// ─── Gate ────────────────────────────────────────────────────────────────────

/// Orchestrates access attempts against a store.
///
/// Cloning is cheap; the store and clock are shared.
pub struct AccessGate<S> {
  store:  Arc<S>,
  window: AccessWindow,
  clock:  Arc<dyn Clock>,
}

impl<S> Clone for AccessGate<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      window: self.window,
      clock:  Arc::clone(&self.clock),
    }
  }
}

impl<S: AccessLedger> AccessGate<S> {
  /// A gate evaluating `window` against the host's local time.
  pub fn new(store: Arc<S>, window: AccessWindow) -> Self {
    Self { store, window, clock: Arc::new(SystemClock::local()) }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn window(&self) -> &AccessWindow { &self.window }

  pub fn clock(&self) -> &dyn Clock { self.clock.as_ref() }

  /// Decide and record one attempt at the current time.
  pub async fn attempt_access(
    &self,
    actor_id: Uuid,
    code: &str,
    direction: Direction,
  ) -> Outcome {
    let at = self.clock.now();
    self.attempt_access_at(actor_id, code, direction, at).await
  }

  /// Decide and record one attempt at `at`.
  pub async fn attempt_access_at(
    &self,
    actor_id: Uuid,
    code: &str,
    direction: Direction,
    at: DateTime<FixedOffset>,
  ) -> Outcome {
    let attempt = Attempt::new(actor_id, code, direction, at);
    let lookup_code = attempt.code.clone();
    let now = attempt.at_utc();
    let window = self.window;

    let result = self
      .store
      .resolve_attempt(lookup_code, now, move |found| {
        decide(found, &attempt, &window)
      })
      .await;

    match result {
      Ok(receipt) => {
        let record_id = receipt.record.as_ref().map(|r| r.record_id);
        let alert_id = receipt.alert.as_ref().map(|a| a.alert_id);
        match &receipt.outcome {
          Outcome::Authorized { visitor_id, .. } => tracing::info!(
            %actor_id, %visitor_id, %direction, ?record_id,
            "access authorized"
          ),
          Outcome::Denied { reason } => tracing::warn!(
            %actor_id, %direction, ?reason, ?record_id, ?alert_id,
            "access denied"
          ),
          Outcome::Unavailable => {}
        }
        receipt.outcome
      }
      Err(e) => {
        tracing::error!(
          %actor_id, %direction, error = %e,
          "access attempt rolled back"
        );
        Outcome::Unavailable
      }
    }
  }
}
