//! Storage traits.
//!
//! The traits are implemented by storage backends (e.g.
//! `gatekeep-store-sqlite`). The gate and the HTTP layer depend on these
//! abstractions, not on any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::{collections::BTreeSet, future::Future};

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use uuid::Uuid;

use crate::{
  access::{
    AccessEntry, AccessQuery, AccessRecord, AccessSummary, DailyActivity,
    FrequentVisitor, Overview, ReportRange,
  },
  alert::{Alert, AlertQuery, NewAlert},
  credential::{Credential, UsableCredential},
  gate::{Outcome, Verdict},
  permission::Permission,
  staff::{NewRole, NewUser, Role, User, UserLogin, UserState, UserUpdate},
  visitor::{
    Visitor, VisitorDetails, VisitorQuery, VisitorState, VisitorSummary,
  },
};

/// Coarse classification of a store failure, for callers that need to tell
/// a missing row or a rejected change apart from a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Conflict,
  Internal,
}

pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind { ErrorKind::Internal }
}

/// The error type shared by every store trait of one backend.
pub trait Store: Send + Sync {
  type Error: StoreError;
}

// ─── Visitors ────────────────────────────────────────────────────────────────

pub trait VisitorRegistry: Store {
  /// Register a visitor and, if `issue_ttl` is set, issue its first
  /// credential in the same transaction.
  fn register_visitor(
    &self,
    details: VisitorDetails,
    issue_ttl: Option<TimeDelta>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(Visitor, Option<Credential>), Self::Error>> + Send + '_;

  fn get_visitor(
    &self,
    visitor_id: Uuid,
  ) -> impl Future<Output = Result<Option<Visitor>, Self::Error>> + Send + '_;

  /// List visitors, newest registration first.
  fn list_visitors<'a>(
    &'a self,
    query: &'a VisitorQuery,
  ) -> impl Future<Output = Result<Vec<VisitorSummary>, Self::Error>> + Send + 'a;

  /// Replace a visitor's details. Changing `identification` is rejected once
  /// any access record references the visitor.
  fn update_visitor(
    &self,
    visitor_id: Uuid,
    details: VisitorDetails,
  ) -> impl Future<Output = Result<Visitor, Self::Error>> + Send + '_;

  /// Move a visitor to `state`. Deactivation also deactivates every active
  /// credential the visitor holds, atomically.
  fn set_visitor_state(
    &self,
    visitor_id: Uuid,
    state: VisitorState,
  ) -> impl Future<Output = Result<Visitor, Self::Error>> + Send + '_;
}

// ─── Credentials ─────────────────────────────────────────────────────────────

pub trait CredentialRegistry: Store {
  /// Find an active, unexpired credential with this code whose visitor is
  /// active. Expiry is strict (`expires_at > now`).
  fn find_usable(
    &self,
    code: String,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<UsableCredential>, Self::Error>> + Send + '_;

  /// Issue a fresh credential expiring at `now + ttl`. Any credential the
  /// visitor already holds is deactivated in the same transaction, so at
  /// most one is authoritative.
  fn issue_credential(
    &self,
    visitor_id: Uuid,
    ttl: TimeDelta,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + '_;

  /// Deactivate a credential. Returns `false` if it was not active.
  fn deactivate_credential(
    &self,
    credential_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_credentials(
    &self,
    visitor_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Credential>, Self::Error>> + Send + '_;
}

// ─── Access ledger ───────────────────────────────────────────────────────────

/// What an attempt committed.
#[derive(Debug, Clone)]
pub struct AttemptReceipt {
  pub outcome: Outcome,
  pub record:  Option<AccessRecord>,
  pub alert:   Option<Alert>,
}

pub trait AccessLedger: Store {
  /// Run one access attempt as a single isolated transaction: look up the
  /// usable credential for `code` at `now`, hand it to `decide`, then apply
  /// the verdict's writes. Either everything the verdict asks for is
  /// committed or nothing is.
  fn resolve_attempt<F>(
    &self,
    code: String,
    now: DateTime<Utc>,
    decide: F,
  ) -> impl Future<Output = Result<AttemptReceipt, Self::Error>> + Send + '_
  where
    F: FnOnce(Option<&UsableCredential>) -> Verdict + Send + 'static;

  /// List ledger entries, newest first.
  fn list_access_records<'a>(
    &'a self,
    query: &'a AccessQuery,
  ) -> impl Future<Output = Result<Vec<AccessEntry>, Self::Error>> + Send + 'a;

  fn access_summary(
    &self,
    range: ReportRange,
  ) -> impl Future<Output = Result<AccessSummary, Self::Error>> + Send + '_;

  /// Visitors ranked by number of recorded entries.
  fn frequent_visitors(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<FrequentVisitor>, Self::Error>> + Send + '_;

  /// Visitors whose latest authorized record since `since` is an entry.
  fn visitors_on_premises(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Visitor>, Self::Error>> + Send + '_;

  /// Dashboard counters at `now`; "today" starts at `day_start`.
  fn overview(
    &self,
    now: DateTime<Utc>,
    day_start: DateTime<Utc>,
  ) -> impl Future<Output = Result<Overview, Self::Error>> + Send + '_;

  /// Per-day counts of records at or after `since`, bucketed by local date
  /// in `offset`. Newest day first; days without records are omitted.
  fn daily_activity(
    &self,
    since: DateTime<Utc>,
    offset: FixedOffset,
  ) -> impl Future<Output = Result<Vec<DailyActivity>, Self::Error>> + Send + '_;
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

pub trait AlertSink: Store {
  fn raise_alert(
    &self,
    alert: NewAlert,
  ) -> impl Future<Output = Result<Alert, Self::Error>> + Send + '_;

  /// List alerts, newest first.
  fn list_alerts<'a>(
    &'a self,
    query: &'a AlertQuery,
  ) -> impl Future<Output = Result<Vec<Alert>, Self::Error>> + Send + 'a;

  /// Administrative removal. Returns `false` if no such alert exists.
  fn delete_alert(
    &self,
    alert_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Permissions ─────────────────────────────────────────────────────────────

pub trait PermissionStore: Store {
  /// The permissions granted by the user's role, recomputed on every call.
  /// Unknown and inactive users hold nothing.
  fn permissions_for(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<BTreeSet<Permission>, Self::Error>> + Send + '_;
}

// ─── Staff ───────────────────────────────────────────────────────────────────

pub trait StaffDirectory: Store {
  fn create_role(
    &self,
    role: NewRole,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  fn list_roles(
    &self,
  ) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send + '_;

  fn set_role_permissions(
    &self,
    role_id: Uuid,
    permissions: BTreeSet<Permission>,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  /// Rename a role, replace its description and its whole permission set.
  fn update_role(
    &self,
    role_id: Uuid,
    role: NewRole,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  /// Delete a role no user holds.
  fn delete_role(
    &self,
    role_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert the default roles if the role table is empty. Returns how many
  /// were created.
  fn seed_default_roles(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn create_user(
    &self,
    user: NewUser,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn update_user(
    &self,
    user_id: Uuid,
    update: UserUpdate,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Look up an active user by e-mail, with the stored password hash.
  fn find_login<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<UserLogin>, Self::Error>> + Send + 'a;

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  fn set_user_role(
    &self,
    user_id: Uuid,
    role_id: Uuid,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn set_user_state(
    &self,
    user_id: Uuid,
    state: UserState,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;
}

// ─── Umbrella ────────────────────────────────────────────────────────────────

/// Every store capability the service needs, in one bound.
pub trait AccessStore:
  VisitorRegistry
  + CredentialRegistry
  + AccessLedger
  + AlertSink
  + PermissionStore
  + StaffDirectory
{
}

impl<T> AccessStore for T where
  T: VisitorRegistry
    + CredentialRegistry
    + AccessLedger
    + AlertSink
    + PermissionStore
    + StaffDirectory
{
}
