//! Staff users and the roles that grant them permissions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permission::Permission;

// ─── Roles ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
  pub role_id:     Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub permissions: BTreeSet<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
  pub name:        String,
  pub description: Option<String>,
  #[serde(default)]
  pub permissions: BTreeSet<Permission>,
}

/// The roles seeded into an empty store.
pub fn default_roles() -> Vec<NewRole> {
  use Permission::*;

  let role = |name: &str, description: &str, permissions: &[Permission]| {
    NewRole {
      name:        name.to_owned(),
      description: Some(description.to_owned()),
      permissions: permissions.iter().copied().collect(),
    }
  };

  vec![
    NewRole {
      name:        "administrator".into(),
      description: Some("Full access to every module".into()),
      permissions: Permission::all(),
    },
    role("guard", "Checks visitors in and out at the gate", &[
      ViewDashboard,
      ViewVisitors,
      ControlAccess,
      ViewAccessLog,
      ViewAlerts,
      CreateAlerts,
    ]),
    role("receptionist", "Registers visitors and issues credentials", &[
      ViewDashboard,
      ViewVisitors,
      CreateVisitors,
      EditVisitors,
      ChangeVisitorState,
      IssueCredentials,
      ViewAccessLog,
    ]),
    role("supervisor", "Reviews activity, alerts and reports", &[
      ViewDashboard,
      ViewVisitors,
      ViewAccessLog,
      ViewAlerts,
      CreateAlerts,
      EditAlerts,
      ViewReports,
      GenerateReports,
      ExportReports,
      ViewUsers,
    ]),
  ]
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
  Active,
  Inactive,
}

impl UserState {
  pub fn is_active(self) -> bool { matches!(self, Self::Active) }
}

/// A staff member. Holds exactly one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub name:       String,
  pub email:      String,
  pub role_id:    Uuid,
  pub state:      UserState,
  pub created_at: DateTime<Utc>,
}

/// A user together with the stored password hash; only ever handed to the
/// authentication layer.
#[derive(Debug, Clone)]
pub struct UserLogin {
  pub user:          User,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Input to [`crate::store::StaffDirectory::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub role_id:       Uuid,
}

/// Input to [`crate::store::StaffDirectory::update_user`]. The stored hash is
/// kept when `password_hash` is `None`.
#[derive(Debug, Clone)]
pub struct UserUpdate {
  pub name:          String,
  pub email:         String,
  pub password_hash: Option<String>,
}
