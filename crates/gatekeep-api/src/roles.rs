//! Handlers for `/roles` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/roles` | |
//! | `POST`   | `/roles` | Body: `{"name","description","permissions":["acceso.control_acceso"]}` |
//! | `PUT`    | `/roles/{id}` | Body: `{"name","description","permissions":[…]}` |
//! | `PUT`    | `/roles/{id}/permissions` | Body: `{"permissions":[…]}`; replaces the set |
//! | `DELETE` | `/roles/{id}` | 409 while any user holds the role |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use gatekeep_core::{
  permission::{Permission, parse_permissions},
  staff::{NewRole, Role},
  store::AccessStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Staff, require},
  error::ApiError,
};

/// `GET /roles`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
) -> Result<Json<Vec<Role>>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ManageRoles).await?;
  let roles = state.store.list_roles().await.map_err(ApiError::store)?;
  Ok(Json(roles))
}

/// Permission names arrive as plain strings so an unknown one is reported
/// as a 400 naming it, not as a body rejection.
#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub name:        String,
  pub description: Option<String>,
  #[serde(default)]
  pub permissions: Vec<String>,
}

/// `POST /roles`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Json(body): Json<RoleBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ManageRoles).await?;

  let role = state
    .store
    .create_role(body.into_new_role()?)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(role_id = %role.role_id, name = %role.name, "created role");
  Ok((StatusCode::CREATED, Json(role)))
}

impl RoleBody {
  fn into_new_role(self) -> Result<NewRole, ApiError> {
    let name = self.name.trim();
    if name.is_empty() {
      return Err(ApiError::BadRequest("name is required".into()));
    }
    Ok(NewRole {
      name:        name.to_owned(),
      description: self.description.filter(|d| !d.trim().is_empty()),
      permissions: parse_permissions(self.permissions)?,
    })
  }
}

/// `PUT /roles/{id}`: rename and replace the permission set together.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
  Json(body): Json<RoleBody>,
) -> Result<Json<Role>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ManageRoles).await?;

  let role = state
    .store
    .update_role(id, body.into_new_role()?)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    role_id = %id,
    name = %role.name,
    permissions = role.permissions.len(),
    "updated role"
  );
  Ok(Json(role))
}

#[derive(Debug, Deserialize)]
pub struct PermissionsBody {
  pub permissions: Vec<String>,
}

/// `PUT /roles/{id}/permissions`
pub async fn set_permissions<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
  Json(body): Json<PermissionsBody>,
) -> Result<Json<Role>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ManagePermissions).await?;

  let permissions = parse_permissions(body.permissions)?;
  let role = state
    .store
    .set_role_permissions(id, permissions)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    role_id = %id,
    permissions = role.permissions.len(),
    "replaced role permissions"
  );
  Ok(Json(role))
}

/// `DELETE /roles/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ManageRoles).await?;
  state.store.delete_role(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
