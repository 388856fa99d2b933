//! Handlers for `/users` and `/me` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users` | |
//! | `POST` | `/users` | Body: `{"name","email","password","role_id"}`; returns 201 |
//! | `PUT`  | `/users/{id}` | Body: `{"name","email","password"?}`; password kept if absent |
//! | `POST` | `/users/{id}/state` | Body: `{"state":"inactive"}` |
//! | `POST` | `/users/{id}/role` | Body: `{"role_id":"…"}` |
//! | `GET`  | `/me/permissions` | Any authenticated user |

use std::collections::BTreeSet;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use gatekeep_core::{
  permission::Permission,
  staff::{NewUser, User, UserState, UserUpdate},
  store::AccessStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Staff, hash_password, require},
  error::ApiError,
};

const MIN_PASSWORD_LEN: usize = 8;

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /users`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewUsers).await?;
  let users = state.store.list_users().await.map_err(ApiError::store)?;
  Ok(Json(users))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:     String,
  pub email:    String,
  pub password: String,
  pub role_id:  Uuid,
}

/// `POST /users`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::CreateUsers).await?;

  let name = body.name.trim();
  let email = body.email.trim();
  if name.is_empty() || email.is_empty() {
    return Err(ApiError::BadRequest("name and email are required".into()));
  }
  if body.password.is_empty() {
    return Err(ApiError::BadRequest("password is required".into()));
  }

  let password_hash = hash_password(&body.password)
    .map_err(|e| ApiError::Store(e.to_string().into()))?;

  let user = state
    .store
    .create_user(
      NewUser {
        name: name.to_owned(),
        email: email.to_owned(),
        password_hash,
        role_id: body.role_id,
      },
      state.now(),
    )
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    user_id = %user.user_id,
    role_id = %user.role_id,
    "created user"
  );
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Edit ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub name:     String,
  pub email:    String,
  pub password: Option<String>,
}

/// `PUT /users/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<User>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::EditUsers).await?;

  let name = body.name.trim();
  let email = body.email.trim();
  if name.is_empty() || email.is_empty() {
    return Err(ApiError::BadRequest("name and email are required".into()));
  }

  let password_hash = match body.password.filter(|p| !p.is_empty()) {
    Some(p) if p.chars().count() < MIN_PASSWORD_LEN => {
      return Err(ApiError::BadRequest(format!(
        "password must be at least {MIN_PASSWORD_LEN} characters"
      )));
    }
    Some(p) => Some(
      hash_password(&p).map_err(|e| ApiError::Store(e.to_string().into()))?,
    ),
    None => None,
  };
  let password_changed = password_hash.is_some();

  let user = state
    .store
    .update_user(id, UserUpdate {
      name: name.to_owned(),
      email: email.to_owned(),
      password_hash,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(user_id = %user.user_id, password_changed, "updated user");
  Ok(Json(user))
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StateBody {
  pub state: UserState,
}

/// `POST /users/{id}/state`
pub async fn set_state<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
  Json(body): Json<StateBody>,
) -> Result<Json<User>, ApiError>
where
  S: AccessStore + 'static,
{
  let grant =
    require(&*state.store, &staff, Permission::ChangeUserState).await?;

  if id == grant.actor.user_id && !body.state.is_active() {
    return Err(ApiError::BadRequest("cannot deactivate yourself".into()));
  }

  let user = state
    .store
    .set_user_state(id, body.state)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(user))
}

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub role_id: Uuid,
}

/// `POST /users/{id}/role`
pub async fn set_role<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
  Json(body): Json<RoleBody>,
) -> Result<Json<User>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::AssignRoles).await?;

  let user = state
    .store
    .set_user_role(id, body.role_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(user))
}

// ─── Me ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MeResponse {
  pub user:        User,
  pub permissions: BTreeSet<Permission>,
}

/// `GET /me/permissions`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
) -> Result<Json<MeResponse>, ApiError>
where
  S: AccessStore + 'static,
{
  let permissions = state
    .store
    .permissions_for(staff.user.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(MeResponse { user: staff.user, permissions }))
}
