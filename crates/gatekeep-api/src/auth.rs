//! HTTP Basic staff authentication and permission guards.
//!
//! [`Staff`] authenticates a request against the user table. Handlers then
//! call [`require`] for the permission their operation needs; permissions are
//! read from the store on every check, so role edits apply immediately.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use gatekeep_core::{
  permission::Permission,
  staff::User,
  store::{AccessStore, PermissionStore},
};
use rand_core::OsRng;

use crate::{AppState, error::ApiError};

/// An authenticated, active staff member.
#[derive(Debug, Clone)]
pub struct Staff {
  pub user: User,
}

/// Proof that `actor` held `permission` when the check ran.
#[derive(Debug, Clone)]
pub struct Grant {
  pub actor:      User,
  pub permission: Permission,
}

/// Split an `Authorization: Basic …` header into e-mail and password.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (email, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((email.to_owned(), password.to_owned()))
}

/// Check `password` against an argon2 PHC string.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
  PasswordHash::new(password_hash)
    .and_then(|parsed| {
      Argon2::default().verify_password(password.as_bytes(), &parsed)
    })
    .is_ok()
}

/// Hash `password` into an argon2id PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)?
      .to_string(),
  )
}

impl<S> FromRequestParts<AppState<S>> for Staff
where
  S: AccessStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let (email, password) = basic_credentials(&parts.headers)?;

    let login = state
      .store
      .find_login(&email)
      .await
      .map_err(ApiError::store)?
      .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&password, &login.password_hash) {
      tracing::warn!(%email, "rejected staff credentials");
      return Err(ApiError::Unauthorized);
    }

    Ok(Staff { user: login.user })
  }
}

/// Require `permission` of `staff`, re-reading the role's grants.
pub async fn require<S>(
  store: &S,
  staff: &Staff,
  permission: Permission,
) -> Result<Grant, ApiError>
where
  S: PermissionStore,
{
  let held = store
    .permissions_for(staff.user.user_id)
    .await
    .map_err(ApiError::store)?;

  if !held.contains(&permission) {
    tracing::warn!(
      user_id = %staff.user.user_id,
      %permission,
      "permission denied"
    );
    return Err(ApiError::Forbidden(permission));
  }

  Ok(Grant { actor: staff.user.clone(), permission })
}
