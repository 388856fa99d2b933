//! Handlers for `/visitors` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/visitors` | Optional `?state=active\|inactive&q=<text>` |
//! | `POST` | `/visitors` | Body: [`CreateBody`]; returns 201 |
//! | `GET`  | `/visitors/{id}` | 404 if not found |
//! | `PUT`  | `/visitors/{id}` | Body: visitor details |
//! | `POST` | `/visitors/{id}/state` | Body: `{"state":"inactive"}`; toggles when omitted |
//! | `GET`  | `/visitors/{id}/credentials` | Newest first |
//! | `POST` | `/visitors/{id}/credentials` | Body: `{"ttl_hours":4}`, optional |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::TimeDelta;
use gatekeep_core::{
  credential::Credential,
  permission::Permission,
  store::AccessStore,
  visitor::{
    Visitor, VisitorDetails, VisitorQuery, VisitorState, VisitorSummary,
  },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Staff, require},
  error::ApiError,
};

async fn find_visitor<S: AccessStore>(
  store: &S,
  visitor_id: Uuid,
) -> Result<Visitor, ApiError> {
  store
    .get_visitor(visitor_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("visitor {visitor_id} not found"))
    })
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub state: Option<VisitorState>,
  /// Matches name, identification or organization.
  #[serde(alias = "q")]
  pub text:  Option<String>,
}

/// `GET /visitors[?state=<state>][&q=<text>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<VisitorSummary>>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewVisitors).await?;

  let query = VisitorQuery {
    state: params.state,
    text:  params
      .text
      .map(|t| t.trim().to_owned())
      .filter(|t| !t.is_empty()),
  };
  let visitors = state
    .store
    .list_visitors(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(visitors))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(flatten)]
  pub details:          VisitorDetails,
  /// Issue a credential with the configured lifetime in the same step.
  #[serde(default)]
  pub issue_credential: bool,
}

#[derive(Debug, Serialize)]
pub struct Registered {
  pub visitor:    Visitor,
  pub credential: Option<Credential>,
}

/// `POST /visitors`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::CreateVisitors).await?;

  let details = body.details.normalized()?;
  let ttl = body.issue_credential.then(|| state.config.credential_ttl());

  let (visitor, credential) = state
    .store
    .register_visitor(details, ttl, state.now())
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    visitor_id = %visitor.visitor_id,
    issued = credential.is_some(),
    "registered visitor"
  );
  Ok((StatusCode::CREATED, Json(Registered { visitor, credential })))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /visitors/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
) -> Result<Json<Visitor>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewVisitors).await?;
  Ok(Json(find_visitor(&*state.store, id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /visitors/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
  Json(details): Json<VisitorDetails>,
) -> Result<Json<Visitor>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::EditVisitors).await?;

  let visitor = state
    .store
    .update_visitor(id, details.normalized()?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(visitor))
}

// ─── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct StateBody {
  pub state: Option<VisitorState>,
}

/// `POST /visitors/{id}/state`
pub async fn set_state<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
  Json(body): Json<StateBody>,
) -> Result<Json<Visitor>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ChangeVisitorState).await?;

  let target = match body.state {
    Some(target) => target,
    None => find_visitor(&*state.store, id).await?.state.toggled(),
  };
  let visitor = state
    .store
    .set_visitor_state(id, target)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    visitor_id = %id,
    state = ?visitor.state,
    "visitor state changed"
  );
  Ok(Json(visitor))
}

// ─── Credentials ──────────────────────────────────────────────────────────────

/// `GET /visitors/{id}/credentials`
pub async fn credentials<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Credential>>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewVisitors).await?;
  find_visitor(&*state.store, id).await?;

  let credentials = state
    .store
    .list_credentials(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(credentials))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IssueBody {
  /// Lifetime of the credential. Defaults to the configured lifetime.
  pub ttl_hours: Option<i64>,
}

/// `POST /visitors/{id}/credentials`
pub async fn issue<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
  Json(body): Json<IssueBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::IssueCredentials).await?;

  let ttl = match body.ttl_hours {
    None => state.config.credential_ttl(),
    Some(hours) if hours > 0 => TimeDelta::try_hours(hours)
      .ok_or_else(|| ApiError::BadRequest("ttl_hours is too large".into()))?,
    Some(_) => {
      return Err(ApiError::BadRequest("ttl_hours must be positive".into()));
    }
  };

  let credential = state
    .store
    .issue_credential(id, ttl, state.now())
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    visitor_id = %id,
    credential_id = %credential.credential_id,
    "issued credential"
  );
  Ok((StatusCode::CREATED, Json(credential)))
}
