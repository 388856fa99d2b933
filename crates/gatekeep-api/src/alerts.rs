//! Handlers for `/alerts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/alerts` | Optional `severity`, `from`, `to`, `limit` |
//! | `POST`   | `/alerts` | Body: `{"description":"…","severity":"low"}` |
//! | `DELETE` | `/alerts/{id}` | 204, or 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use gatekeep_core::{
  alert::{Alert, AlertQuery, NewAlert, Severity},
  permission::Permission,
  store::AccessStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Staff, require},
  error::ApiError,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub severity: Option<Severity>,
  pub from:     Option<DateTime<Utc>>,
  pub to:       Option<DateTime<Utc>>,
  pub limit:    Option<usize>,
}

/// `GET /alerts`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Alert>>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewAlerts).await?;

  let query = AlertQuery {
    severity: params.severity,
    from:     params.from,
    to:       params.to,
    limit:    params.limit,
  };
  let alerts = state
    .store
    .list_alerts(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(alerts))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub description: String,
  pub severity:    Severity,
  pub visitor_id:  Option<Uuid>,
}

/// `POST /alerts`: a manual alert attributed to the caller.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccessStore + 'static,
{
  let grant = require(&*state.store, &staff, Permission::CreateAlerts).await?;

  let description = body.description.trim();
  if description.is_empty() {
    return Err(ApiError::BadRequest("description is required".into()));
  }

  let alert = state
    .store
    .raise_alert(NewAlert {
      description: description.to_owned(),
      severity:    body.severity,
      actor_id:    Some(grant.actor.user_id),
      visitor_id:  body.visitor_id,
      raised_at:   state.now(),
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(alert)))
}

/// `DELETE /alerts/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: AccessStore + 'static,
{
  let grant = require(&*state.store, &staff, Permission::DeleteAlerts).await?;

  let deleted = state
    .store
    .delete_alert(id)
    .await
    .map_err(ApiError::store)?;
  if !deleted {
    return Err(ApiError::NotFound(format!("alert {id} not found")));
  }

  tracing::info!(
    alert_id = %id,
    user_id = %grant.actor.user_id,
    "deleted alert"
  );
  Ok(StatusCode::NO_CONTENT)
}
