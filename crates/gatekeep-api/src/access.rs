//! Handlers for `/access` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/access` | Body: `{"codigo":"…","tipo":"entrada\|salida"}` |
//! | `GET`  | `/access` | Optional `from`, `to`, `direction`, `authorized`, `visitor_id`, `limit`, `offset` |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use chrono::{DateTime, Utc};
use gatekeep_core::{
  access::{AccessEntry, AccessQuery, Direction},
  gate::{Outcome, OutcomeClass},
  permission::Permission,
  store::AccessStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Staff, require},
  error::ApiError,
};

// ─── Attempt ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AttemptBody {
  /// A blank or missing code is decided like any unknown one.
  #[serde(default, alias = "codigo")]
  pub code:      String,
  /// `entrada`/`salida` or `entry`/`exit`.
  #[serde(alias = "tipo")]
  pub direction: String,
}

#[derive(Debug, Serialize)]
pub struct AttemptResponse {
  pub class:   OutcomeClass,
  pub message: String,
  pub outcome: Outcome,
}

/// `POST /access`
///
/// Every decision answers 200; only an attempt that could not be recorded
/// answers 503.
pub async fn attempt<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Json(body): Json<AttemptBody>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError>
where
  S: AccessStore + 'static,
{
  let grant = require(&*state.store, &staff, Permission::ControlAccess).await?;

  let direction: Direction = body.direction.parse()?;

  let outcome = state
    .gate
    .attempt_access(grant.actor.user_id, &body.code, direction)
    .await;

  let status = match outcome {
    Outcome::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    _ => StatusCode::OK,
  };
  Ok((status, Json(AttemptResponse {
    class: outcome.class(),
    message: outcome.message(),
    outcome,
  })))
}

// ─── Ledger ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub from:       Option<DateTime<Utc>>,
  pub to:         Option<DateTime<Utc>>,
  pub direction:  Option<String>,
  pub authorized: Option<bool>,
  pub visitor_id: Option<Uuid>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

/// `GET /access`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<AccessEntry>>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewAccessLog).await?;

  let query = AccessQuery {
    from:       params.from,
    to:         params.to,
    direction:  params
      .direction
      .as_deref()
      .map(str::parse::<Direction>)
      .transpose()?,
    authorized: params.authorized,
    visitor_id: params.visitor_id,
    limit:      params.limit,
    offset:     params.offset,
  };

  let entries = state
    .store
    .list_access_records(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}
