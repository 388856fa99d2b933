//! Handlers for `/reports` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/reports/summary` | `?from=<rfc3339>&to=<rfc3339>`, at most 31 days |
//! | `GET`  | `/reports/frequent` | Optional `?limit=<n>`, default 10 |
//! | `GET`  | `/reports/daily` | Per-day counts for today and the 7 days before |

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, TimeDelta, Utc};
use gatekeep_core::{
  access::{
    AccessSummary, DailyActivity, FrequentVisitor, ReportRange, STATS_DAYS,
  },
  permission::Permission,
  policy::start_of_day,
  store::AccessStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::{Staff, require},
  error::ApiError,
};

const DEFAULT_FREQUENT_LIMIT: usize = 10;
const MAX_FREQUENT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  pub from: DateTime<Utc>,
  pub to:   DateTime<Utc>,
}

/// `GET /reports/summary?from=…&to=…`
pub async fn summary<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Query(params): Query<SummaryParams>,
) -> Result<Json<AccessSummary>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewReports).await?;

  let range = ReportRange::new(params.from, params.to)?;
  let summary = state
    .store
    .access_summary(range)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct FrequentParams {
  pub limit: Option<usize>,
}

/// `GET /reports/frequent[?limit=<n>]`
pub async fn frequent<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
  Query(params): Query<FrequentParams>,
) -> Result<Json<Vec<FrequentVisitor>>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewReports).await?;

  let limit = params
    .limit
    .unwrap_or(DEFAULT_FREQUENT_LIMIT)
    .clamp(1, MAX_FREQUENT_LIMIT);
  let visitors = state
    .store
    .frequent_visitors(limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(visitors))
}

/// `GET /reports/daily`: newest day first, days without activity omitted.
pub async fn daily<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
) -> Result<Json<Vec<DailyActivity>>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewReports).await?;

  let now = state.gate.clock().now();
  let since = start_of_day(now) - TimeDelta::days(STATS_DAYS);
  let days = state
    .store
    .daily_activity(since.with_timezone(&Utc), *now.offset())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(days))
}
