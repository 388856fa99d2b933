//! `GET /dashboard`: today's counters, where "today" is the gate clock's
//! local calendar day.

use axum::{Json, extract::State};
use chrono::Utc;
use gatekeep_core::{
  access::Overview,
  permission::Permission,
  policy::start_of_day,
  store::AccessStore,
};

use crate::{
  AppState,
  auth::{Staff, require},
  error::ApiError,
};

pub async fn overview<S>(
  State(state): State<AppState<S>>,
  staff: Staff,
) -> Result<Json<Overview>, ApiError>
where
  S: AccessStore + 'static,
{
  require(&*state.store, &staff, Permission::ViewDashboard).await?;

  let now = state.gate.clock().now();
  let day_start = start_of_day(now).with_timezone(&Utc);
  let overview = state
    .store
    .overview(now.with_timezone(&Utc), day_start)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(overview))
}
