//! JSON API for Gatekeep.
//!
//! Exposes an axum [`Router`] backed by any [`AccessStore`]. Every route
//! except `/api/health` authenticates staff with HTTP Basic credentials and
//! checks the permission the operation needs.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = AppState::new(Arc::new(store), config)?;
//! axum::serve(listener, gatekeep_api::router(state)).await?;
//! ```

pub mod access;
pub mod alerts;
pub mod auth;
pub mod dashboard;
pub mod error;
pub mod reports;
pub mod roles;
pub mod users;
pub mod visitors;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  routing::{delete, get, post, put},
};
use chrono::{DateTime, TimeDelta, Utc};
use gatekeep_core::{
  credential::DEFAULT_TTL_HOURS,
  gate::AccessGate,
  policy::{AccessWindow, Clock, SystemClock},
  staff::NewUser,
  store::AccessStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `GATEKEEP_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                          String,
  pub port:                          u16,
  pub store_path:                    PathBuf,
  /// Start of the daily access window, `HH:MM` or `HH:MM:SS`.
  pub access_window_start:           String,
  /// End of the daily access window, inclusive.
  pub access_window_end:             String,
  pub credential_ttl_hours:          i64,
  /// Offset of the site's wall clock east of UTC. The host's local zone is
  /// used when unset.
  pub utc_offset_minutes:            Option<i32>,
  pub bootstrap_admin_email:         Option<String>,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub bootstrap_admin_password_hash: Option<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                          "127.0.0.1".to_owned(),
      port:                          8080,
      store_path:                    PathBuf::from("gatekeep.db"),
      access_window_start:           "08:00".to_owned(),
      access_window_end:             "18:00".to_owned(),
      credential_ttl_hours:          DEFAULT_TTL_HOURS,
      utc_offset_minutes:            None,
      bootstrap_admin_email:         None,
      bootstrap_admin_password_hash: None,
    }
  }
}

impl ServerConfig {
  pub fn access_window(&self) -> gatekeep_core::Result<AccessWindow> {
    AccessWindow::parse(&self.access_window_start, &self.access_window_end)
  }

  pub fn credential_ttl(&self) -> TimeDelta {
    TimeDelta::hours(self.credential_ttl_hours.max(1))
  }

  pub fn clock(&self) -> gatekeep_core::Result<SystemClock> {
    match self.utc_offset_minutes {
      Some(minutes) => SystemClock::with_offset_minutes(minutes),
      None => Ok(SystemClock::local()),
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub gate:   AccessGate<S>,
  pub config: Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      gate:   self.gate.clone(),
      config: Arc::clone(&self.config),
    }
  }
}

impl<S: AccessStore> AppState<S> {
  /// State whose gate reads the clock described by `config`.
  pub fn new(store: Arc<S>, config: ServerConfig) -> gatekeep_core::Result<Self> {
    let clock = Arc::new(config.clock()?);
    Self::with_clock(store, config, clock)
  }

  pub fn with_clock(
    store: Arc<S>,
    config: ServerConfig,
    clock: Arc<dyn Clock>,
  ) -> gatekeep_core::Result<Self> {
    let gate =
      AccessGate::new(Arc::clone(&store), config.access_window()?).with_clock(clock);
    Ok(Self { store, gate, config: Arc::new(config) })
  }

  /// The current instant on the gate's clock.
  pub fn now(&self) -> DateTime<Utc> { self.gate.clock().now().with_timezone(&Utc) }
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

/// Seed the default roles into an empty store and, when the store has no
/// users yet and bootstrap credentials are configured, create an
/// administrator. Returns whether an administrator was created.
pub async fn bootstrap<S: AccessStore>(
  store: &S,
  config: &ServerConfig,
  now: DateTime<Utc>,
) -> Result<bool, S::Error> {
  let seeded = store.seed_default_roles().await?;
  if seeded > 0 {
    tracing::info!(seeded, "seeded default roles");
  }

  let (Some(email), Some(password_hash)) = (
    config.bootstrap_admin_email.as_ref(),
    config.bootstrap_admin_password_hash.as_ref(),
  ) else {
    return Ok(false);
  };
  if !store.list_users().await?.is_empty() {
    return Ok(false);
  }
  let Some(admin) = store
    .list_roles()
    .await?
    .into_iter()
    .find(|r| r.name == "administrator")
  else {
    tracing::warn!("no administrator role; skipping bootstrap user");
    return Ok(false);
  };

  store
    .create_user(
      NewUser {
        name:          "Administrator".to_owned(),
        email:         email.clone(),
        password_hash: password_hash.clone(),
        role_id:       admin.role_id,
      },
      now,
    )
    .await?;
  tracing::info!(%email, "created bootstrap administrator");
  Ok(true)
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the service router; every route lives under `/api`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: AccessStore + 'static,
{
  let api = Router::new()
    .route("/health", get(health))
    // Gate and ledger
    .route("/access", get(access::list::<S>).post(access::attempt::<S>))
    // Visitors and credentials
    .route("/visitors", get(visitors::list::<S>).post(visitors::create::<S>))
    .route(
      "/visitors/{id}",
      get(visitors::get_one::<S>).put(visitors::update::<S>),
    )
    .route("/visitors/{id}/state", post(visitors::set_state::<S>))
    .route(
      "/visitors/{id}/credentials",
      get(visitors::credentials::<S>).post(visitors::issue::<S>),
    )
    // Alerts
    .route("/alerts", get(alerts::list::<S>).post(alerts::create::<S>))
    .route("/alerts/{id}", delete(alerts::remove::<S>))
    // Staff
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route("/users/{id}", put(users::update::<S>))
    .route("/users/{id}/state", post(users::set_state::<S>))
    .route("/users/{id}/role", post(users::set_role::<S>))
    .route("/roles", get(roles::list::<S>).post(roles::create::<S>))
    .route(
      "/roles/{id}",
      put(roles::update::<S>).delete(roles::remove::<S>),
    )
    .route("/roles/{id}/permissions", put(roles::set_permissions::<S>))
    .route("/me/permissions", get(users::me::<S>))
    // Reports
    .route("/reports/summary", get(reports::summary::<S>))
    .route("/reports/frequent", get(reports::frequent::<S>))
    .route("/reports/daily", get(reports::daily::<S>))
    .route("/dashboard", get(dashboard::overview::<S>))
    .with_state(state);

  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

/// `GET /api/health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Integration tests ───────────────────────────────────────────────────────
