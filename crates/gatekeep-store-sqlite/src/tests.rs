//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, TimeZone, Utc};
use gatekeep_core::{
  access::{AccessQuery, Direction, ReportRange},
  alert::{AlertQuery, NewAlert, Severity},
  gate::{AccessGate, DenialReason, Outcome},
  permission::Permission,
  policy::AccessWindow,
  staff::{NewRole, NewUser, UserState, UserUpdate},
  store::{
    AccessLedger, AlertSink, CredentialRegistry, PermissionStore,
    StaffDirectory, VisitorRegistry,
  },
  visitor::{VisitorDetails, VisitorQuery, VisitorState},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// 2024-01-01 at the given UTC time.
fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

/// The same instant as [`utc`], seen from the gate's (zero) offset.
fn local(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
  utc(h, m, s).fixed_offset()
}

fn details(identification: &str) -> VisitorDetails {
  VisitorDetails {
    name:           format!("Visitor {identification}"),
    identification: identification.into(),
    organization:   Some("Acme".into()),
    visit_reason:   None,
  }
}

fn gate(store: &SqliteStore) -> AccessGate<SqliteStore> {
  AccessGate::new(Arc::new(store.clone()), AccessWindow::default())
}

/// Register a visitor at 02:00 with a credential expiring at 10:00.
async fn visitor_with_code(s: &SqliteStore, identification: &str) -> (Uuid, String) {
  let (visitor, credential) = s
    .register_visitor(details(identification), Some(TimeDelta::hours(8)), utc(2, 0, 0))
    .await
    .unwrap();
  (visitor.visitor_id, credential.unwrap().code)
}

async fn records(s: &SqliteStore) -> usize {
  s.list_access_records(&AccessQuery::default())
    .await
    .unwrap()
    .len()
}

async fn alerts(s: &SqliteStore) -> Vec<gatekeep_core::alert::Alert> {
  s.list_alerts(&AlertQuery::default()).await.unwrap()
}

// ─── Visitors ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_and_get_visitor() {
  let s = store().await;
  let (visitor, credential) = s
    .register_visitor(details("ID-1"), None, utc(9, 0, 0))
    .await
    .unwrap();
  assert!(credential.is_none());
  assert_eq!(visitor.state, VisitorState::Active);

  let fetched = s.get_visitor(visitor.visitor_id).await.unwrap().unwrap();
  assert_eq!(fetched.identification, "ID-1");
  assert_eq!(fetched.organization.as_deref(), Some("Acme"));

  assert!(s.get_visitor(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_identification_is_a_conflict() {
  let s = store().await;
  s.register_visitor(details("ID-1"), None, utc(9, 0, 0))
    .await
    .unwrap();
  let err = s
    .register_visitor(details("ID-1"), Some(TimeDelta::hours(8)), utc(9, 0, 0))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
  assert!(err.is_conflict());

  // The failed registration left nothing behind.
  let all = s.list_visitors(&VisitorQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn list_visitors_filters_and_shows_active_code() {
  let s = store().await;
  let (_, code) = visitor_with_code(&s, "ID-1").await;
  let (other, _) = s
    .register_visitor(
      VisitorDetails {
        name:           "Grace Hopper".into(),
        identification: "ID-2".into(),
        organization:   Some("Navy".into()),
        visit_reason:   None,
      },
      None,
      utc(3, 0, 0),
    )
    .await
    .unwrap();
  s.set_visitor_state(other.visitor_id, VisitorState::Inactive)
    .await
    .unwrap();

  let all = s.list_visitors(&VisitorQuery::default()).await.unwrap();
  assert_eq!(all.len(), 2);
  // Newest registration first.
  assert_eq!(all[0].visitor.identification, "ID-2");
  assert_eq!(all[1].active_code.as_deref(), Some(code.as_str()));

  let active = s
    .list_visitors(&VisitorQuery { state: Some(VisitorState::Active), text: None })
    .await
    .unwrap();
  assert_eq!(active.len(), 1);

  let navy = s
    .list_visitors(&VisitorQuery { state: None, text: Some("nav".into()) })
    .await
    .unwrap();
  assert_eq!(navy.len(), 1);
  assert_eq!(navy[0].visitor.name, "Grace Hopper");

  let wildcard = s
    .list_visitors(&VisitorQuery { state: None, text: Some("%".into()) })
    .await
    .unwrap();
  assert!(wildcard.is_empty());
}

#[tokio::test]
async fn deactivating_a_visitor_closes_its_credentials() {
  let s = store().await;
  let (visitor_id, code) = visitor_with_code(&s, "ID-1").await;

  s.set_visitor_state(visitor_id, VisitorState::Inactive)
    .await
    .unwrap();
  assert!(s.find_usable(code.clone(), utc(9, 0, 0)).await.unwrap().is_none());

  // Reactivation does not bring the credential back.
  s.set_visitor_state(visitor_id, VisitorState::Active)
    .await
    .unwrap();
  assert!(s.find_usable(code, utc(9, 0, 0)).await.unwrap().is_none());

  let err = s
    .set_visitor_state(Uuid::new_v4(), VisitorState::Inactive)
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn identification_locks_once_referenced() {
  let s = store().await;
  let (visitor_id, code) = visitor_with_code(&s, "ID-1").await;

  // Editable before any access.
  let renamed = s
    .update_visitor(visitor_id, details("ID-1b"))
    .await
    .unwrap();
  assert_eq!(renamed.identification, "ID-1b");

  gate(&s)
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Entry, local(9, 0, 0))
    .await;

  let err = s
    .update_visitor(visitor_id, details("ID-1c"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::IdentificationLocked(id) if id == visitor_id));

  // Other fields stay editable.
  let mut same_id = details("ID-1b");
  same_id.name = "Renamed".into();
  let updated = s.update_visitor(visitor_id, same_id).await.unwrap();
  assert_eq!(updated.name, "Renamed");
}

// ─── Credentials ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn issuing_replaces_the_previous_credential() {
  let s = store().await;
  let (visitor_id, first) = visitor_with_code(&s, "ID-1").await;

  let second = s
    .issue_credential(visitor_id, TimeDelta::hours(8), utc(3, 0, 0))
    .await
    .unwrap();
  assert_ne!(second.code, first);
  assert_eq!(second.expires_at, Some(utc(11, 0, 0)));

  assert!(s.find_usable(first, utc(4, 0, 0)).await.unwrap().is_none());
  let usable = s
    .find_usable(second.code.clone(), utc(4, 0, 0))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(usable.visitor.visitor_id, visitor_id);

  let all = s.list_credentials(visitor_id).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].credential_id, second.credential_id);
}

#[tokio::test]
async fn issuing_requires_an_active_visitor() {
  let s = store().await;
  let err = s
    .issue_credential(Uuid::new_v4(), TimeDelta::hours(8), utc(3, 0, 0))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::VisitorNotFound(_)));

  let (visitor, _) = s
    .register_visitor(details("ID-1"), None, utc(2, 0, 0))
    .await
    .unwrap();
  s.set_visitor_state(visitor.visitor_id, VisitorState::Inactive)
    .await
    .unwrap();
  let err = s
    .issue_credential(visitor.visitor_id, TimeDelta::hours(8), utc(3, 0, 0))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::VisitorInactive(_)));
}

#[tokio::test]
async fn lookup_expiry_is_strict() {
  let s = store().await;
  let (_, code) = visitor_with_code(&s, "ID-1").await;

  assert!(s.find_usable(code.clone(), utc(9, 59, 59)).await.unwrap().is_some());
  assert!(s.find_usable(code.clone(), utc(10, 0, 0)).await.unwrap().is_none());
  assert!(s.find_usable(code, utc(10, 0, 1)).await.unwrap().is_none());
}

#[tokio::test]
async fn explicit_deactivation_reports_whether_it_changed_anything() {
  let s = store().await;
  let (visitor_id, _) = visitor_with_code(&s, "ID-1").await;
  let credential = s.list_credentials(visitor_id).await.unwrap().remove(0);

  assert!(s.deactivate_credential(credential.credential_id).await.unwrap());
  assert!(!s.deactivate_credential(credential.credential_id).await.unwrap());
}

// ─── Gate ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_code_writes_one_high_alert_and_no_record() {
  let s = store().await;
  let actor = Uuid::new_v4();

  let outcome = gate(&s)
    .attempt_access_at(actor, "ZZZZ0000", Direction::Entry, local(12, 0, 0))
    .await;
  assert_eq!(outcome, Outcome::Denied { reason: DenialReason::InvalidOrExpired });

  assert_eq!(records(&s).await, 0);
  let alerts = alerts(&s).await;
  assert_eq!(alerts.len(), 1);
  assert_eq!(alerts[0].severity, Severity::High);
  assert!(alerts[0].description.contains("ZZZZ0000"));
  assert_eq!(alerts[0].actor_id, Some(actor));
  assert_eq!(alerts[0].raised_at, utc(12, 0, 0));
}

#[tokio::test]
async fn codes_are_matched_case_insensitively() {
  let s = store().await;
  let (_, code) = visitor_with_code(&s, "ID-1").await;

  let outcome = gate(&s)
    .attempt_access_at(
      Uuid::new_v4(),
      &format!("  {}  ", code.to_lowercase()),
      Direction::Entry,
      local(9, 0, 0),
    )
    .await;
  assert!(outcome.is_authorized());
}

#[tokio::test]
async fn outside_hours_writes_a_denied_record_and_a_medium_alert() {
  let s = store().await;
  let (visitor_id, code) = visitor_with_code(&s, "ID-1").await;

  let outcome = gate(&s)
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Entry, local(7, 59, 59))
    .await;
  assert_eq!(outcome, Outcome::Denied { reason: DenialReason::OutsideHours });

  let ledger = s.list_access_records(&AccessQuery::default()).await.unwrap();
  assert_eq!(ledger.len(), 1);
  assert!(!ledger[0].record.authorized);
  assert_eq!(ledger[0].record.visitor_id, Some(visitor_id));
  assert_eq!(ledger[0].record.recorded_at, utc(7, 59, 59));

  let alerts = alerts(&s).await;
  assert_eq!(alerts.len(), 1);
  assert_eq!(alerts[0].severity, Severity::Medium);
  assert_eq!(alerts[0].visitor_id, Some(visitor_id));
}

#[tokio::test]
async fn inside_hours_writes_one_authorized_record() {
  let s = store().await;
  let (visitor_id, code) = visitor_with_code(&s, "ID-1").await;

  let outcome = gate(&s)
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Entry, local(8, 0, 0))
    .await;
  assert!(matches!(
    outcome,
    Outcome::Authorized { visitor_id: v, direction: Direction::Entry, .. } if v == visitor_id
  ));

  let ledger = s.list_access_records(&AccessQuery::default()).await.unwrap();
  assert_eq!(ledger.len(), 1);
  assert!(ledger[0].record.authorized);
  assert!(alerts(&s).await.is_empty());

  // Entries do not consume the credential.
  let again = gate(&s)
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Entry, local(9, 0, 0))
    .await;
  assert!(again.is_authorized());
  assert_eq!(records(&s).await, 2);
}

#[tokio::test]
async fn second_exit_is_denied() {
  let s = store().await;
  let (_, code) = visitor_with_code(&s, "ID-1").await;
  let g = gate(&s);

  let first = g
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Exit, local(9, 0, 0))
    .await;
  assert!(first.is_authorized());

  let second = g
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Exit, local(9, 0, 1))
    .await;
  assert_eq!(second, Outcome::Denied { reason: DenialReason::InvalidOrExpired });

  assert_eq!(records(&s).await, 1);
  assert_eq!(alerts(&s).await.len(), 1);
}

#[tokio::test]
async fn gate_expiry_boundary() {
  let s = store().await;
  let (_, code) = visitor_with_code(&s, "ID-1").await;
  let g = gate(&s);

  let before = g
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Entry, local(9, 59, 59))
    .await;
  assert!(before.is_authorized());

  for at in [local(10, 0, 0), local(10, 0, 1)] {
    let outcome = g
      .attempt_access_at(Uuid::new_v4(), &code, Direction::Entry, at)
      .await;
    assert_eq!(outcome, Outcome::Denied { reason: DenialReason::InvalidOrExpired });
  }
}

#[tokio::test]
async fn window_is_evaluated_in_local_time() {
  let s = store().await;
  let (_, code) = visitor_with_code(&s, "ID-1").await;

  // 03:00 UTC is 09:00 at UTC+6.
  let at = utc(3, 0, 0).with_timezone(&FixedOffset::east_opt(6 * 3600).unwrap());
  let outcome = gate(&s)
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Entry, at)
    .await;
  assert!(outcome.is_authorized());

  let ledger = s.list_access_records(&AccessQuery::default()).await.unwrap();
  assert_eq!(ledger[0].record.recorded_at, utc(3, 0, 0));
}

fn temp_db() -> PathBuf {
  std::env::temp_dir().join(format!("gatekeep-test-{}.db", Uuid::new_v4()))
}

fn remove_db(path: &PathBuf) {
  for suffix in ["", "-wal", "-shm"] {
    let mut p = path.clone().into_os_string();
    p.push(suffix);
    let _ = std::fs::remove_file(p);
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_exits_on_two_connections_admit_once() {
  let path = temp_db();
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();
  let (_, code) = visitor_with_code(&a, "ID-1").await;

  let (gate_a, gate_b) = (gate(&a), gate(&b));
  let (ra, rb) = tokio::join!(
    gate_a.attempt_access_at(Uuid::new_v4(), &code, Direction::Exit, local(9, 0, 0)),
    gate_b.attempt_access_at(Uuid::new_v4(), &code, Direction::Exit, local(9, 0, 0)),
  );

  let outcomes = [ra, rb];
  assert_eq!(outcomes.iter().filter(|o| o.is_authorized()).count(), 1);
  assert!(outcomes.contains(&Outcome::Denied {
    reason: DenialReason::InvalidOrExpired,
  }));

  let authorized = b
    .list_access_records(&AccessQuery {
      authorized: Some(true),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(authorized.len(), 1);

  drop((gate_a, gate_b, a, b));
  remove_db(&path);
}

#[tokio::test]
async fn failed_alert_write_rolls_back_the_record() {
  let s = store().await;
  let (_, code) = visitor_with_code(&s, "ID-1").await;
  s.with_conn(|conn| {
    conn.execute_batch(
      "CREATE TRIGGER alerts_offline BEFORE INSERT ON alerts
       BEGIN SELECT RAISE(ABORT, 'alerts offline'); END;",
    )?;
    Ok(())
  })
  .await
  .unwrap();

  let outcome = gate(&s)
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Entry, local(20, 0, 0))
    .await;
  assert_eq!(outcome, Outcome::Unavailable);
  assert_eq!(records(&s).await, 0);
}

#[tokio::test]
async fn failed_record_write_keeps_the_credential_active() {
  let s = store().await;
  let (_, code) = visitor_with_code(&s, "ID-1").await;
  s.with_conn(|conn| {
    conn.execute_batch(
      "CREATE TRIGGER ledger_offline BEFORE INSERT ON access_records
       BEGIN SELECT RAISE(ABORT, 'ledger offline'); END;",
    )?;
    Ok(())
  })
  .await
  .unwrap();

  let outcome = gate(&s)
    .attempt_access_at(Uuid::new_v4(), &code, Direction::Exit, local(9, 0, 0))
    .await;
  assert_eq!(outcome, Outcome::Unavailable);
  assert!(s.find_usable(code, utc(9, 0, 0)).await.unwrap().is_some());
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn summary_frequent_and_on_premises() {
  let s = store().await;
  let (ada, ada_code) = visitor_with_code(&s, "ID-1").await;
  let (bob, bob_code) = visitor_with_code(&s, "ID-2").await;
  let g = gate(&s);
  let actor = Uuid::new_v4();

  g.attempt_access_at(actor, &ada_code, Direction::Entry, local(8, 30, 0))
    .await;
  g.attempt_access_at(actor, &ada_code, Direction::Entry, local(9, 0, 0))
    .await;
  g.attempt_access_at(actor, &bob_code, Direction::Entry, local(9, 30, 0))
    .await;
  g.attempt_access_at(actor, &bob_code, Direction::Exit, local(9, 45, 0))
    .await;
  g.attempt_access_at(actor, "NOPE0000", Direction::Entry, local(9, 50, 0))
    .await;

  let range = ReportRange::new(utc(0, 0, 0), utc(23, 59, 59)).unwrap();
  let summary = s.access_summary(range).await.unwrap();
  assert_eq!(summary.total, 4);
  assert_eq!(summary.authorized, 4);
  assert_eq!(summary.denied, 0);
  assert_eq!(summary.unique_visitors, 2);
  assert_eq!(summary.entries, 3);
  assert_eq!(summary.exits, 1);

  let frequent = s.frequent_visitors(10).await.unwrap();
  assert_eq!(frequent[0].visitor_id, ada);
  assert_eq!(frequent[0].entries, 2);
  assert_eq!(frequent[1].visitor_id, bob);

  let inside = s.visitors_on_premises(utc(0, 0, 0)).await.unwrap();
  assert_eq!(inside.len(), 1);
  assert_eq!(inside[0].visitor_id, ada);

  let overview = s.overview(utc(9, 55, 0), utc(0, 0, 0)).await.unwrap();
  assert_eq!(overview.accesses_today, 4);
  assert_eq!(overview.active_visitors, 2);
  // Bob's exit consumed his credential.
  assert_eq!(overview.active_credentials, 1);
  assert_eq!(overview.alerts_today.total, 1);
  assert_eq!(overview.alerts_today.high, 1);
  assert_eq!(overview.visitors_on_premises, 1);

  let ada_only = s
    .list_access_records(&AccessQuery {
      visitor_id: Some(ada),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(ada_only.len(), 2);
  // Newest first.
  assert_eq!(ada_only[0].record.recorded_at, utc(9, 0, 0));
  assert_eq!(ada_only[0].visitor_name.as_deref(), Some("Visitor ID-1"));

  let exits = s
    .list_access_records(&AccessQuery {
      direction: Some(Direction::Exit),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(exits.len(), 1);
}

#[tokio::test]
async fn daily_activity_buckets_by_local_day() {
  let s = store().await;
  let (_, code) = s
    .register_visitor(details("ID-1"), Some(TimeDelta::hours(48)), utc(2, 0, 0))
    .await
    .map(|(v, c)| (v.visitor_id, c.unwrap().code))
    .unwrap();
  let g = gate(&s);
  let actor = Uuid::new_v4();
  let next_day = TimeDelta::days(1);

  g.attempt_access_at(actor, &code, Direction::Entry, local(9, 0, 0))
    .await;
  // Outside the window: recorded as denied.
  g.attempt_access_at(actor, &code, Direction::Exit, local(20, 0, 0))
    .await;
  // Unknown codes leave no record to count.
  g.attempt_access_at(actor, "NOPE0000", Direction::Entry, local(21, 0, 0))
    .await;
  g.attempt_access_at(actor, &code, Direction::Entry, local(9, 0, 0) + next_day)
    .await;

  let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
  let utc_offset = FixedOffset::east_opt(0).unwrap();

  let days = s.daily_activity(utc(0, 0, 0), utc_offset).await.unwrap();
  assert_eq!(days.len(), 2);
  assert_eq!(days[0].date, day(2));
  assert_eq!((days[0].total, days[0].entries, days[0].exits), (1, 1, 0));
  assert_eq!(days[1].date, day(1));
  assert_eq!(days[1].total, 2);
  assert_eq!(days[1].entries, 1);
  assert_eq!(days[1].exits, 1);
  assert_eq!(days[1].denied, 1);

  let recent = s
    .daily_activity(utc(0, 0, 0) + next_day, utc_offset)
    .await
    .unwrap();
  assert_eq!(recent.len(), 1);
  assert_eq!(recent[0].date, day(2));

  // At UTC-10 the first entry falls on New Year's Eve.
  let west = FixedOffset::west_opt(10 * 3600).unwrap();
  let days = s.daily_activity(utc(0, 0, 0), west).await.unwrap();
  assert_eq!(days.len(), 2);
  assert_eq!(days[0].date, day(1));
  assert_eq!(days[0].total, 2);
  assert_eq!(days[1].date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
  assert_eq!(days[1].total, 1);
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn manual_alerts_can_be_filtered_and_deleted() {
  let s = store().await;
  let raise = |severity, at| NewAlert {
    description: "door propped open".into(),
    severity,
    actor_id: None,
    visitor_id: None,
    raised_at: at,
  };

  let low = s.raise_alert(raise(Severity::Low, utc(9, 0, 0))).await.unwrap();
  s.raise_alert(raise(Severity::High, utc(10, 0, 0)))
    .await
    .unwrap();

  let all = alerts(&s).await;
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].severity, Severity::High);

  let only_low = s
    .list_alerts(&AlertQuery { severity: Some(Severity::Low), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(only_low.len(), 1);

  let early = s
    .list_alerts(&AlertQuery { to: Some(utc(9, 30, 0)), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(early.len(), 1);

  assert!(s.delete_alert(low.alert_id).await.unwrap());
  assert!(!s.delete_alert(low.alert_id).await.unwrap());
  assert_eq!(alerts(&s).await.len(), 1);
}

// ─── Staff ───────────────────────────────────────────────────────────────────

async fn seeded_role(s: &SqliteStore, name: &str) -> Uuid {
  s.seed_default_roles().await.unwrap();
  s.list_roles()
    .await
    .unwrap()
    .into_iter()
    .find(|r| r.name == name)
    .unwrap()
    .role_id
}

fn new_user(email: &str, role_id: Uuid) -> NewUser {
  NewUser {
    name: "Gate Guard".into(),
    email: email.into(),
    password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
    role_id,
  }
}

#[tokio::test]
async fn default_roles_are_seeded_once() {
  let s = store().await;
  assert_eq!(s.seed_default_roles().await.unwrap(), 4);
  assert_eq!(s.seed_default_roles().await.unwrap(), 0);

  let roles = s.list_roles().await.unwrap();
  let admin = roles.iter().find(|r| r.name == "administrator").unwrap();
  assert_eq!(admin.permissions, Permission::all());
}

#[tokio::test]
async fn permissions_follow_role_and_state() {
  let s = store().await;
  let guard = seeded_role(&s, "guard").await;
  let user = s
    .create_user(new_user("guard@example.com", guard), utc(8, 0, 0))
    .await
    .unwrap();

  let perms = s.permissions_for(user.user_id).await.unwrap();
  assert!(perms.contains(&Permission::ControlAccess));
  assert!(!perms.contains(&Permission::ManageRoles));

  // Role edits apply on the next check.
  s.set_role_permissions(guard, [Permission::ViewDashboard].into())
    .await
    .unwrap();
  let perms = s.permissions_for(user.user_id).await.unwrap();
  assert_eq!(perms, BTreeSet::from([Permission::ViewDashboard]));

  s.set_user_state(user.user_id, UserState::Inactive)
    .await
    .unwrap();
  assert!(s.permissions_for(user.user_id).await.unwrap().is_empty());
  assert!(s.permissions_for(Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn login_lookup_ignores_email_case_and_inactive_users() {
  let s = store().await;
  let guard = seeded_role(&s, "guard").await;
  let user = s
    .create_user(new_user("Guard@Example.com", guard), utc(8, 0, 0))
    .await
    .unwrap();

  let login = s.find_login("guard@example.com").await.unwrap().unwrap();
  assert_eq!(login.user.user_id, user.user_id);
  assert!(login.password_hash.starts_with("$argon2id$"));

  let err = s
    .create_user(new_user("guard@EXAMPLE.com", guard), utc(8, 0, 0))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));

  s.set_user_state(user.user_id, UserState::Inactive)
    .await
    .unwrap();
  assert!(s.find_login("guard@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn roles_in_use_cannot_be_deleted() {
  let s = store().await;
  let guard = seeded_role(&s, "guard").await;
  let user = s
    .create_user(new_user("guard@example.com", guard), utc(8, 0, 0))
    .await
    .unwrap();

  let err = s.delete_role(guard).await.unwrap_err();
  assert!(matches!(err, Error::RoleInUse(_)));

  let custom = s
    .create_role(NewRole {
      name:        "night shift".into(),
      description: None,
      permissions: [Permission::ControlAccess].into(),
    })
    .await
    .unwrap();
  let moved = s.set_user_role(user.user_id, custom.role_id).await.unwrap();
  assert_eq!(moved.role_id, custom.role_id);

  s.delete_role(guard).await.unwrap();
  assert!(matches!(
    s.delete_role(guard).await.unwrap_err(),
    Error::RoleNotFound(_)
  ));

  let dup = s
    .create_role(NewRole {
      name:        "night shift".into(),
      description: None,
      permissions: Default::default(),
    })
    .await
    .unwrap_err();
  assert!(matches!(dup, Error::Conflict(_)));
}

#[tokio::test]
async fn users_need_an_existing_role() {
  let s = store().await;
  let err = s
    .create_user(new_user("x@example.com", Uuid::new_v4()), utc(8, 0, 0))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::RoleNotFound(_)));
}

#[tokio::test]
async fn editing_a_user_keeps_the_password_unless_replaced() {
  let s = store().await;
  let guard = seeded_role(&s, "guard").await;
  let user = s
    .create_user(new_user("guard@example.com", guard), utc(8, 0, 0))
    .await
    .unwrap();
  let original_hash = new_user("", guard).password_hash;

  let edited = s
    .update_user(user.user_id, UserUpdate {
      name:          "Night Guard".into(),
      email:         "night@example.com".into(),
      password_hash: None,
    })
    .await
    .unwrap();
  assert_eq!(edited.name, "Night Guard");
  assert_eq!(edited.role_id, guard);
  assert_eq!(edited.created_at, user.created_at);

  assert!(s.find_login("guard@example.com").await.unwrap().is_none());
  let login = s.find_login("night@example.com").await.unwrap().unwrap();
  assert_eq!(login.password_hash, original_hash);

  s.update_user(user.user_id, UserUpdate {
    name:          "Night Guard".into(),
    email:         "night@example.com".into(),
    password_hash: Some("$argon2id$v=19$new".into()),
  })
  .await
  .unwrap();
  let login = s.find_login("night@example.com").await.unwrap().unwrap();
  assert_eq!(login.password_hash, "$argon2id$v=19$new");

  s.create_user(new_user("taken@example.com", guard), utc(8, 0, 0))
    .await
    .unwrap();
  let err = s
    .update_user(user.user_id, UserUpdate {
      name:          "Night Guard".into(),
      email:         "TAKEN@example.com".into(),
      password_hash: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));

  let err = s
    .update_user(Uuid::new_v4(), UserUpdate {
      name:          "Nobody".into(),
      email:         "nobody@example.com".into(),
      password_hash: None,
    })
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn editing_a_role_replaces_name_and_permissions_together() {
  let s = store().await;
  let guard = seeded_role(&s, "guard").await;
  let user = s
    .create_user(new_user("guard@example.com", guard), utc(8, 0, 0))
    .await
    .unwrap();

  let role = s
    .update_role(guard, NewRole {
      name:        "gatekeeper".into(),
      description: None,
      permissions: [Permission::ControlAccess, Permission::ViewAlerts].into(),
    })
    .await
    .unwrap();
  assert_eq!(role.name, "gatekeeper");
  assert_eq!(role.description, None);

  let stored = s
    .list_roles()
    .await
    .unwrap()
    .into_iter()
    .find(|r| r.role_id == guard)
    .unwrap();
  assert_eq!(stored.name, "gatekeeper");
  assert_eq!(
    s.permissions_for(user.user_id).await.unwrap(),
    BTreeSet::from([Permission::ControlAccess, Permission::ViewAlerts])
  );

  // A clashing name leaves the role untouched.
  let err = s
    .update_role(guard, NewRole {
      name:        "supervisor".into(),
      description: None,
      permissions: Default::default(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
  assert_eq!(s.permissions_for(user.user_id).await.unwrap().len(), 2);

  let err = s
    .update_role(Uuid::new_v4(), NewRole {
      name:        "ghost".into(),
      description: None,
      permissions: Default::default(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::RoleNotFound(_)));
}
