//! [`SqliteStore`]: the SQLite implementation of the Gatekeep store traits.

use std::{
  collections::{BTreeMap, BTreeSet},
  path::Path,
  time::Duration,
};

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use rusqlite::{
  Connection, OptionalExtension as _, Transaction, TransactionBehavior, params,
};
use uuid::Uuid;

use gatekeep_core::{
  access::{
    AccessEntry, AccessQuery, AccessRecord, AccessSummary, DailyActivity,
    Direction, FrequentVisitor, NewAccessRecord, Overview, ReportRange,
  },
  alert::{Alert, AlertCounts, AlertQuery, NewAlert},
  credential::{Credential, CredentialState, UsableCredential, generate_code},
  gate::Verdict,
  permission::Permission,
  staff::{
    NewRole, NewUser, Role, User, UserLogin, UserState, UserUpdate,
    default_roles,
  },
  store::{
    AccessLedger, AlertSink, AttemptReceipt, CredentialRegistry,
    PermissionStore, StaffDirectory, Store, VisitorRegistry,
  },
  visitor::{
    Visitor, VisitorDetails, VisitorQuery, VisitorState, VisitorSummary,
  },
};

use crate::{
  Error, Result,
  encode::{
    ALERT_COLUMNS, CREDENTIAL_COLUMNS, RECORD_COLUMNS, RawAccessRecord,
    RawAlert, RawCredential, RawUser, RawVisitor, USER_COLUMNS,
    VISITOR_COLUMNS, decode_direction, decode_dt, decode_uuid,
    encode_credential_state, encode_direction, encode_dt, encode_severity, encode_user_state, encode_uuid,
    encode_visitor_state, like_pattern,
  },
  schema::{PRAGMAS, SCHEMA},
};

/// How long a connection waits on another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Fresh codes tried before issuing a credential fails.
const MAX_CODE_ATTEMPTS: usize = 5;

const DEFAULT_LIST_LIMIT: usize = 100;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Gatekeep store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Separate
/// [`SqliteStore::open`] calls on one file get separate connections that
/// serialise their writes through SQLite's lock.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .with_conn(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(PRAGMAS)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `f` on the connection thread.
  pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside a `BEGIN IMMEDIATE` transaction, committing only if it
  /// succeeds.
  async fn transact<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .with_conn(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
      })
      .await
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// Plain functions over a borrowed connection so they compose inside one
// transaction.

/// Map a unique-constraint failure to [`Error::Conflict`] naming `what`.
fn unique_violation(what: &'static str) -> impl FnOnce(rusqlite::Error) -> Error {
  move |e| match e {
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
    {
      Error::Conflict(what.to_owned())
    }
    e => e.into(),
  }
}

fn count(conn: &Connection, sql: &str, param: &str) -> Result<u64> {
  let n: i64 = conn.query_row(sql, params![param], |r| r.get(0))?;
  Ok(n.max(0) as u64)
}

fn select_visitor(conn: &Connection, visitor_id: Uuid) -> Result<Option<Visitor>> {
  let raw = conn
    .query_row(
      &format!("SELECT {VISITOR_COLUMNS} FROM visitors v WHERE v.visitor_id = ?1"),
      params![encode_uuid(visitor_id)],
      |row| RawVisitor::read(row, 0),
    )
    .optional()?;
  raw.map(RawVisitor::into_visitor).transpose()
}

fn require_visitor(conn: &Connection, visitor_id: Uuid) -> Result<Visitor> {
  select_visitor(conn, visitor_id)?.ok_or(Error::VisitorNotFound(visitor_id))
}

fn insert_visitor(conn: &Connection, v: &Visitor) -> Result<()> {
  conn
    .execute(
      "INSERT INTO visitors (
         visitor_id, name, identification, organization, visit_reason,
         state, registered_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      params![
        encode_uuid(v.visitor_id),
        v.name,
        v.identification,
        v.organization,
        v.visit_reason,
        encode_visitor_state(v.state),
        encode_dt(v.registered_at),
      ],
    )
    .map_err(unique_violation("identification"))?;
  Ok(())
}

/// The credential behind `code` if it is active, unexpired at `now`, and
/// held by an active visitor.
fn select_usable(
  conn: &Connection,
  code: &str,
  now: DateTime<Utc>,
) -> Result<Option<UsableCredential>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {CREDENTIAL_COLUMNS}, {VISITOR_COLUMNS}
         FROM credentials c
         JOIN visitors v ON v.visitor_id = c.visitor_id
         WHERE c.code = ?1
           AND c.state = 'active'
           AND (c.expires_at IS NULL OR c.expires_at > ?2)
           AND v.state = 'active'"
      ),
      params![code, encode_dt(now)],
      |row| {
        Ok((
          RawCredential::read(row, 0)?,
          RawVisitor::read(row, RawCredential::WIDTH)?,
        ))
      },
    )
    .optional()?;

  raw
    .map(|(c, v)| {
      Ok(UsableCredential {
        credential: c.into_credential()?,
        visitor:    v.into_visitor()?,
      })
    })
    .transpose()
}

/// Move an active credential to inactive. `false` if it was not active.
fn close_credential(conn: &Connection, credential_id: Uuid) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE credentials SET state = 'inactive'
     WHERE credential_id = ?1 AND state = 'active'",
    params![encode_uuid(credential_id)],
  )?;
  Ok(changed > 0)
}

fn close_credentials_of(conn: &Connection, visitor_id: Uuid) -> Result<usize> {
  Ok(conn.execute(
    "UPDATE credentials SET state = 'inactive'
     WHERE visitor_id = ?1 AND state = 'active'",
    params![encode_uuid(visitor_id)],
  )?)
}

fn free_code(conn: &Connection) -> Result<String> {
  for _ in 0..MAX_CODE_ATTEMPTS {
    let code = generate_code();
    let taken: bool = conn.query_row(
      "SELECT EXISTS (SELECT 1 FROM credentials WHERE code = ?1)",
      params![code],
      |r| r.get(0),
    )?;
    if !taken {
      return Ok(code);
    }
    tracing::debug!(%code, "credential code collision, regenerating");
  }
  Err(Error::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
}

/// Issue a credential for an active visitor, closing any it already holds.
fn insert_credential(
  conn: &Connection,
  visitor_id: Uuid,
  ttl: TimeDelta,
  now: DateTime<Utc>,
) -> Result<Credential> {
  let visitor = require_visitor(conn, visitor_id)?;
  if !visitor.state.is_active() {
    return Err(Error::VisitorInactive(visitor_id));
  }

  let closed = close_credentials_of(conn, visitor_id)?;
  if closed > 0 {
    tracing::debug!(%visitor_id, closed, "replaced active credentials");
  }

  let credential = Credential {
    credential_id: Uuid::new_v4(),
    visitor_id,
    code: free_code(conn)?,
    state: CredentialState::Active,
    expires_at: Some(now + ttl),
    issued_at: now,
  };

  conn
    .execute(
      "INSERT INTO credentials (
         credential_id, visitor_id, code, state, expires_at, issued_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        encode_uuid(credential.credential_id),
        encode_uuid(visitor_id),
        credential.code,
        encode_credential_state(credential.state),
        credential.expires_at.map(encode_dt),
        encode_dt(credential.issued_at),
      ],
    )
    .map_err(unique_violation("credential code"))?;

  Ok(credential)
}

fn insert_access_record(
  conn: &Connection,
  input: NewAccessRecord,
) -> Result<AccessRecord> {
  let record = AccessRecord {
    record_id:     Uuid::new_v4(),
    actor_id:      input.actor_id,
    visitor_id:    input.visitor_id,
    credential_id: input.credential_id,
    direction:     input.direction,
    authorized:    input.authorized,
    recorded_at:   input.recorded_at,
  };

  conn.execute(
    "INSERT INTO access_records (
       record_id, actor_id, visitor_id, credential_id, direction,
       authorized, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      encode_uuid(record.record_id),
      encode_uuid(record.actor_id),
      record.visitor_id.map(encode_uuid),
      record.credential_id.map(encode_uuid),
      encode_direction(record.direction),
      record.authorized,
      encode_dt(record.recorded_at),
    ],
  )?;

  Ok(record)
}

fn insert_alert(conn: &Connection, input: NewAlert) -> Result<Alert> {
  let alert = Alert {
    alert_id:    Uuid::new_v4(),
    description: input.description,
    severity:    input.severity,
    actor_id:    input.actor_id,
    visitor_id:  input.visitor_id,
    raised_at:   input.raised_at,
  };

  conn.execute(
    "INSERT INTO alerts (
       alert_id, description, severity, actor_id, visitor_id, raised_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(alert.alert_id),
      alert.description,
      encode_severity(alert.severity),
      alert.actor_id.map(encode_uuid),
      alert.visitor_id.map(encode_uuid),
      encode_dt(alert.raised_at),
    ],
  )?;

  Ok(alert)
}

/// Visitors whose latest authorized record since `since` is an entry.
fn select_on_premises(
  conn: &Connection,
  since: DateTime<Utc>,
) -> Result<Vec<Visitor>> {
  // SQLite takes the bare `direction` from the row holding MAX(recorded_at).
  let mut stmt = conn.prepare(&format!(
    "SELECT {VISITOR_COLUMNS}
     FROM visitors v
     JOIN (
       SELECT visitor_id, direction, MAX(recorded_at) AS last_at
       FROM access_records
       WHERE authorized = 1
         AND visitor_id IS NOT NULL
         AND recorded_at >= ?1
       GROUP BY visitor_id
     ) last ON last.visitor_id = v.visitor_id
     WHERE last.direction = 'entry'
     ORDER BY last.last_at DESC"
  ))?;

  let raws = stmt
    .query_map(params![encode_dt(since)], |row| RawVisitor::read(row, 0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws.into_iter().map(RawVisitor::into_visitor).collect()
}

fn load_permissions(
  conn: &Connection,
  role_id: &str,
) -> Result<BTreeSet<Permission>> {
  let mut stmt =
    conn.prepare("SELECT permission FROM role_permissions WHERE role_id = ?1")?;
  let names = stmt
    .query_map(params![role_id], |r| r.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  names
    .into_iter()
    .map(|n| Permission::try_from(n).map_err(Error::from))
    .collect()
}

fn write_permissions(
  conn: &Connection,
  role_id: &str,
  permissions: &BTreeSet<Permission>,
) -> Result<()> {
  conn.execute(
    "DELETE FROM role_permissions WHERE role_id = ?1",
    params![role_id],
  )?;
  let mut stmt = conn.prepare(
    "INSERT INTO role_permissions (role_id, permission) VALUES (?1, ?2)",
  )?;
  for p in permissions {
    stmt.execute(params![role_id, p.name()])?;
  }
  Ok(())
}

fn select_role(conn: &Connection, role_id: Uuid) -> Result<Option<Role>> {
  let id = encode_uuid(role_id);
  let row = conn
    .query_row(
      "SELECT name, description FROM roles WHERE role_id = ?1",
      params![id],
      |r| Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?)),
    )
    .optional()?;

  let Some((name, description)) = row else {
    return Ok(None);
  };
  Ok(Some(Role {
    role_id,
    name,
    description,
    permissions: load_permissions(conn, &id)?,
  }))
}

fn require_role(conn: &Connection, role_id: Uuid) -> Result<Role> {
  select_role(conn, role_id)?.ok_or(Error::RoleNotFound(role_id))
}

fn insert_role(conn: &Connection, input: NewRole) -> Result<Role> {
  let role = Role {
    role_id:     Uuid::new_v4(),
    name:        input.name,
    description: input.description,
    permissions: input.permissions,
  };
  let id = encode_uuid(role.role_id);

  conn
    .execute(
      "INSERT INTO roles (role_id, name, description) VALUES (?1, ?2, ?3)",
      params![id, role.name, role.description],
    )
    .map_err(unique_violation("role name"))?;
  write_permissions(conn, &id, &role.permissions)?;

  Ok(role)
}

fn select_user(conn: &Connection, user_id: Uuid) -> Result<Option<User>> {
  let raw = conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = ?1"),
      params![encode_uuid(user_id)],
      |row| RawUser::read(row, 0),
    )
    .optional()?;
  raw.map(RawUser::into_user).transpose()
}

fn require_user(conn: &Connection, user_id: Uuid) -> Result<User> {
  select_user(conn, user_id)?.ok_or(Error::UserNotFound(user_id))
}

// ─── Store impls ─────────────────────────────────────────────────────────────

impl Store for SqliteStore {
  type Error = Error;
}

// ── Visitors ────────────────────────────────────────────────────────────────

impl VisitorRegistry for SqliteStore {
  async fn register_visitor(
    &self,
    details: VisitorDetails,
    issue_ttl: Option<TimeDelta>,
    now: DateTime<Utc>,
  ) -> Result<(Visitor, Option<Credential>)> {
    let visitor = Visitor {
      visitor_id:     Uuid::new_v4(),
      name:           details.name,
      identification: details.identification,
      organization:   details.organization,
      visit_reason:   details.visit_reason,
      state:          VisitorState::Active,
      registered_at:  now,
    };

    self
      .transact(move |tx| {
        insert_visitor(tx, &visitor)?;
        let credential = issue_ttl
          .map(|ttl| insert_credential(tx, visitor.visitor_id, ttl, now))
          .transpose()?;
        Ok((visitor, credential))
      })
      .await
  }

  async fn get_visitor(&self, visitor_id: Uuid) -> Result<Option<Visitor>> {
    self
      .with_conn(move |conn| select_visitor(conn, visitor_id))
      .await
  }

  async fn list_visitors(
    &self,
    query: &VisitorQuery,
  ) -> Result<Vec<VisitorSummary>> {
    let state = query.state.map(encode_visitor_state);
    let pattern = query
      .text
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(like_pattern);

    let raws = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VISITOR_COLUMNS},
             (SELECT c.code FROM credentials c
              WHERE c.visitor_id = v.visitor_id AND c.state = 'active'
              ORDER BY c.issued_at DESC LIMIT 1),
             (SELECT COUNT(*) FROM access_records a
              WHERE a.visitor_id = v.visitor_id
                AND a.direction = 'entry' AND a.authorized = 1)
           FROM visitors v
           WHERE (?1 IS NULL OR v.state = ?1)
             AND (?2 IS NULL
                  OR v.name           LIKE ?2 ESCAPE '\\'
                  OR v.identification LIKE ?2 ESCAPE '\\'
                  OR v.organization   LIKE ?2 ESCAPE '\\')
           ORDER BY v.registered_at DESC"
        ))?;

        let rows = stmt
          .query_map(params![state, pattern], |row| {
            Ok((
              RawVisitor::read(row, 0)?,
              row.get::<_, Option<String>>(RawVisitor::WIDTH)?,
              row.get::<_, i64>(RawVisitor::WIDTH + 1)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, active_code, entries)| {
        Ok(VisitorSummary {
          visitor: raw.into_visitor()?,
          active_code,
          entry_count: entries.max(0) as u64,
        })
      })
      .collect()
  }

  async fn update_visitor(
    &self,
    visitor_id: Uuid,
    details: VisitorDetails,
  ) -> Result<Visitor> {
    self
      .transact(move |tx| {
        let current = require_visitor(tx, visitor_id)?;
        let id = encode_uuid(visitor_id);

        if current.identification != details.identification {
          let referenced: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM access_records WHERE visitor_id = ?1)",
            params![id],
            |r| r.get(0),
          )?;
          if referenced {
            return Err(Error::IdentificationLocked(visitor_id));
          }
        }

        tx.execute(
          "UPDATE visitors
           SET name = ?2, identification = ?3, organization = ?4,
               visit_reason = ?5
           WHERE visitor_id = ?1",
          params![
            id,
            details.name,
            details.identification,
            details.organization,
            details.visit_reason,
          ],
        )
        .map_err(unique_violation("identification"))?;

        Ok(Visitor {
          name: details.name,
          identification: details.identification,
          organization: details.organization,
          visit_reason: details.visit_reason,
          ..current
        })
      })
      .await
  }

  async fn set_visitor_state(
    &self,
    visitor_id: Uuid,
    state: VisitorState,
  ) -> Result<Visitor> {
    self
      .transact(move |tx| {
        let mut visitor = require_visitor(tx, visitor_id)?;
        tx.execute(
          "UPDATE visitors SET state = ?2 WHERE visitor_id = ?1",
          params![encode_uuid(visitor_id), encode_visitor_state(state)],
        )?;
        if !state.is_active() {
          let closed = close_credentials_of(tx, visitor_id)?;
          tracing::debug!(%visitor_id, closed, "visitor deactivated");
        }
        visitor.state = state;
        Ok(visitor)
      })
      .await
  }
}

// ── Credentials ─────────────────────────────────────────────────────────────

impl CredentialRegistry for SqliteStore {
  async fn find_usable(
    &self,
    code: String,
    now: DateTime<Utc>,
  ) -> Result<Option<UsableCredential>> {
    self
      .with_conn(move |conn| select_usable(conn, &code, now))
      .await
  }

  async fn issue_credential(
    &self,
    visitor_id: Uuid,
    ttl: TimeDelta,
    now: DateTime<Utc>,
  ) -> Result<Credential> {
    self
      .transact(move |tx| insert_credential(tx, visitor_id, ttl, now))
      .await
  }

  async fn deactivate_credential(&self, credential_id: Uuid) -> Result<bool> {
    self
      .with_conn(move |conn| close_credential(conn, credential_id))
      .await
  }

  async fn list_credentials(&self, visitor_id: Uuid) -> Result<Vec<Credential>> {
    let raws = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CREDENTIAL_COLUMNS} FROM credentials c
           WHERE c.visitor_id = ?1
           ORDER BY c.issued_at DESC"
        ))?;
        let rows = stmt
          .query_map(params![encode_uuid(visitor_id)], |row| {
            RawCredential::read(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCredential::into_credential).collect()
  }
}

// ── Access ledger ───────────────────────────────────────────────────────────

impl AccessLedger for SqliteStore {
  async fn resolve_attempt<F>(
    &self,
    code: String,
    now: DateTime<Utc>,
    decide: F,
  ) -> Result<AttemptReceipt>
  where
    F: FnOnce(Option<&UsableCredential>) -> Verdict + Send + 'static,
  {
    self
      .transact(move |tx| {
        let found = select_usable(tx, &code, now)?;
        let verdict = decide(found.as_ref());

        // Under BEGIN IMMEDIATE no other writer can close the credential
        // between the lookup and this update.
        if let Some(credential_id) = verdict.deactivate {
          if !close_credential(tx, credential_id)? {
            return Err(Error::CredentialNotActive(credential_id));
          }
        }

        let record = verdict
          .record
          .map(|r| insert_access_record(tx, r))
          .transpose()?;
        let alert = verdict.alert.map(|a| insert_alert(tx, a)).transpose()?;

        Ok(AttemptReceipt { outcome: verdict.outcome, record, alert })
      })
      .await
  }

  async fn list_access_records(
    &self,
    query: &AccessQuery,
  ) -> Result<Vec<AccessEntry>> {
    let from = query.from.map(encode_dt);
    let to = query.to.map(encode_dt);
    let direction = query.direction.map(encode_direction);
    let authorized = query.authorized;
    let visitor_id = query.visitor_id.map(encode_uuid);
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT) as i64;
    let offset = query.offset.unwrap_or(0) as i64;

    let raws = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS}, v.name, u.name
           FROM access_records a
           LEFT JOIN visitors v ON v.visitor_id = a.visitor_id
           LEFT JOIN users    u ON u.user_id    = a.actor_id
           WHERE (?1 IS NULL OR a.recorded_at >= ?1)
             AND (?2 IS NULL OR a.recorded_at <= ?2)
             AND (?3 IS NULL OR a.direction = ?3)
             AND (?4 IS NULL OR a.authorized = ?4)
             AND (?5 IS NULL OR a.visitor_id = ?5)
           ORDER BY a.recorded_at DESC, a.rowid DESC
           LIMIT ?6 OFFSET ?7"
        ))?;

        let rows = stmt
          .query_map(
            params![from, to, direction, authorized, visitor_id, limit, offset],
            |row| {
              Ok((
                RawAccessRecord::read(row, 0)?,
                row.get::<_, Option<String>>(RawAccessRecord::WIDTH)?,
                row.get::<_, Option<String>>(RawAccessRecord::WIDTH + 1)?,
              ))
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, visitor_name, actor_name)| {
        Ok(AccessEntry { record: raw.into_record()?, visitor_name, actor_name })
      })
      .collect()
  }

  async fn access_summary(&self, range: ReportRange) -> Result<AccessSummary> {
    let from = encode_dt(range.from);
    let to = encode_dt(range.to);

    self
      .with_conn(move |conn| {
        let counts: [i64; 5] = conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(authorized), 0),
                  COUNT(DISTINCT visitor_id),
                  COALESCE(SUM(direction = 'entry'), 0),
                  COALESCE(SUM(direction = 'exit'), 0)
           FROM access_records
           WHERE recorded_at >= ?1 AND recorded_at <= ?2",
          params![from, to],
          |r| Ok([r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?]),
        )?;
        let [total, authorized, unique_visitors, entries, exits] =
          counts.map(|n| n.max(0) as u64);

        Ok(AccessSummary {
          total,
          authorized,
          denied: total - authorized,
          unique_visitors,
          entries,
          exits,
        })
      })
      .await
  }

  async fn frequent_visitors(&self, limit: usize) -> Result<Vec<FrequentVisitor>> {
    let limit = limit as i64;

    let raws = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT v.visitor_id, v.name, v.organization, COUNT(*) AS entries
           FROM access_records a
           JOIN visitors v ON v.visitor_id = a.visitor_id
           WHERE a.direction = 'entry' AND a.authorized = 1
           GROUP BY v.visitor_id
           ORDER BY entries DESC, v.name ASC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(params![limit], |r| {
            Ok((
              r.get::<_, String>(0)?,
              r.get::<_, String>(1)?,
              r.get::<_, Option<String>>(2)?,
              r.get::<_, i64>(3)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(id, name, organization, entries)| {
        Ok(FrequentVisitor {
          visitor_id: decode_uuid(&id)?,
          name,
          organization,
          entries: entries.max(0) as u64,
        })
      })
      .collect()
  }

  async fn visitors_on_premises(
    &self,
    since: DateTime<Utc>,
  ) -> Result<Vec<Visitor>> {
    self
      .with_conn(move |conn| select_on_premises(conn, since))
      .await
  }

  async fn overview(
    &self,
    now: DateTime<Utc>,
    day_start: DateTime<Utc>,
  ) -> Result<Overview> {
    self
      .with_conn(move |conn| {
        let now = encode_dt(now);
        let today = encode_dt(day_start);

        let alerts: [i64; 4] = conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(severity = 'high'), 0),
                  COALESCE(SUM(severity = 'medium'), 0),
                  COALESCE(SUM(severity = 'low'), 0)
           FROM alerts WHERE raised_at >= ?1",
          params![today],
          |r| Ok([r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?]),
        )?;
        let [total, high, medium, low] = alerts.map(|n| n.max(0) as u64);

        Ok(Overview {
          active_visitors:      count(
            conn,
            "SELECT COUNT(*) FROM visitors WHERE state = ?1",
            "active",
          )?,
          active_credentials:   count(
            conn,
            "SELECT COUNT(*) FROM credentials
             WHERE state = 'active'
               AND (expires_at IS NULL OR expires_at > ?1)",
            &now,
          )?,
          active_users:         count(
            conn,
            "SELECT COUNT(*) FROM users WHERE state = ?1",
            "active",
          )?,
          accesses_today:       count(
            conn,
            "SELECT COUNT(*) FROM access_records WHERE recorded_at >= ?1",
            &today,
          )?,
          alerts_today:         AlertCounts { total, high, medium, low },
          visitors_on_premises: select_on_premises(conn, day_start)?.len()
            as u64,
        })
      })
      .await
  }

  async fn daily_activity(
    &self,
    since: DateTime<Utc>,
    offset: FixedOffset,
  ) -> Result<Vec<DailyActivity>> {
    let rows = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT recorded_at, direction, authorized FROM access_records
           WHERE recorded_at >= ?1",
        )?;
        let rows = stmt
          .query_map(params![encode_dt(since)], |r| {
            Ok((
              r.get::<_, String>(0)?,
              r.get::<_, String>(1)?,
              r.get::<_, bool>(2)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Days are local to `offset`.
    let mut days = BTreeMap::new();
    for (recorded_at, direction, authorized) in rows {
      let date = decode_dt(&recorded_at)?.with_timezone(&offset).date_naive();
      let day = days.entry(date).or_insert(DailyActivity {
        date,
        total: 0,
        entries: 0,
        exits: 0,
        denied: 0,
      });
      day.total += 1;
      match decode_direction(&direction)? {
        Direction::Entry => day.entries += 1,
        Direction::Exit => day.exits += 1,
      }
      if !authorized {
        day.denied += 1;
      }
    }

    Ok(days.into_values().rev().collect())
  }
}

// ── Alerts ──────────────────────────────────────────────────────────────────

impl AlertSink for SqliteStore {
  async fn raise_alert(&self, alert: NewAlert) -> Result<Alert> {
    self.with_conn(move |conn| insert_alert(conn, alert)).await
  }

  async fn list_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
    let severity = query.severity.map(encode_severity);
    let from = query.from.map(encode_dt);
    let to = query.to.map(encode_dt);
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT) as i64;

    let raws = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ALERT_COLUMNS} FROM alerts
           WHERE (?1 IS NULL OR severity = ?1)
             AND (?2 IS NULL OR raised_at >= ?2)
             AND (?3 IS NULL OR raised_at <= ?3)
           ORDER BY raised_at DESC, rowid DESC
           LIMIT ?4"
        ))?;
        let rows = stmt
          .query_map(params![severity, from, to, limit], RawAlert::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAlert::into_alert).collect()
  }

  async fn delete_alert(&self, alert_id: Uuid) -> Result<bool> {
    self
      .with_conn(move |conn| {
        let changed = conn.execute(
          "DELETE FROM alerts WHERE alert_id = ?1",
          params![encode_uuid(alert_id)],
        )?;
        Ok(changed > 0)
      })
      .await
  }
}

// ── Permissions ─────────────────────────────────────────────────────────────

impl PermissionStore for SqliteStore {
  async fn permissions_for(&self, user_id: Uuid) -> Result<BTreeSet<Permission>> {
    let names = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT rp.permission
           FROM users u
           JOIN role_permissions rp ON rp.role_id = u.role_id
           WHERE u.user_id = ?1 AND u.state = 'active'",
        )?;
        let rows = stmt
          .query_map(params![encode_uuid(user_id)], |r| r.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    names
      .into_iter()
      .map(|n| Permission::try_from(n).map_err(Error::from))
      .collect()
  }
}

// ── Staff ───────────────────────────────────────────────────────────────────

impl StaffDirectory for SqliteStore {
  async fn create_role(&self, role: NewRole) -> Result<Role> {
    self.transact(move |tx| insert_role(tx, role)).await
  }

  async fn list_roles(&self) -> Result<Vec<Role>> {
    self
      .with_conn(|conn| {
        let mut stmt = conn.prepare(
          "SELECT role_id, name, description FROM roles ORDER BY name",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok((
              r.get::<_, String>(0)?,
              r.get::<_, String>(1)?,
              r.get::<_, Option<String>>(2)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        rows
          .into_iter()
          .map(|(id, name, description)| {
            Ok(Role {
              role_id: decode_uuid(&id)?,
              permissions: load_permissions(conn, &id)?,
              name,
              description,
            })
          })
          .collect()
      })
      .await
  }

  async fn set_role_permissions(
    &self,
    role_id: Uuid,
    permissions: BTreeSet<Permission>,
  ) -> Result<Role> {
    self
      .transact(move |tx| {
        let mut role = require_role(tx, role_id)?;
        write_permissions(tx, &encode_uuid(role_id), &permissions)?;
        role.permissions = permissions;
        Ok(role)
      })
      .await
  }

  async fn update_role(&self, role_id: Uuid, role: NewRole) -> Result<Role> {
    self
      .transact(move |tx| {
        require_role(tx, role_id)?;
        let id = encode_uuid(role_id);
        tx.execute(
          "UPDATE roles SET name = ?2, description = ?3 WHERE role_id = ?1",
          params![id, role.name, role.description],
        )
        .map_err(unique_violation("role name"))?;
        write_permissions(tx, &id, &role.permissions)?;

        Ok(Role {
          role_id,
          name: role.name,
          description: role.description,
          permissions: role.permissions,
        })
      })
      .await
  }

  async fn delete_role(&self, role_id: Uuid) -> Result<()> {
    self
      .transact(move |tx| {
        require_role(tx, role_id)?;
        let id = encode_uuid(role_id);
        let in_use: bool = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM users WHERE role_id = ?1)",
          params![id],
          |r| r.get(0),
        )?;
        if in_use {
          return Err(Error::RoleInUse(role_id));
        }
        tx.execute("DELETE FROM roles WHERE role_id = ?1", params![id])?;
        Ok(())
      })
      .await
  }

  async fn seed_default_roles(&self) -> Result<usize> {
    self
      .transact(|tx| {
        let existing: i64 =
          tx.query_row("SELECT COUNT(*) FROM roles", [], |r| r.get(0))?;
        if existing > 0 {
          return Ok(0);
        }
        let roles = default_roles();
        let seeded = roles.len();
        for role in roles {
          tracing::debug!(name = %role.name, "seeding role");
          insert_role(tx, role)?;
        }
        Ok(seeded)
      })
      .await
  }

  async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User> {
    self
      .transact(move |tx| {
        require_role(tx, user.role_id)?;

        let created = User {
          user_id:    Uuid::new_v4(),
          name:       user.name,
          email:      user.email,
          role_id:    user.role_id,
          state:      UserState::Active,
          created_at: now,
        };

        tx.execute(
          "INSERT INTO users (
             user_id, name, email, password_hash, role_id, state, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![
            encode_uuid(created.user_id),
            created.name,
            created.email,
            user.password_hash,
            encode_uuid(created.role_id),
            encode_user_state(created.state),
            encode_dt(created.created_at),
          ],
        )
        .map_err(unique_violation("email"))?;

        Ok(created)
      })
      .await
  }

  async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User> {
    self
      .transact(move |tx| {
        let mut user = require_user(tx, user_id)?;
        tx.execute(
          "UPDATE users
           SET name = ?2, email = ?3,
               password_hash = COALESCE(?4, password_hash)
           WHERE user_id = ?1",
          params![
            encode_uuid(user_id),
            update.name,
            update.email,
            update.password_hash,
          ],
        )
        .map_err(unique_violation("email"))?;
        user.name = update.name;
        user.email = update.email;
        Ok(user)
      })
      .await
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    self.with_conn(move |conn| select_user(conn, user_id)).await
  }

  async fn find_login(&self, email: &str) -> Result<Option<UserLogin>> {
    let email = email.trim().to_owned();

    let raw = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {USER_COLUMNS}, u.password_hash FROM users u
                 WHERE u.email = ?1 AND u.state = 'active'"
              ),
              params![email],
              |row| {
                Ok((
                  RawUser::read(row, 0)?,
                  row.get::<_, String>(RawUser::WIDTH)?,
                ))
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(user, password_hash)| {
        Ok(UserLogin { user: user.into_user()?, password_hash })
      })
      .transpose()
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws = self
      .with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users u ORDER BY u.name"
        ))?;
        let rows = stmt
          .query_map([], |row| RawUser::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn set_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<User> {
    self
      .transact(move |tx| {
        let mut user = require_user(tx, user_id)?;
        require_role(tx, role_id)?;
        tx.execute(
          "UPDATE users SET role_id = ?2 WHERE user_id = ?1",
          params![encode_uuid(user_id), encode_uuid(role_id)],
        )?;
        user.role_id = role_id;
        Ok(user)
      })
      .await
  }

  async fn set_user_state(&self, user_id: Uuid, state: UserState) -> Result<User> {
    self
      .transact(move |tx| {
        let mut user = require_user(tx, user_id)?;
        tx.execute(
          "UPDATE users SET state = ?2 WHERE user_id = ?1",
          params![encode_uuid(user_id), encode_user_state(state)],
        )?;
        user.state = state;
        Ok(user)
      })
      .await
  }
}
