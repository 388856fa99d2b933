//! SQL schema for the Gatekeep SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for later migrations.

/// Per-connection settings; must run outside any transaction.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 UTC strings with microseconds, so
/// string comparison orders them chronologically.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS roles (
    role_id      TEXT PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    description  TEXT
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role_id     TEXT NOT NULL REFERENCES roles(role_id) ON DELETE CASCADE,
    permission  TEXT NOT NULL,          -- dotted wire name
    PRIMARY KEY (role_id, permission)
);

CREATE TABLE IF NOT EXISTS users (
    user_id        TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    email          TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash  TEXT NOT NULL,
    role_id        TEXT NOT NULL REFERENCES roles(role_id),
    state          TEXT NOT NULL CHECK (state IN ('active', 'inactive')),
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS visitors (
    visitor_id      TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    identification  TEXT NOT NULL UNIQUE,
    organization    TEXT,
    visit_reason    TEXT,
    state           TEXT NOT NULL CHECK (state IN ('active', 'inactive')),
    registered_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    credential_id  TEXT PRIMARY KEY,
    visitor_id     TEXT NOT NULL REFERENCES visitors(visitor_id),
    code           TEXT NOT NULL UNIQUE,
    state          TEXT NOT NULL CHECK (state IN ('active', 'inactive')),
    expires_at     TEXT,
    issued_at      TEXT NOT NULL
);

-- Append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS access_records (
    record_id      TEXT PRIMARY KEY,
    actor_id       TEXT NOT NULL,
    visitor_id     TEXT REFERENCES visitors(visitor_id),
    credential_id  TEXT REFERENCES credentials(credential_id),
    direction      TEXT NOT NULL CHECK (direction IN ('entry', 'exit')),
    authorized     INTEGER NOT NULL,
    recorded_at    TEXT NOT NULL
);

-- Append-only apart from administrative deletion.
CREATE TABLE IF NOT EXISTS alerts (
    alert_id     TEXT PRIMARY KEY,
    description  TEXT NOT NULL,
    severity     TEXT NOT NULL CHECK (severity IN ('low', 'medium', 'high')),
    actor_id     TEXT,
    visitor_id   TEXT REFERENCES visitors(visitor_id),
    raised_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS credentials_visitor_idx ON credentials(visitor_id);
CREATE INDEX IF NOT EXISTS records_recorded_idx    ON access_records(recorded_at);
CREATE INDEX IF NOT EXISTS records_visitor_idx     ON access_records(visitor_id);
CREATE INDEX IF NOT EXISTS alerts_raised_idx       ON alerts(raised_at);
CREATE INDEX IF NOT EXISTS users_role_idx          ON users(role_id);

PRAGMA user_version = 1;
";
