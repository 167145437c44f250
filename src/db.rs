//! SQLite access: pool construction, schema provisioning, and seed data.
//!
//! Schema provisioning is a one-time migration step (the `init` subcommand),
//! not something the ledger or inbox perform at runtime. The pool is the sole
//! concurrency-control mechanism for the portal core: every operation is
//! request-scoped and relies on SQLite transactions, never in-process locks.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Portal schema, mirroring the original deployment's relational layout.
///
/// `employee_code` is optional but unique when present; `role` is constrained
/// to the two portal roles. Messages keep a weak reference to their stored
/// attachment (`attachment_locator`) alongside the name the uploader gave it.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_code TEXT UNIQUE,
    email         TEXT UNIQUE NOT NULL,
    password      TEXT NOT NULL,
    name          TEXT NOT NULL,
    role          TEXT NOT NULL CHECK (role IN ('admin', 'employee')),
    created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS messages (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id           INTEGER NOT NULL REFERENCES users(id),
    receiver_id         INTEGER NOT NULL REFERENCES users(id),
    subject             TEXT,
    body                TEXT NOT NULL,
    attachment_locator  TEXT,
    attachment_filename TEXT,
    is_read             INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver_id, is_read);
"#;

/// Open (creating if missing) the portal database at `path`.
///
/// Enables WAL mode for concurrent readers and foreign-key enforcement so a
/// message can never reference a user the directory has no record of.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the database cannot be opened.
pub async fn connect(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    info!(path = %path.display(), "portal database opened");
    Ok(pool)
}

/// Open a single-connection in-memory database (tests and dry runs).
///
/// A single connection keeps every query on the same in-memory database;
/// a larger pool would hand each connection its own empty one.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// Create the portal tables if they do not exist.
///
/// Idempotent; safe to run against an already-provisioned database.
///
/// # Errors
///
/// Returns [`sqlx::Error`] on SQLite failure.
pub async fn provision(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("portal schema provisioned");
    Ok(())
}

/// Insert the bootstrap accounts if the users table is empty.
///
/// Matches the accounts the original deployment seeded: one admin and one
/// employee. Does nothing when any user already exists, so re-running `init`
/// never duplicates or resets accounts.
///
/// Returns the number of accounts inserted (0 or 2).
///
/// # Errors
///
/// Returns [`sqlx::Error`] on SQLite failure.
pub async fn seed(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let (existing,): (i64,) = sqlx::query_as("SELECT count(*) FROM users")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        info!(users = existing, "seed skipped, users already present");
        return Ok(0);
    }

    sqlx::query(
        "INSERT INTO users (employee_code, email, password, name, role) VALUES \
         ('ADMIN001', 'admin@maxelo.com', 'admin123', 'Admin User', 'admin'), \
         ('EMP001', 'mavis@maxelo.com', '123admin', 'Mavis', 'employee')",
    )
    .execute(pool)
    .await?;
    info!("seeded bootstrap admin and employee accounts");
    Ok(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let pool = connect_in_memory().await.expect("connect");
        provision(&pool).await.expect("first provision");
        provision(&pool).await.expect("second provision");
    }

    #[tokio::test]
    async fn test_seed_inserts_bootstrap_accounts_once() {
        let pool = connect_in_memory().await.expect("connect");
        provision(&pool).await.expect("provision");

        let inserted = seed(&pool).await.expect("seed");
        assert_eq!(inserted, 2);

        // Second run is a no-op.
        let inserted = seed(&pool).await.expect("re-seed");
        assert_eq!(inserted, 0);

        let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM users")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = connect_in_memory().await.expect("connect");
        provision(&pool).await.expect("provision");

        // Message referencing a nonexistent user must be rejected.
        let result = sqlx::query(
            "INSERT INTO messages (sender_id, receiver_id, body, created_at) \
             VALUES (99, 98, 'hi', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_role_check_constraint() {
        let pool = connect_in_memory().await.expect("connect");
        provision(&pool).await.expect("provision");

        let result = sqlx::query(
            "INSERT INTO users (email, password, name, role) \
             VALUES ('x@y.com', 'pw', 'X', 'superuser')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "unknown role should violate CHECK");
    }
}
