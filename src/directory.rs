//! User directory: identity records and recipient resolution.
//!
//! The directory is a read-only leaf for the rest of the portal core.
//! The ledger asks it to expand a recipient selector into concrete user ids
//! and to resolve display names; nothing here writes to the `users` table.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

// ── Domain types ────────────────────────────────────────────────

/// Portal role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrator: can broadcast to the employee roster.
    Admin,
    /// Regular employee.
    Employee,
}

impl Role {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Employee => "employee",
        }
    }

    /// Parse from a SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised role.
    pub fn parse(s: &str) -> Result<Self, DirectoryError> {
        match s {
            "admin" => Ok(Self::Admin),
            "employee" => Ok(Self::Employee),
            other => Err(DirectoryError::InvalidEnum {
                field: "role",
                value: other.to_owned(),
            }),
        }
    }
}

/// Row type returned by SQLite queries for users.
type UserRow = (i64, Option<String>, String, String, String);

/// A portal user identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Database row id.
    pub id: i64,
    /// External employee code (unique when present).
    pub employee_code: Option<String>,
    /// Login email (unique).
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Portal role.
    pub role: Role,
}

/// Who a message should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientSelector {
    /// A single user by id.
    User(i64),
    /// Every user currently holding the employee role.
    AllEmployees,
}

// ── Errors ──────────────────────────────────────────────────────

/// Errors from directory lookups.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The selected recipient does not exist.
    #[error("recipient not found: {0}")]
    RecipientNotFound(i64),

    /// An invalid enum value was read from the database.
    #[error("invalid {field} value: {value:?}")]
    InvalidEnum {
        /// Which field contained the bad value.
        field: &'static str,
        /// The unexpected value.
        value: String,
    },
}

// ── Queries ─────────────────────────────────────────────────────

/// Load a user by id.
///
/// # Errors
///
/// Returns [`DirectoryError::RecipientNotFound`] if no user matches,
/// or [`DirectoryError::Database`] on SQLite failure.
pub async fn get_user(db: &SqlitePool, user_id: i64) -> Result<User, DirectoryError> {
    let row: UserRow = sqlx::query_as(
        "SELECT id, employee_code, email, name, role FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or(DirectoryError::RecipientNotFound(user_id))?;
    user_from_row(row)
}

/// Expand a recipient selector into concrete user ids.
///
/// A specific id is validated to exist and returned as a singleton.
/// `AllEmployees` expands to the roster of users holding the employee role
/// at the instant of the call; an empty roster is not an error.
///
/// # Errors
///
/// Returns [`DirectoryError::RecipientNotFound`] for a nonexistent specific
/// id, or [`DirectoryError::Database`] on SQLite failure.
pub async fn resolve_recipients(
    db: &SqlitePool,
    selector: RecipientSelector,
) -> Result<Vec<i64>, DirectoryError> {
    match selector {
        RecipientSelector::User(id) => {
            let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?1")
                .bind(id)
                .fetch_optional(db)
                .await?;
            match row {
                Some(_) => Ok(vec![id]),
                None => Err(DirectoryError::RecipientNotFound(id)),
            }
        }
        RecipientSelector::AllEmployees => {
            let rows: Vec<(i64,)> =
                sqlx::query_as("SELECT id FROM users WHERE role = 'employee' ORDER BY id")
                    .fetch_all(db)
                    .await?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        }
    }
}

/// Count users currently holding the employee role.
///
/// # Errors
///
/// Returns [`DirectoryError::Database`] on SQLite failure.
pub async fn employee_count(db: &SqlitePool) -> Result<i64, DirectoryError> {
    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM users WHERE role = 'employee'")
        .fetch_one(db)
        .await?;
    Ok(count)
}

fn user_from_row(row: UserRow) -> Result<User, DirectoryError> {
    let (id, employee_code, email, display_name, role) = row;
    Ok(User {
        id,
        employee_code,
        email,
        display_name,
        role: Role::parse(&role)?,
    })
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn make_db() -> SqlitePool {
        let pool = db::connect_in_memory().await.expect("connect");
        db::provision(&pool).await.expect("provision");
        db::seed(&pool).await.expect("seed");
        pool
    }

    #[tokio::test]
    async fn test_get_user_resolves_seeded_admin() {
        let pool = make_db().await;
        let user = get_user(&pool, 1).await.expect("get admin");
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.email, "admin@maxelo.com");
        assert_eq!(user.employee_code.as_deref(), Some("ADMIN001"));
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let pool = make_db().await;
        let err = get_user(&pool, 404).await.expect_err("should fail");
        assert!(matches!(err, DirectoryError::RecipientNotFound(404)));
    }

    #[tokio::test]
    async fn test_resolve_single_recipient() {
        let pool = make_db().await;
        let ids = resolve_recipients(&pool, RecipientSelector::User(2))
            .await
            .expect("resolve");
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_resolve_missing_recipient_fails() {
        let pool = make_db().await;
        let err = resolve_recipients(&pool, RecipientSelector::User(404))
            .await
            .expect_err("should fail");
        assert!(matches!(err, DirectoryError::RecipientNotFound(404)));
    }

    #[tokio::test]
    async fn test_resolve_all_employees_excludes_admins() {
        let pool = make_db().await;
        let ids = resolve_recipients(&pool, RecipientSelector::AllEmployees)
            .await
            .expect("resolve");
        // Seed data has one employee (id 2); the admin is not in the roster.
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_resolve_all_employees_empty_roster_is_ok() {
        let pool = db::connect_in_memory().await.expect("connect");
        db::provision(&pool).await.expect("provision");
        let ids = resolve_recipients(&pool, RecipientSelector::AllEmployees)
            .await
            .expect("resolve");
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_employee_count() {
        let pool = make_db().await;
        assert_eq!(employee_count(&pool).await.expect("count"), 1);
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::parse("admin").expect("parse"), Role::Admin);
        assert_eq!(Role::parse("employee").expect("parse"), Role::Employee);
        assert!(Role::parse("superuser").is_err());
    }
}
