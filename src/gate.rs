//! Access gate: credential verification and request-scoped identity.
//!
//! Every ledger and inbox call takes an [`Identity`] resolved here — there is
//! no ambient "logged in user" state anywhere in the crate. Credentials are
//! compared with plain equality to stay contract-compatible with the portal
//! deployment this replaces; a real deployment must swap in salted-hash
//! verification before going anywhere near production.

use sqlx::SqlitePool;
use tracing::info;

use crate::directory::{DirectoryError, Role};

/// An authenticated caller: the capability passed into every core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Directory id of the caller.
    pub user_id: i64,
    /// Role the caller authenticated as.
    pub role: Role,
}

/// Which dashboard a caller lands on, resolved once from their role.
///
/// Replaces the original's dynamic `role + "_dashboard"` template branching
/// with an explicit two-variant dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dashboard {
    /// Admin dashboard: unread messages plus roster size.
    Admin {
        /// Unread message count for the admin.
        unread: i64,
        /// Number of employees on the roster.
        employees: i64,
    },
    /// Employee dashboard: unread messages only.
    Employee {
        /// Unread message count for the employee.
        unread: i64,
    },
}

/// Errors from the access gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Email, password, and role did not match a user record.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Directory lookup failed while building a dashboard.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Unread-count query failed while building a dashboard.
    #[error(transparent)]
    Ledger(#[from] crate::ledger::LedgerError),
}

/// Verify credentials for a role-specific login.
///
/// Plain-equality comparison, matching the original portal's contract.
/// The role is part of the match: an employee's credentials never open
/// the admin login and vice versa.
///
/// # Errors
///
/// Returns [`GateError::InvalidCredentials`] when no user matches, or
/// [`GateError::Database`] on SQLite failure.
pub async fn authenticate(
    db: &SqlitePool,
    email: &str,
    password: &str,
    role: Role,
) -> Result<Identity, GateError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM users WHERE email = ?1 AND password = ?2 AND role = ?3",
    )
    .bind(email)
    .bind(password)
    .bind(role.as_str())
    .fetch_optional(db)
    .await?;

    match row {
        Some((user_id,)) => {
            info!(user_id, role = role.as_str(), "login succeeded");
            Ok(Identity { user_id, role })
        }
        None => Err(GateError::InvalidCredentials),
    }
}

/// Reset a password after verifying email plus employee code.
///
/// # Errors
///
/// Returns [`GateError::InvalidCredentials`] when the email/code pair does
/// not match a user, or [`GateError::Database`] on SQLite failure.
pub async fn reset_password(
    db: &SqlitePool,
    email: &str,
    employee_code: &str,
    new_password: &str,
) -> Result<(), GateError> {
    let updated = sqlx::query(
        "UPDATE users SET password = ?1 WHERE email = ?2 AND employee_code = ?3",
    )
    .bind(new_password)
    .bind(email)
    .bind(employee_code)
    .execute(db)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(GateError::InvalidCredentials);
    }
    info!(email, "password reset");
    Ok(())
}

/// Build the dashboard view for an authenticated caller.
///
/// # Errors
///
/// Returns [`GateError::Ledger`] or [`GateError::Directory`] on SQLite
/// failure.
pub async fn dashboard(db: &SqlitePool, identity: Identity) -> Result<Dashboard, GateError> {
    let unread = crate::inbox::unread_count(db, identity).await?;
    Ok(match identity.role {
        Role::Admin => Dashboard::Admin {
            unread,
            employees: crate::directory::employee_count(db).await?,
        },
        Role::Employee => Dashboard::Employee { unread },
    })
}

// ── Tests ───────────────────────────────────────────────────────
