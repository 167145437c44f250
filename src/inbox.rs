//! Inbox view: a read-only projection over the message ledger.
//!
//! Listing an inbox is the read receipt: the same transaction that takes the
//! snapshot also flips every unread row to read, and each summary reports the
//! unread state as it was before the flip.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::gate::Identity;
use crate::ledger::LedgerError;

/// Placeholder shown when a message's sender no longer exists in the
/// directory.
const REMOVED_SENDER: &str = "(removed user)";

/// One inbox entry, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    /// Message row id.
    pub id: i64,
    /// Sender's display name, or a placeholder for removed senders.
    pub sender_display_name: String,
    /// Optional subject line.
    pub subject: Option<String>,
    /// Message body.
    pub body: String,
    /// Whether the message carries an attachment.
    pub has_attachment: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Whether the message was unread at the moment this snapshot was taken,
    /// before the listing itself marked it read.
    pub was_unread_at_fetch: bool,
}

/// Row type returned by the inbox query.
type SummaryRow = (
    i64,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    i64,
    String,
);

/// List the caller's inbox, newest first.
///
/// Returns a finite snapshot ordered by `created_at` descending, ties broken
/// by insertion order (higher id first). As a side effect the caller's
/// unread messages are marked read inside the same transaction, so a
/// subsequent [`unread_count`] on the pool observes the mark.
///
/// # Errors
///
/// Returns [`LedgerError::Database`] on SQLite failure; the snapshot and the
/// read-mark commit or roll back together.
pub async fn list(db: &SqlitePool, user: Identity) -> Result<Vec<MessageSummary>, LedgerError> {
    let mut tx = db.begin().await?;

    let rows: Vec<SummaryRow> = sqlx::query_as(
        "SELECT m.id, u.name, m.subject, m.body, m.attachment_locator, \
                m.is_read, m.created_at \
         FROM messages m LEFT JOIN users u ON u.id = m.sender_id \
         WHERE m.receiver_id = ?1 \
         ORDER BY m.created_at DESC, m.id DESC",
    )
    .bind(user.user_id)
    .fetch_all(&mut *tx)
    .await?;

    sqlx::query("UPDATE messages SET is_read = 1 WHERE receiver_id = ?1 AND is_read = 0")
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(rows
        .into_iter()
        .map(
            |(id, sender, subject, body, locator, is_read, created_at)| MessageSummary {
                id,
                sender_display_name: sender.unwrap_or_else(|| REMOVED_SENDER.to_owned()),
                subject,
                body,
                has_attachment: locator.is_some(),
                created_at,
                was_unread_at_fetch: is_read == 0,
            },
        )
        .collect())
}

/// Count the caller's unread messages. Pure query, no side effects.
///
/// # Errors
///
/// Returns [`LedgerError::Database`] on SQLite failure.
pub async fn unread_count(db: &SqlitePool, user: Identity) -> Result<i64, LedgerError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM messages WHERE receiver_id = ?1 AND is_read = 0",
    )
    .bind(user.user_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

// ── Tests ───────────────────────────────────────────────────────
