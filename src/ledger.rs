//! Message ledger: composition, fan-out, read-state transitions, and
//! ownership-mediated attachment access.
//!
//! A broadcast send creates one independent message row per employee on the
//! roster snapshot — there is no shared broadcast entity. All recipient rows
//! for one send are inserted inside a single transaction: either every
//! resolved recipient gets the message or none do. When an attachment was
//! already written before the transaction failed, the file is removed
//! best-effort so a failed send does not leak storage.

use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::attachments::{extension_allowed, AttachmentError, AttachmentStore};
use crate::directory::{self, DirectoryError, RecipientSelector};
use crate::gate::Identity;

// ── Types ───────────────────────────────────────────────────────

/// An uploaded file accompanying a message draft.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    /// Filename as declared by the uploader.
    pub filename: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

/// A message draft as composed by the sender.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    /// Optional subject line.
    pub subject: Option<String>,
    /// Message body; must be non-empty.
    pub body: String,
    /// Optional attachment upload.
    pub attachment: Option<AttachmentUpload>,
}

/// Result of a send call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReceipt {
    /// Number of message rows created (one per resolved recipient).
    pub created_count: usize,
}

// ── Errors ──────────────────────────────────────────────────────

/// Errors from ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The message body is empty.
    #[error("message body must not be empty")]
    EmptyBody,

    /// The attachment's extension is not on the upload allow-list.
    #[error("unsupported attachment type: {0:?}")]
    UnsupportedAttachmentType(String),

    /// Attachment storage failed.
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    /// Recipient resolution failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// No message with this id is addressed to the caller, or it carries
    /// no attachment.
    #[error("message not found: {0}")]
    MessageNotFound(i64),

    /// Database operation failed; the whole operation may be retried.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ── Send ────────────────────────────────────────────────────────

/// Compose and deliver a message to one recipient or the employee roster.
///
/// Validation happens before any write: the body must be non-empty and an
/// attachment's extension must be allow-listed, otherwise the send is
/// rejected entirely — no partial message is created for any recipient.
///
/// The recipient roster is a snapshot taken at call time; employees added
/// afterwards are not included. An attachment is persisted once, and every
/// created row shares that locator.
///
/// Returns the number of rows created. A broadcast to an empty roster
/// creates zero rows and is not an error.
///
/// # Errors
///
/// See [`LedgerError`]; a [`LedgerError::Database`] failure mid-fan-out
/// rolls back every row of this call.
#[instrument(skip(db, store, draft, sender), fields(sender_id = sender.user_id))]
pub async fn send(
    db: &SqlitePool,
    store: &AttachmentStore,
    sender: Identity,
    selector: RecipientSelector,
    draft: MessageDraft,
) -> Result<SendReceipt, LedgerError> {
    if draft.body.trim().is_empty() {
        return Err(LedgerError::EmptyBody);
    }
    if let Some(ref upload) = draft.attachment {
        if !extension_allowed(&upload.filename) {
            return Err(LedgerError::UnsupportedAttachmentType(
                upload.filename.clone(),
            ));
        }
    }

    let recipients = directory::resolve_recipients(db, selector).await?;
    if recipients.is_empty() {
        info!("broadcast to empty roster, nothing created");
        return Ok(SendReceipt { created_count: 0 });
    }

    // Persist the attachment once, before fan-out; every row shares the
    // locator.
    let attachment = match draft.attachment {
        Some(upload) => {
            let locator = store.store(&upload.filename, &upload.bytes).await?;
            Some((locator, upload.filename))
        }
        None => None,
    };

    let created_at = chrono::Utc::now().to_rfc3339();
    let fan_out = insert_fan_out(
        db,
        sender.user_id,
        &recipients,
        draft.subject.as_deref(),
        &draft.body,
        attachment
            .as_ref()
            .map(|(locator, filename)| (locator.as_str(), filename.as_str())),
        &created_at,
    )
    .await;

    if let Err(e) = fan_out {
        // The rows are gone; take the already-written file with them.
        if let Some((locator, _)) = attachment {
            store.remove(&locator).await;
        }
        return Err(LedgerError::Database(e));
    }

    info!(recipients = recipients.len(), "message fan-out committed");
    Ok(SendReceipt {
        created_count: recipients.len(),
    })
}

/// Insert one message row per recipient inside a single transaction.
///
/// All rows are durably created or none are.
async fn insert_fan_out(
    db: &SqlitePool,
    sender_id: i64,
    recipients: &[i64],
    subject: Option<&str>,
    body: &str,
    attachment: Option<(&str, &str)>,
    created_at: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;
    for &receiver_id in recipients {
        sqlx::query(
            "INSERT INTO messages \
             (sender_id, receiver_id, subject, body, attachment_locator, \
              attachment_filename, is_read, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(subject)
        .bind(body)
        .bind(attachment.map(|(locator, _)| locator))
        .bind(attachment.map(|(_, filename)| filename))
        .bind(created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

// ── Read-state transition ───────────────────────────────────────

/// Mark every unread message addressed to the caller as read.
///
/// One-directional (`unread -> read`) in a single pass; idempotent, so
/// calling twice has no additional effect.
///
/// # Errors
///
/// Returns [`LedgerError::Database`] on SQLite failure.
pub async fn mark_inbox_read(db: &SqlitePool, user: Identity) -> Result<(), LedgerError> {
    sqlx::query("UPDATE messages SET is_read = 1 WHERE receiver_id = ?1 AND is_read = 0")
        .bind(user.user_id)
        .execute(db)
        .await?;
    Ok(())
}

// ── Attachment access ───────────────────────────────────────────

/// Fetch the attachment of a message the caller received.
///
/// Access is mediated by message ownership: the message must be addressed
/// to the caller. Locators are never accepted from callers directly, so
/// knowing (or guessing) a locator string grants nothing.
///
/// Returns the original filename and the stored bytes.
///
/// # Errors
///
/// Returns [`LedgerError::MessageNotFound`] when no message with this id is
/// addressed to the caller or the message has no attachment — the two cases
/// are indistinguishable on purpose.
pub async fn open_attachment(
    db: &SqlitePool,
    store: &AttachmentStore,
    caller: Identity,
    message_id: i64,
) -> Result<(String, Vec<u8>), LedgerError> {
    let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT attachment_locator, attachment_filename FROM messages \
         WHERE id = ?1 AND receiver_id = ?2",
    )
    .bind(message_id)
    .bind(caller.user_id)
    .fetch_optional(db)
    .await?;

    let (locator, filename) = match row {
        Some((Some(locator), filename)) => (locator, filename),
        _ => return Err(LedgerError::MessageNotFound(message_id)),
    };

    let bytes = store.retrieve(&locator).await?;
    Ok((filename.unwrap_or(locator), bytes))
}

// ── Tests ───────────────────────────────────────────────────────
