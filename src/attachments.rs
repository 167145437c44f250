//! Attachment store: filesystem persistence for message attachments.
//!
//! Files live flat under a configured storage root. `store` accepts bytes
//! plus the declared filename and returns an opaque locator; `retrieve`
//! returns the bytes for a locator. Locators are storage-internal: callers
//! reach them only through a message they are allowed to read (see
//! [`crate::ledger::open_attachment`]).

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::{debug, warn};

/// Maximum attachment size in bytes (16 MiB).
///
/// Enforced before any bytes are committed to storage.
pub const MAX_ATTACHMENT_BYTES: usize = 16 * 1024 * 1024;

/// File extensions accepted for upload: textual documents, common images,
/// and office formats.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "rtf", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods",
    "png", "jpg", "jpeg", "gif", "bmp", "webp",
];

/// Errors from attachment storage operations.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    /// The declared filename is empty or would resolve outside the
    /// storage root. Never silently sanitized.
    #[error("invalid attachment filename: {0:?}")]
    InvalidFilename(String),

    /// The upload exceeds the maximum allowed size.
    #[error("attachment too large: {size} bytes exceeds {max} byte limit")]
    AttachmentTooLarge {
        /// Actual upload size in bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// No stored file matches the locator.
    #[error("attachment not found: {0}")]
    NotFound(String),

    /// Filesystem operation failed.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Returns `true` if the filename's extension is on the upload allow-list.
///
/// Comparison is case-insensitive; a filename with no extension is rejected.
pub fn extension_allowed(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Validate a declared filename: non-empty, a single normal path component.
///
/// Directory-traversal sequences (`..`), absolute paths, and separator
/// characters are rejected outright rather than sanitized into an
/// unrelated name.
fn validate_filename(filename: &str) -> Result<(), AttachmentError> {
    if filename.trim().is_empty() {
        return Err(AttachmentError::InvalidFilename(filename.to_owned()));
    }
    let path = Path::new(filename);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => return Err(AttachmentError::InvalidFilename(filename.to_owned())),
    }
    // `a\..\b` parses as one Normal component on Unix; reject backslashes
    // and parent references explicitly so the guard holds cross-platform.
    if filename.contains('\\') || filename.contains("..") {
        return Err(AttachmentError::InvalidFilename(filename.to_owned()));
    }
    Ok(())
}

/// Filesystem-backed attachment store rooted at one directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    /// Open a store rooted at `root`, creating the directory if missing.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::Io`] if the root cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, AttachmentError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Persist `bytes` under a collision-resistant storage name.
    ///
    /// The locator combines a microsecond UTC timestamp, a random suffix,
    /// and the validated original filename, so two uploads with the same
    /// name in the same second never overwrite each other.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::InvalidFilename`] for empty or traversal
    /// filenames, [`AttachmentError::AttachmentTooLarge`] when the size cap
    /// is exceeded (checked before any write), or [`AttachmentError::Io`]
    /// on filesystem failure.
    pub async fn store(&self, filename: &str, bytes: &[u8]) -> Result<String, AttachmentError> {
        validate_filename(filename)?;
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentError::AttachmentTooLarge {
                size: bytes.len(),
                max: MAX_ATTACHMENT_BYTES,
            });
        }

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%6f");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let locator = format!("{stamp}_{}_{filename}", &suffix[..8]);

        fs::write(self.root.join(&locator), bytes).await?;
        debug!(locator = %locator, size = bytes.len(), "attachment stored");
        Ok(locator)
    }

    /// Read back the bytes for a locator.
    ///
    /// The locator is validated against the same traversal rules as
    /// filenames, so a forged locator can never escape the storage root.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::NotFound`] if no file matches, or
    /// [`AttachmentError::Io`] on other filesystem failures.
    pub async fn retrieve(&self, locator: &str) -> Result<Vec<u8>, AttachmentError> {
        validate_filename(locator)
            .map_err(|_| AttachmentError::NotFound(locator.to_owned()))?;
        match fs::read(self.root.join(locator)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AttachmentError::NotFound(locator.to_owned()))
            }
            Err(e) => Err(AttachmentError::Io(e)),
        }
    }

    /// Best-effort removal of a stored file (send-rollback path).
    ///
    /// A missing file is treated as already removed; other failures are
    /// logged and swallowed — the caller has nothing useful to do with them.
    pub async fn remove(&self, locator: &str) {
        if validate_filename(locator).is_err() {
            return;
        }
        match fs::remove_file(self.root.join(locator)).await {
            Ok(()) => debug!(locator = %locator, "attachment removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(locator = %locator, error = %e, "attachment removal failed"),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
