#![allow(missing_docs)]

//! Staffdesk CLI — operator surface for the workplace portal core.
//!
//! One-shot subcommands over the shared SQLite database: provision the
//! schema, send messages (single or broadcast), read inboxes, and fetch
//! attachments. Stands in for the original portal's HTTP routes; access
//! control past the `--as` identity flag is the deployment's concern.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing::info;

use staffdesk::attachments::AttachmentStore;
use staffdesk::config::PortalConfig;
use staffdesk::directory::{self, RecipientSelector};
use staffdesk::gate::{self, Identity};
use staffdesk::ledger::{self, AttachmentUpload, MessageDraft};
use staffdesk::{db, inbox, logging};

#[derive(Parser)]
#[command(name = "staffdesk", about = "Workplace portal messaging core", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision the database schema and seed the bootstrap accounts.
    Init,
    /// Send a message to one user or to every employee.
    Send {
        /// Sender's user id.
        #[arg(long = "as")]
        sender: i64,
        /// Recipient: a user id, or "all" for the employee roster.
        #[arg(long)]
        to: String,
        /// Optional subject line.
        #[arg(long)]
        subject: Option<String>,
        /// Message body.
        #[arg(long)]
        body: String,
        /// Optional file to attach.
        #[arg(long)]
        attach: Option<PathBuf>,
    },
    /// List a user's inbox (marks it read) as JSON.
    Inbox {
        /// Inbox owner's user id.
        #[arg(long = "as")]
        user: i64,
    },
    /// Print a user's unread message count.
    Unread {
        /// Inbox owner's user id.
        #[arg(long = "as")]
        user: i64,
    },
    /// Fetch a received message's attachment to a local file.
    Fetch {
        /// Receiver's user id.
        #[arg(long = "as")]
        user: i64,
        /// Message id the attachment belongs to.
        #[arg(long)]
        message: i64,
        /// Output path; defaults to the original filename.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Reset a password given the matching email and employee code.
    ResetPassword {
        /// Account email.
        #[arg(long)]
        email: String,
        /// Employee code on record.
        #[arg(long)]
        code: String,
        /// New password.
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = PortalConfig::load().context("failed to load configuration")?;

    // File logging when a log directory is configured, console otherwise.
    let _guard = match config.logging.dir {
        Some(ref dir) => Some(logging::init_with_file(Path::new(dir), &config.logging.level)?),
        None => {
            logging::init_console(&config.logging.level);
            None
        }
    };

    let cli = Cli::parse();

    let pool = db::connect(Path::new(&config.database.path))
        .await
        .context("failed to open portal database")?;
    let store = AttachmentStore::open(config.attachments.root.clone())
        .await
        .context("failed to open attachment store")?;

    match cli.command {
        Command::Init => {
            db::provision(&pool).await?;
            let seeded = db::seed(&pool).await?;
            println!("schema ready, {seeded} account(s) seeded");
        }
        Command::Send {
            sender,
            to,
            subject,
            body,
            attach,
        } => {
            let identity = identify(&pool, sender).await?;
            let selector = parse_selector(&to)?;
            let attachment = match attach {
                Some(path) => Some(read_upload(&path).await?),
                None => None,
            };
            let receipt = ledger::send(
                &pool,
                &store,
                identity,
                selector,
                MessageDraft {
                    subject,
                    body,
                    attachment,
                },
            )
            .await?;
            println!("created {} message(s)", receipt.created_count);
        }
        Command::Inbox { user } => {
            let identity = identify(&pool, user).await?;
            let summaries = inbox::list(&pool, identity).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Command::Unread { user } => {
            let identity = identify(&pool, user).await?;
            let count = inbox::unread_count(&pool, identity).await?;
            println!("{count}");
        }
        Command::Fetch { user, message, out } => {
            let identity = identify(&pool, user).await?;
            let (filename, bytes) =
                ledger::open_attachment(&pool, &store, identity, message).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(&filename));
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("wrote {} ({} bytes)", out.display(), bytes.len());
        }
        Command::ResetPassword {
            email,
            code,
            password,
        } => {
            gate::reset_password(&pool, &email, &code, &password).await?;
            println!("password reset for {email}");
        }
    }

    Ok(())
}

/// Resolve a user id into the request-scoped identity the core expects.
///
/// The CLI trusts the operator; a network deployment would authenticate
/// through `gate::authenticate` instead.
async fn identify(pool: &SqlitePool, user_id: i64) -> Result<Identity> {
    let user = directory::get_user(pool, user_id)
        .await
        .with_context(|| format!("unknown user id {user_id}"))?;
    info!(user_id, role = user.role.as_str(), "acting as");
    Ok(Identity {
        user_id,
        role: user.role,
    })
}

/// Parse the `--to` argument: "all" or a numeric user id.
fn parse_selector(to: &str) -> Result<RecipientSelector> {
    if to.eq_ignore_ascii_case("all") {
        return Ok(RecipientSelector::AllEmployees);
    }
    let id: i64 = to
        .parse()
        .with_context(|| format!("--to must be a user id or \"all\", got {to:?}"))?;
    Ok(RecipientSelector::User(id))
}

/// Read a local file into an attachment upload.
async fn read_upload(path: &Path) -> Result<AttachmentUpload> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .with_context(|| format!("cannot derive a filename from {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(AttachmentUpload { filename, bytes })
}
