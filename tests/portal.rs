#![allow(missing_docs)]
// End-to-end tests for the portal core: directory -> ledger -> inbox ->
// attachment store, against a shared in-memory database and a temporary
// storage root.

use sqlx::SqlitePool;

use staffdesk::attachments::AttachmentStore;
use staffdesk::db;
use staffdesk::directory::{RecipientSelector, Role};
use staffdesk::gate::{self, Dashboard, Identity};
use staffdesk::inbox;
use staffdesk::ledger::{self, AttachmentUpload, MessageDraft};

// ── Fixtures ──

const ADMIN: Identity = Identity {
    user_id: 1,
    role: Role::Admin,
};
const MAVIS: Identity = Identity {
    user_id: 2,
    role: Role::Employee,
};
const PETRA: Identity = Identity {
    user_id: 3,
    role: Role::Employee,
};

/// Provisioned database with admin (1), Mavis (2), and Petra (3).
async fn make_portal() -> (SqlitePool, tempfile::TempDir, AttachmentStore) {
    let pool = db::connect_in_memory().await.expect("connect");
    db::provision(&pool).await.expect("provision");
    db::seed(&pool).await.expect("seed");
    sqlx::query(
        "INSERT INTO users (employee_code, email, password, name, role) \
         VALUES ('EMP002', 'petra@maxelo.com', 'pw', 'Petra', 'employee')",
    )
    .execute(&pool)
    .await
    .expect("insert petra");

    let dir = tempfile::tempdir().expect("tempdir");
    let store = AttachmentStore::open(dir.path()).await.expect("open store");
    (pool, dir, store)
}

fn welcome() -> MessageDraft {
    MessageDraft {
        subject: Some("Welcome".to_owned()),
        body: "Hi".to_owned(),
        attachment: None,
    }
}

// ── Scenarios ──

#[tokio::test]
async fn admin_broadcast_reaches_every_employee_once() {
    let (pool, _dir, store) = make_portal().await;

    let receipt = ledger::send(
        &pool,
        &store,
        ADMIN,
        RecipientSelector::AllEmployees,
        welcome(),
    )
    .await
    .expect("broadcast");

    assert_eq!(receipt.created_count, 2);
    assert_eq!(inbox::unread_count(&pool, MAVIS).await.expect("mavis"), 1);
    assert_eq!(inbox::unread_count(&pool, PETRA).await.expect("petra"), 1);
    assert_eq!(inbox::unread_count(&pool, ADMIN).await.expect("admin"), 0);
}

#[tokio::test]
async fn listing_then_counting_observes_the_read_mark() {
    let (pool, _dir, store) = make_portal().await;
    for body in ["one", "two", "three"] {
        ledger::send(
            &pool,
            &store,
            ADMIN,
            RecipientSelector::User(2),
            MessageDraft {
                subject: None,
                body: body.to_owned(),
                attachment: None,
            },
        )
        .await
        .expect("send");
    }
    assert_eq!(inbox::unread_count(&pool, MAVIS).await.expect("count"), 3);

    let summaries = inbox::list(&pool, MAVIS).await.expect("list");
    assert_eq!(summaries.len(), 3);
    assert!(summaries.iter().all(|m| m.was_unread_at_fetch));

    // Read-after-write on the same store: the mark has taken effect.
    assert_eq!(inbox::unread_count(&pool, MAVIS).await.expect("count"), 0);
}

#[tokio::test]
async fn broadcast_attachment_is_shared_and_receiver_gated() {
    let (pool, _dir, store) = make_portal().await;

    ledger::send(
        &pool,
        &store,
        ADMIN,
        RecipientSelector::AllEmployees,
        MessageDraft {
            subject: Some("Handbook".to_owned()),
            body: "see attached".to_owned(),
            attachment: Some(AttachmentUpload {
                filename: "handbook.pdf".to_owned(),
                bytes: b"employee handbook".to_vec(),
            }),
        },
    )
    .await
    .expect("broadcast");

    let summaries = inbox::list(&pool, MAVIS).await.expect("list");
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].has_attachment);
    let message_id = summaries[0].id;

    // The receiver can open it; the bytes match the upload.
    let (filename, bytes) = ledger::open_attachment(&pool, &store, MAVIS, message_id)
        .await
        .expect("receiver fetch");
    assert_eq!(filename, "handbook.pdf");
    assert_eq!(bytes, b"employee handbook");

    // Petra received her own copy of the same physical file.
    let petra_inbox = inbox::list(&pool, PETRA).await.expect("petra list");
    assert_eq!(petra_inbox.len(), 1);
    let (_, petra_bytes) = ledger::open_attachment(&pool, &store, PETRA, petra_inbox[0].id)
        .await
        .expect("petra fetch");
    assert_eq!(petra_bytes, b"employee handbook");

    // Mavis cannot open Petra's copy: not the receiver.
    assert!(
        ledger::open_attachment(&pool, &store, MAVIS, petra_inbox[0].id)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn login_identity_flows_into_dashboard() {
    let (pool, _dir, store) = make_portal().await;
    ledger::send(
        &pool,
        &store,
        ADMIN,
        RecipientSelector::User(2),
        welcome(),
    )
    .await
    .expect("send");

    let identity = gate::authenticate(&pool, "mavis@maxelo.com", "123admin", Role::Employee)
        .await
        .expect("login");
    assert_eq!(identity, MAVIS);

    match gate::dashboard(&pool, identity).await.expect("dashboard") {
        Dashboard::Employee { unread } => assert_eq!(unread, 1),
        other => panic!("expected employee dashboard, got {other:?}"),
    }

    match gate::dashboard(&pool, ADMIN).await.expect("admin dashboard") {
        Dashboard::Admin { unread, employees } => {
            assert_eq!(unread, 0);
            assert_eq!(employees, 2);
        }
        other => panic!("expected admin dashboard, got {other:?}"),
    }
}

#[tokio::test]
async fn roster_snapshot_excludes_later_hires() {
    let (pool, _dir, store) = make_portal().await;

    let receipt = ledger::send(
        &pool,
        &store,
        ADMIN,
        RecipientSelector::AllEmployees,
        welcome(),
    )
    .await
    .expect("broadcast");
    assert_eq!(receipt.created_count, 2);

    // A hire after the send does not retroactively receive it.
    sqlx::query(
        "INSERT INTO users (employee_code, email, password, name, role) \
         VALUES ('EMP003', 'newhire@maxelo.com', 'pw', 'New Hire', 'employee')",
    )
    .execute(&pool)
    .await
    .expect("insert hire");
    let hire = Identity {
        user_id: 4,
        role: Role::Employee,
    };
    assert_eq!(inbox::unread_count(&pool, hire).await.expect("count"), 0);

    // The next broadcast picks them up.
    let receipt = ledger::send(
        &pool,
        &store,
        ADMIN,
        RecipientSelector::AllEmployees,
        welcome(),
    )
    .await
    .expect("second broadcast");
    assert_eq!(receipt.created_count, 3);
    assert_eq!(inbox::unread_count(&pool, hire).await.expect("count"), 1);
}
