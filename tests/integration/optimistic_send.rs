//! Integration tests for the optimistic send path.
//!
//! Verifies:
//! 1. A sent message is visible as `Pending` before the transport resolves.
//! 2. Confirmation adopts the server id and leaves exactly one message.
//! 3. A failed send rolls back, restores the draft, and surfaces an error.
//! 4. Offline sends fail immediately without touching the transport.
//! 5. Validation failures are synchronous and insert nothing.
//! 6. Only one send may be in flight per conversation.

use std::time::Duration;

use tokio::sync::mpsc;

use carechat::config::SyncConfig;
use carechat::connectivity::{self, Connectivity, ConnectivityPublisher};
use carechat::notify::{ChannelBridge, Notification};
use carechat::session::{ConversationSession, SendError, open_conversation};
use carechat::transport::memory::{InMemoryServer, InMemoryTransport};
use carechat_proto::message::{AuthorId, AuthorRole, ConversationId, MessageId, MessageStatus};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fast_config() -> SyncConfig {
    SyncConfig {
        poll_interval: Duration::from_millis(25),
        typing_idle: Duration::from_millis(100),
        request_timeout: Duration::from_millis(500),
        notification_buffer: 32,
    }
}

/// Opens a patient session against a fresh in-memory server.
fn open_patient_session(
    server: &InMemoryServer,
    config: SyncConfig,
) -> (
    ConversationSession<InMemoryTransport, ChannelBridge>,
    mpsc::Receiver<Notification>,
    ConnectivityPublisher,
) {
    let transport = server.connect(AuthorId::new("patient-1"), AuthorRole::Patient);
    let (bridge, notifications) = ChannelBridge::new(config.notification_buffer);
    let (publisher, monitor) = connectivity::channel(Connectivity::default());

    let session = open_conversation(
        ConversationId::new("consult-1"),
        AuthorId::new("patient-1"),
        AuthorRole::Patient,
        transport,
        bridge,
        monitor,
        config,
    );

    (session, notifications, publisher)
}

/// Polls `check` until it returns true or `timeout` elapses.
async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

// ---------------------------------------------------------------------------
// Optimistic visibility and confirmation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pending_message_is_visible_before_transport_resolves() {
    let server = InMemoryServer::new();
    server.set_send_delay(Duration::from_millis(200));
    let (session, _notifications, _publisher) = open_patient_session(&server, fast_config());

    let pending = session.send("Bonjour docteur").unwrap();

    // Synchronously present, before the (delayed) transport call resolves.
    let snapshot = session.snapshot();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].id, pending.id);
    assert_eq!(snapshot.messages[0].status, MessageStatus::Pending);
    assert!(pending.id.is_local());
}

#[tokio::test]
async fn confirmed_send_adopts_server_id() {
    let server = InMemoryServer::new();
    server.set_next_id(42);
    let (session, _notifications, _publisher) = open_patient_session(&server, fast_config());

    session.send("Bonjour").unwrap();

    let converged = wait_until(Duration::from_secs(2), || {
        let snapshot = session.snapshot();
        snapshot.messages.len() == 1
            && snapshot.messages[0].id == MessageId::server("42")
            && snapshot.messages[0].status == MessageStatus::Confirmed
    })
    .await;
    assert!(converged, "send was never confirmed with the server id");

    let snapshot = session.snapshot();
    assert_eq!(snapshot.messages[0].content, "Bonjour");
}

#[tokio::test]
async fn confirmed_send_emits_success_notification() {
    let server = InMemoryServer::new();
    let (session, mut notifications, _publisher) = open_patient_session(&server, fast_config());

    session.send("Bonjour").unwrap();

    let notified = wait_until(Duration::from_secs(2), || {
        matches!(notifications.try_recv(), Ok(Notification::Success { .. }))
    })
    .await;
    assert!(notified, "no success notification after confirmed send");
}

// ---------------------------------------------------------------------------
// Rollback on failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_send_rolls_back_and_restores_draft() {
    let server = InMemoryServer::new();
    server.fail_next_send(Some("session expirée"));
    let (session, mut notifications, _publisher) = open_patient_session(&server, fast_config());

    let before = session.snapshot().messages.len();
    session.send("mon message important").unwrap();

    let rolled_back = wait_until(Duration::from_secs(2), || {
        session.snapshot().messages.len() == before
    })
    .await;
    assert!(rolled_back, "pending message was not rolled back");

    // The user's text is recoverable for the input field.
    assert_eq!(
        session.take_restored_draft().as_deref(),
        Some("mon message important")
    );
    // Taking it twice yields nothing.
    assert_eq!(session.take_restored_draft(), None);

    // The server detail is surfaced verbatim.
    let error = wait_until(Duration::from_secs(1), || {
        matches!(
            notifications.try_recv(),
            Ok(Notification::Error { message, .. }) if message == "session expirée"
        )
    })
    .await;
    assert!(error, "no error notification with server detail");
}

#[tokio::test]
async fn failed_send_allows_retrying() {
    let server = InMemoryServer::new();
    server.fail_next_send(None);
    let (session, _notifications, _publisher) = open_patient_session(&server, fast_config());

    session.send("premier essai").unwrap();

    let rolled_back = wait_until(Duration::from_secs(2), || {
        session.snapshot().messages.is_empty() && session.take_restored_draft().is_some()
    })
    .await;
    assert!(rolled_back);

    // The guard is released; the retry goes through.
    session.send("deuxième essai").unwrap();
    let confirmed = wait_until(Duration::from_secs(2), || {
        let snapshot = session.snapshot();
        snapshot.messages.len() == 1 && snapshot.messages[0].status == MessageStatus::Confirmed
    })
    .await;
    assert!(confirmed);
}

// ---------------------------------------------------------------------------
// Synchronous failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_send_fails_without_transport_call() {
    let server = InMemoryServer::new();
    let (session, _notifications, publisher) = open_patient_session(&server, fast_config());

    publisher.set_online(false);

    let result = session.send("test");
    assert!(matches!(result, Err(SendError::Offline)));
    assert_eq!(server.send_calls(), 0);
    assert!(session.snapshot().messages.is_empty());
}

#[tokio::test]
async fn empty_input_is_rejected_synchronously() {
    let server = InMemoryServer::new();
    let (session, _notifications, _publisher) = open_patient_session(&server, fast_config());

    let result = session.send("   \n  ");
    assert!(matches!(result, Err(SendError::Validation(_))));
    assert_eq!(server.send_calls(), 0);
    assert!(session.snapshot().messages.is_empty());
}

#[tokio::test]
async fn oversized_input_is_rejected_synchronously() {
    let server = InMemoryServer::new();
    let (session, _notifications, _publisher) = open_patient_session(&server, fast_config());

    let text = "a".repeat(2001);
    let result = session.send(&text);
    assert!(matches!(result, Err(SendError::Validation(_))));
    assert!(session.snapshot().messages.is_empty());
}

#[tokio::test]
async fn second_send_while_first_in_flight_is_refused() {
    let server = InMemoryServer::new();
    server.set_send_delay(Duration::from_millis(200));
    let (session, _notifications, _publisher) = open_patient_session(&server, fast_config());

    session.send("premier").unwrap();
    let result = session.send("deuxième");
    assert!(matches!(result, Err(SendError::SendInFlight)));

    // After the first resolves, sending works again.
    let released = wait_until(Duration::from_secs(2), || session.send("troisième").is_ok()).await;
    assert!(released, "send guard never released");
}

#[tokio::test]
async fn send_after_close_is_refused() {
    let server = InMemoryServer::new();
    let (session, _notifications, _publisher) = open_patient_session(&server, fast_config());

    session.close();
    let result = session.send("trop tard");
    assert!(matches!(result, Err(SendError::Closed)));
}
