//! Integration tests for connectivity-aware scheduling.
//!
//! Verifies:
//! 1. Polls are skipped while offline or backgrounded.
//! 2. Coming back online (or to the foreground) refreshes immediately,
//!    without waiting for the next tick.
//! 3. Regaining one axis while the other is still down does not fetch.

use std::time::Duration;

use tokio::sync::mpsc;

use carechat::config::SyncConfig;
use carechat::connectivity::{self, Connectivity, ConnectivityPublisher};
use carechat::notify::{ChannelBridge, Notification};
use carechat::session::{ConversationSession, open_conversation};
use carechat::transport::memory::{InMemoryServer, InMemoryTransport};
use carechat_proto::message::{AuthorId, AuthorRole, ConversationId};

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

/// Poll interval far beyond the test duration: any fetch beyond the first
/// tick must come from a connectivity transition or a manual refresh.
fn slow_poll_config() -> SyncConfig {
    SyncConfig {
        poll_interval: Duration::from_secs(3600),
        ..fast_config()
    }
}

fn conversation() -> ConversationId {
    ConversationId::new("consult-1")
}

fn open_with_connectivity(
    server: &InMemoryServer,
    config: SyncConfig,
    initial: Connectivity,
) -> (
    ConversationSession<InMemoryTransport, ChannelBridge>,
    mpsc::Receiver<Notification>,
    ConnectivityPublisher,
) {
    let transport = server.connect(AuthorId::new("patient-1"), AuthorRole::Patient);
    let (bridge, notifications) = ChannelBridge::new(config.notification_buffer);
    let (publisher, monitor) = connectivity::channel(initial);

    let session = open_conversation(
        conversation(),
        AuthorId::new("patient-1"),
        AuthorRole::Patient,
        transport,
        bridge,
        monitor,
        config,
    );

    (session, notifications, publisher)
}

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
// Gating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_polls_never_reach_the_transport() {
    let server = InMemoryServer::new();
    let offline = Connectivity {
        online: false,
        foreground: true,
    };
    let (_session, _notifications, _publisher) =
        open_with_connectivity(&server, fast_config(), offline);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.fetch_calls(), 0);
}

#[tokio::test]
async fn backgrounded_polls_never_reach_the_transport() {
    let server = InMemoryServer::new();
    let backgrounded = Connectivity {
        online: true,
        foreground: false,
    };
    let (_session, _notifications, _publisher) =
        open_with_connectivity(&server, fast_config(), backgrounded);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.fetch_calls(), 0);
}

#[tokio::test]
async fn going_to_background_pauses_polling() {
    let server = InMemoryServer::new();
    let (session, _notifications, publisher) =
        open_with_connectivity(&server, fast_config(), Connectivity::default());

    assert!(wait_until(Duration::from_secs(1), || server.fetch_calls() >= 2).await);

    publisher.set_foreground(false);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let calls_when_paused = server.fetch_calls();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(server.fetch_calls(), calls_when_paused);
    drop(session);
}

// ---------------------------------------------------------------------------
// Immediate refresh on regain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn coming_back_online_refreshes_immediately() {
    let server = InMemoryServer::new();
    server.push_message(
        &conversation(),
        AuthorId::new("medecin-1"),
        AuthorRole::Medecin,
        "Pendant la coupure",
    );
    let offline = Connectivity {
        online: false,
        foreground: true,
    };
    // One-hour poll interval: only the regain refresh can fetch this.
    let (session, _notifications, publisher) =
        open_with_connectivity(&server, slow_poll_config(), offline);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.fetch_calls(), 0);

    publisher.set_online(true);

    let fetched = wait_until(Duration::from_secs(2), || {
        session.snapshot().messages.len() == 1
    })
    .await;
    assert!(fetched, "no immediate fetch after coming back online");
}

#[tokio::test]
async fn returning_to_foreground_refreshes_immediately() {
    let server = InMemoryServer::new();
    let (session, _notifications, publisher) =
        open_with_connectivity(&server, slow_poll_config(), Connectivity::default());

    // Initial tick fires while active.
    assert!(wait_until(Duration::from_secs(1), || server.fetch_calls() >= 1).await);

    publisher.set_foreground(false);
    tokio::time::sleep(Duration::from_millis(30)).await;
    server.push_message(
        &conversation(),
        AuthorId::new("medecin-1"),
        AuthorRole::Medecin,
        "Pendant l'absence",
    );

    publisher.set_foreground(true);

    let fetched = wait_until(Duration::from_secs(2), || {
        session
            .snapshot()
            .messages
            .iter()
            .any(|m| m.content == "Pendant l'absence")
    })
    .await;
    assert!(fetched, "no immediate fetch after returning to foreground");
}

#[tokio::test]
async fn regaining_online_while_backgrounded_does_not_fetch() {
    let server = InMemoryServer::new();
    let down = Connectivity {
        online: false,
        foreground: false,
    };
    let (session, _notifications, publisher) =
        open_with_connectivity(&server, slow_poll_config(), down);

    publisher.set_online(true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.fetch_calls(), 0);

    // Once the view is visible again, the refresh happens.
    publisher.set_foreground(true);
    assert!(wait_until(Duration::from_secs(2), || server.fetch_calls() >= 1).await);
    drop(session);
}
