//! Conversation session: the handle a view holds while a conversation is
//! open.
//!
//! [`open_conversation`] wires the store, the typing signal, the
//! connectivity monitor and the poll scheduler together around an injected
//! [`TransportPort`] and [`NotificationBridge`], then hands back a
//! [`ConversationSession`]. All engine state lives behind the session's
//! shared core; closing (or dropping) the session cancels the poll task
//! and marks every in-flight transport call stale.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use carechat_proto::message::{
    AuthorId, AuthorRole, ConversationId, Message, MessageId, Timestamp, ValidationError,
};

use crate::config::SyncConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::notify::NotificationBridge;
use crate::scheduler::SyncScheduler;
use crate::store::OptimisticMessageStore;
use crate::transport::{TransportError, TransportPort};
use crate::typing::TypingSignal;
use crate::unread;

/// Errors reported synchronously by [`ConversationSession::send`].
///
/// Transport failures are not here: they happen after `send` has returned
/// and are reported through the [`NotificationBridge`], with the rolled-back
/// draft retrievable via [`ConversationSession::take_restored_draft`].
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The input text failed validation; nothing was inserted.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The device is offline; the transport was not attempted.
    #[error("cannot send while offline")]
    Offline,

    /// A previous send for this conversation has not resolved yet.
    #[error("a previous send is still in flight")]
    SendInFlight,

    /// The session has been closed.
    #[error("conversation session is closed")]
    Closed,
}

/// Mutable session state guarded by one lock.
pub(crate) struct SessionState {
    /// Canonical message list + read watermark.
    pub(crate) store: OptimisticMessageStore,
    /// Local typing debounce.
    pub(crate) typing: TypingSignal,
    /// Draft text recovered from the last failed send, until a UI takes it.
    pub(crate) restored_draft: Option<String>,
    /// Sequence number of the last fetch whose result was applied.
    pub(crate) last_applied_fetch_seq: u64,
}

/// State shared between the session handle, the poll loop, and send tasks.
pub(crate) struct SessionCore<T, B> {
    pub(crate) conversation_id: ConversationId,
    pub(crate) transport: T,
    pub(crate) bridge: B,
    pub(crate) monitor: ConnectivityMonitor,
    pub(crate) state: Mutex<SessionState>,
    /// Cleared by `close()`; checked before any async result is applied.
    pub(crate) alive: AtomicBool,
    /// Monotonic stamp issued to each fetch, ordering their application.
    pub(crate) next_fetch_seq: AtomicU64,
    /// Single-flight guard for the send path.
    pub(crate) send_in_flight: AtomicBool,
    pub(crate) config: SyncConfig,
}

impl<T: TransportPort, B: NotificationBridge> SessionCore<T, B> {
    /// Transport round trip for one optimistic send, then confirmation or
    /// rollback. Runs in its own task so `send` never blocks the caller.
    pub(crate) async fn run_send(&self, temp_id: MessageId, content: String) {
        let result = match tokio::time::timeout(
            self.config.request_timeout,
            self.transport.send_message(&self.conversation_id, &content),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        self.send_in_flight.store(false, Ordering::SeqCst);

        if !self.alive.load(Ordering::SeqCst) {
            tracing::debug!(
                conversation = %self.conversation_id,
                temp_id = %temp_id,
                "send resolved after close, ignoring"
            );
            return;
        }

        match result {
            Ok(server_message) => {
                let confirmed = {
                    let mut state = self.state.lock();
                    state.typing.clear();
                    state.store.confirm_send(&temp_id, server_message)
                };
                tracing::debug!(
                    conversation = %self.conversation_id,
                    message_id = %confirmed.id,
                    "send confirmed"
                );
                self.bridge
                    .on_success("Message envoyé", "Votre message a été transmis");
            }
            Err(e) => {
                let draft = {
                    let mut state = self.state.lock();
                    let draft = state.store.fail_send(&temp_id);
                    state.restored_draft.clone_from(&draft);
                    draft
                };
                tracing::warn!(
                    conversation = %self.conversation_id,
                    error = %e,
                    draft_restored = draft.is_some(),
                    "send failed, optimistic message rolled back"
                );
                self.bridge.on_error("Envoi échoué", &e.user_message());
            }
        }
    }
}

/// Read-only view of a conversation at one instant.
///
/// Taken atomically: the messages, unread count and typing flag all come
/// from the same locked state, never a partial merge.
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    /// The conversation this snapshot belongs to.
    pub conversation_id: ConversationId,
    /// Ordered message list, pending sends included.
    pub messages: Vec<Message>,
    /// Messages from others newer than the read watermark.
    pub unread_count: usize,
    /// Whether the local user currently counts as typing.
    pub is_typing: bool,
    /// Connectivity as last reported by the host.
    pub connectivity: Connectivity,
    /// Sequence number of the last applied fetch (diagnostics).
    pub last_applied_fetch_seq: u64,
}

/// Handle to one open conversation.
///
/// Owns the poll scheduler; dropping the handle (or calling
/// [`close`](Self::close)) cancels it. The handle is cheap to share
/// behind an `Arc` if a host needs to.
pub struct ConversationSession<T: TransportPort + 'static, B: NotificationBridge> {
    core: Arc<SessionCore<T, B>>,
    scheduler: SyncScheduler,
}

/// Opens a conversation and starts its silent refresh loop.
///
/// Opening counts as seeing the conversation: the read watermark starts at
/// `now`, and the first poll tick fires immediately. Must be called from
/// within a tokio runtime.
pub fn open_conversation<T, B>(
    conversation_id: ConversationId,
    self_id: AuthorId,
    self_role: AuthorRole,
    transport: T,
    bridge: B,
    monitor: ConnectivityMonitor,
    config: SyncConfig,
) -> ConversationSession<T, B>
where
    T: TransportPort + 'static,
    B: NotificationBridge,
{
    let mut store = OptimisticMessageStore::new(self_id, self_role);
    store.mark_read(Timestamp::now());
    let typing = TypingSignal::new(config.typing_idle);

    let core = Arc::new(SessionCore {
        conversation_id,
        transport,
        bridge,
        monitor: monitor.clone(),
        state: Mutex::new(SessionState {
            store,
            typing,
            restored_draft: None,
            last_applied_fetch_seq: 0,
        }),
        alive: AtomicBool::new(true),
        next_fetch_seq: AtomicU64::new(0),
        send_in_flight: AtomicBool::new(false),
        config,
    });

    let scheduler = SyncScheduler::spawn(Arc::clone(&core), monitor);
    tracing::debug!(conversation = %core.conversation_id, "conversation opened");

    ConversationSession { core, scheduler }
}

impl<T, B> ConversationSession<T, B>
where
    T: TransportPort + 'static,
    B: NotificationBridge,
{
    /// Takes an atomic read-only snapshot of the conversation state.
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        let now = Timestamp::now();
        let state = self.core.state.lock();
        ConversationSnapshot {
            conversation_id: self.core.conversation_id.clone(),
            messages: state.store.messages().to_vec(),
            unread_count: unread::unread_count(&state.store),
            is_typing: state.typing.is_typing(now),
            connectivity: self.core.monitor.current(),
            last_applied_fetch_seq: state.last_applied_fetch_seq,
        }
    }

    /// Optimistically sends `text`.
    ///
    /// On success the returned `Pending` message is already in the
    /// snapshot; the transport round trip continues in the background and
    /// resolves into a confirmation or a rollback (reported through the
    /// bridge, draft recoverable via
    /// [`take_restored_draft`](Self::take_restored_draft)).
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Validation`] for empty/oversized input,
    /// [`SendError::Offline`] when the device is offline (the transport is
    /// not attempted), [`SendError::SendInFlight`] while a previous send is
    /// unresolved, and [`SendError::Closed`] after `close()`.
    pub fn send(&self, text: &str) -> Result<Message, SendError> {
        if !self.core.alive.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        if !self.core.monitor.is_online() {
            return Err(SendError::Offline);
        }
        if self.core.send_in_flight.swap(true, Ordering::SeqCst) {
            return Err(SendError::SendInFlight);
        }

        let pending = {
            let mut state = self.core.state.lock();
            match state.store.append_pending(text, Timestamp::now()) {
                Ok(message) => message,
                Err(e) => {
                    self.core.send_in_flight.store(false, Ordering::SeqCst);
                    return Err(e.into());
                }
            }
        };

        let core = Arc::clone(&self.core);
        let temp_id = pending.id.clone();
        let content = pending.content.clone();
        tokio::spawn(async move {
            core.run_send(temp_id, content).await;
        });

        Ok(pending)
    }

    /// Requests a manual refresh. Failures are surfaced through the
    /// bridge, unlike silent poll failures.
    pub fn refresh(&self) {
        self.scheduler.request_refresh();
    }

    /// Advances the read watermark to now, zeroing the unread count.
    pub fn mark_read(&self) {
        self.core.state.lock().store.mark_read(Timestamp::now());
    }

    /// Feeds an input-field change into the typing signal. Empty input
    /// clears the signal immediately.
    pub fn on_input_change(&self, text: &str) {
        let mut state = self.core.state.lock();
        if text.trim().is_empty() {
            state.typing.clear();
        } else {
            state.typing.on_input(Timestamp::now());
        }
    }

    /// Takes the draft text recovered from the last failed send, if any.
    pub fn take_restored_draft(&self) -> Option<String> {
        self.core.state.lock().restored_draft.take()
    }

    /// Closes the session: cancels the poll loop and marks any in-flight
    /// transport call stale so its resolution is a no-op. Idempotent.
    pub fn close(&self) {
        if self.core.alive.swap(false, Ordering::SeqCst) {
            tracing::debug!(conversation = %self.core.conversation_id, "conversation closed");
        }
        self.scheduler.stop();
    }
}

impl<T, B> Drop for ConversationSession<T, B>
where
    T: TransportPort + 'static,
    B: NotificationBridge,
{
    fn drop(&mut self) {
        self.close();
    }
}
