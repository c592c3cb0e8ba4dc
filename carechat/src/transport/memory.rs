//! In-memory transport for testing.
//!
//! Simulates the consultation server with a shared in-process message
//! board. [`InMemoryServer`] is the test harness handle (peers post
//! through it, failures and latency are injected through it);
//! [`InMemoryTransport`] is the client endpoint handed to the engine.
//! Payloads round-trip through the JSON codec on every fetch so the wire
//! shape is exercised, not just the in-process types.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use carechat_proto::codec;
use carechat_proto::message::{AuthorId, AuthorRole, ConversationId, Message, MessageId, Timestamp};

use super::{TransportError, TransportPort};

/// Server-side state shared by all connected transports.
struct ServerState {
    /// Message board, one ordered list per conversation.
    conversations: HashMap<ConversationId, Vec<Message>>,
    /// Next server-assigned message id.
    next_id: u64,
    /// Scripted failures for upcoming fetches (front is consumed first).
    fetch_failures: VecDeque<Option<String>>,
    /// Scripted failures for upcoming sends.
    send_failures: VecDeque<Option<String>>,
    /// Artificial latency applied to every fetch.
    fetch_delay: Duration,
    /// Artificial latency applied to every send.
    send_delay: Duration,
    /// Total fetch calls observed.
    fetch_calls: u64,
    /// Total send calls observed.
    send_calls: u64,
    /// Fetches currently in flight.
    fetches_in_flight: u32,
    /// High-water mark of concurrent fetches.
    max_concurrent_fetches: u32,
}

impl ServerState {
    fn new() -> Self {
        Self {
            conversations: HashMap::new(),
            next_id: 1,
            fetch_failures: VecDeque::new(),
            send_failures: VecDeque::new(),
            fetch_delay: Duration::ZERO,
            send_delay: Duration::ZERO,
            fetch_calls: 0,
            send_calls: 0,
            fetches_in_flight: 0,
            max_concurrent_fetches: 0,
        }
    }

    fn assign_id(&mut self) -> MessageId {
        let id = MessageId::server(self.next_id.to_string());
        self.next_id += 1;
        id
    }
}

/// Test harness handle to the simulated consultation server.
pub struct InMemoryServer {
    inner: Arc<Mutex<ServerState>>,
}

impl InMemoryServer {
    /// Creates an empty server.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ServerState::new())),
        }
    }

    /// Creates a client endpoint authenticated as the given author.
    #[must_use]
    pub fn connect(&self, author_id: AuthorId, author_role: AuthorRole) -> InMemoryTransport {
        InMemoryTransport {
            inner: Arc::clone(&self.inner),
            author_id,
            author_role,
        }
    }

    /// Posts a message on behalf of another participant, stamped `now`.
    pub fn push_message(
        &self,
        conversation: &ConversationId,
        author_id: AuthorId,
        author_role: AuthorRole,
        content: &str,
    ) -> Message {
        self.push_message_at(conversation, author_id, author_role, content, Timestamp::now())
    }

    /// Posts a message on behalf of another participant with an explicit
    /// creation time.
    pub fn push_message_at(
        &self,
        conversation: &ConversationId,
        author_id: AuthorId,
        author_role: AuthorRole,
        content: &str,
        at: Timestamp,
    ) -> Message {
        let mut state = self.inner.lock();
        let message = Message {
            id: state.assign_id(),
            content: content.to_string(),
            author_id,
            author_role,
            created_at: at,
            status: carechat_proto::message::MessageStatus::Confirmed,
        };
        state
            .conversations
            .entry(conversation.clone())
            .or_default()
            .push(message.clone());
        message
    }

    /// Scripts the next fetch to fail with an optional server detail.
    pub fn fail_next_fetch(&self, detail: Option<&str>) {
        self.inner
            .lock()
            .fetch_failures
            .push_back(detail.map(ToOwned::to_owned));
    }

    /// Scripts the next send to fail with an optional server detail.
    pub fn fail_next_send(&self, detail: Option<&str>) {
        self.inner
            .lock()
            .send_failures
            .push_back(detail.map(ToOwned::to_owned));
    }

    /// Applies an artificial delay to every subsequent fetch.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.inner.lock().fetch_delay = delay;
    }

    /// Applies an artificial delay to every subsequent send.
    pub fn set_send_delay(&self, delay: Duration) {
        self.inner.lock().send_delay = delay;
    }

    /// Forces the next server-assigned message id.
    pub fn set_next_id(&self, id: u64) {
        self.inner.lock().next_id = id;
    }

    /// Number of fetch calls the server has seen.
    #[must_use]
    pub fn fetch_calls(&self) -> u64 {
        self.inner.lock().fetch_calls
    }

    /// Number of send calls the server has seen.
    #[must_use]
    pub fn send_calls(&self) -> u64 {
        self.inner.lock().send_calls
    }

    /// Highest number of fetches that were ever in flight at once.
    #[must_use]
    pub fn max_concurrent_fetches(&self) -> u32 {
        self.inner.lock().max_concurrent_fetches
    }

    /// Server-side view of a conversation's messages.
    #[must_use]
    pub fn messages(&self, conversation: &ConversationId) -> Vec<Message> {
        self.inner
            .lock()
            .conversations
            .get(conversation)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Client endpoint of the in-memory server.
pub struct InMemoryTransport {
    inner: Arc<Mutex<ServerState>>,
    /// Identity the simulated server attributes sends to.
    author_id: AuthorId,
    author_role: AuthorRole,
}

impl TransportPort for InMemoryTransport {
    async fn fetch_messages(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, TransportError> {
        let (delay, scripted_failure) = {
            let mut state = self.inner.lock();
            state.fetch_calls += 1;
            state.fetches_in_flight += 1;
            state.max_concurrent_fetches =
                state.max_concurrent_fetches.max(state.fetches_in_flight);
            (state.fetch_delay, state.fetch_failures.pop_front())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.inner.lock();
        state.fetches_in_flight -= 1;

        if let Some(detail) = scripted_failure {
            return Err(TransportError::Server { detail });
        }

        let messages = state
            .conversations
            .get(conversation)
            .cloned()
            .unwrap_or_default();
        drop(state);

        // Round-trip through the JSON codec so tests exercise the real
        // wire shape, not just in-process clones.
        let json = codec::encode_list(&messages).map_err(|e| TransportError::Server {
            detail: Some(e.to_string()),
        })?;
        codec::decode_list(&json).map_err(|e| TransportError::Server {
            detail: Some(e.to_string()),
        })
    }

    async fn send_message(
        &self,
        conversation: &ConversationId,
        content: &str,
    ) -> Result<Message, TransportError> {
        let (delay, scripted_failure) = {
            let mut state = self.inner.lock();
            state.send_calls += 1;
            (state.send_delay, state.send_failures.pop_front())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(detail) = scripted_failure {
            return Err(TransportError::Server { detail });
        }

        let mut state = self.inner.lock();
        let message = Message {
            id: state.assign_id(),
            content: content.to_string(),
            author_id: self.author_id.clone(),
            author_role: self.author_role,
            created_at: Timestamp::now(),
            status: carechat_proto::message::MessageStatus::Confirmed,
        };
        state
            .conversations
            .entry(conversation.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }
}
