//! Optimistic message store for a single conversation.
//!
//! Owns the canonical in-memory ordered message list, the pending/confirmed
//! lifecycle of optimistic sends, the `last_seen_at` read watermark, and the
//! reconciliation logic that merges authoritative server snapshots into
//! local state without losing in-flight sends.
//!
//! Every mutation here is synchronous and I/O-free; network calls happen in
//! the session and scheduler layers, which call back into the store with
//! their results.

use std::collections::HashSet;

use carechat_proto::message::{
    AuthorId, AuthorRole, Message, MessageId, MessageStatus, Timestamp, ValidationError,
    validate_content,
};

/// Outcome of merging a fetched server snapshot into local state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Messages that were not known locally before this reconcile and were
    /// authored by someone other than the local user.
    ///
    /// Computed as an id set difference against the pre-reconcile list, not
    /// as a length delta: a length comparison miscounts whenever a pending
    /// send inflates the before count or the server dropped a message in
    /// the same interval.
    pub new_from_others: Vec<Message>,
}

impl ReconcileOutcome {
    /// Number of newly-arrived messages from other participants.
    #[must_use]
    pub const fn new_count(&self) -> usize {
        self.new_from_others.len()
    }
}

/// Canonical in-memory state of one conversation's messages.
///
/// Invariants maintained by every mutation:
/// - `messages` is stably sorted by `created_at` (equal timestamps keep
///   insertion order);
/// - no two messages share an id;
/// - a `Pending` message is only ever retired by [`confirm_send`] or
///   [`fail_send`] — a poll-driven [`reconcile`] keeps it alive.
///
/// [`confirm_send`]: OptimisticMessageStore::confirm_send
/// [`fail_send`]: OptimisticMessageStore::fail_send
/// [`reconcile`]: OptimisticMessageStore::reconcile
pub struct OptimisticMessageStore {
    /// The local user, used to classify messages as own vs. others'.
    self_id: AuthorId,
    /// Role the local user writes messages as.
    self_role: AuthorRole,
    /// Ordered message list.
    messages: Vec<Message>,
    /// Read watermark for unread counting.
    last_seen_at: Timestamp,
}

impl OptimisticMessageStore {
    /// Creates an empty store for the given local author.
    #[must_use]
    pub const fn new(self_id: AuthorId, self_role: AuthorRole) -> Self {
        Self {
            self_id,
            self_role,
            messages: Vec::new(),
            last_seen_at: Timestamp::from_millis(0),
        }
    }

    /// Returns the current ordered message list.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the local author id.
    #[must_use]
    pub const fn self_id(&self) -> &AuthorId {
        &self.self_id
    }

    /// Returns the read watermark.
    #[must_use]
    pub const fn last_seen_at(&self) -> Timestamp {
        self.last_seen_at
    }

    /// Advances the read watermark to `now`.
    pub const fn mark_read(&mut self, now: Timestamp) {
        self.last_seen_at = now;
    }

    /// Validates `text` and synchronously inserts a `Pending` message with
    /// a fresh temporary id, returning it so the caller can render it
    /// before any network round trip.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the trimmed text is empty or longer
    /// than the maximum content length; nothing is inserted in that case.
    pub fn append_pending(
        &mut self,
        text: &str,
        now: Timestamp,
    ) -> Result<Message, ValidationError> {
        let content = validate_content(text)?;
        let message = Message::pending(content, self.self_id.clone(), self.self_role, now);
        self.messages.push(message.clone());
        self.sort();
        Ok(message)
    }

    /// Retires the `Pending` message with id `temp_id`, replacing it with
    /// the server-returned message (server id, server timestamp,
    /// `Confirmed`).
    ///
    /// If `temp_id` is no longer present (the conversation was reset in the
    /// meantime) the server message is inserted anyway — a confirmed send
    /// is never silently dropped. If a poll already fetched the server copy,
    /// that copy is updated in place so no id is ever duplicated.
    pub fn confirm_send(&mut self, temp_id: &MessageId, server_message: Message) -> Message {
        let mut confirmed = server_message;
        confirmed.status = MessageStatus::Confirmed;

        if let Some(pos) = self.messages.iter().position(|m| m.id == *temp_id) {
            self.messages.remove(pos);
        } else {
            tracing::debug!(
                temp_id = %temp_id,
                server_id = %confirmed.id,
                "pending message gone before confirmation, appending server copy"
            );
        }

        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == confirmed.id) {
            *existing = confirmed.clone();
        } else {
            self.messages.push(confirmed.clone());
        }
        self.sort();
        confirmed
    }

    /// Removes the `Pending` message with id `temp_id` and returns its
    /// content so the caller can restore the user's draft.
    ///
    /// Returns `None` if no such pending message exists (already confirmed
    /// or the conversation was reset).
    pub fn fail_send(&mut self, temp_id: &MessageId) -> Option<String> {
        let pos = self
            .messages
            .iter()
            .position(|m| m.id == *temp_id && m.status == MessageStatus::Pending)?;
        Some(self.messages.remove(pos).content)
    }

    /// Merges a freshly fetched authoritative message list into local state.
    ///
    /// The new canonical list is the remote list (all `Confirmed`) plus any
    /// still-pending local sends, which the server cannot know about yet;
    /// pending entries keep their original relative order. Confirmed local
    /// entries the server no longer returns are dropped — the server list
    /// is authoritative for everything it has ever confirmed.
    ///
    /// The swap is atomic from a reader's point of view: callers observe
    /// either the pre- or post-reconcile list, never a partial merge.
    pub fn reconcile(&mut self, remote: Vec<Message>) -> ReconcileOutcome {
        let known: HashSet<String> = self
            .messages
            .iter()
            .map(|m| m.id.as_str().to_owned())
            .collect();

        let mut next: Vec<Message> = remote
            .into_iter()
            .map(|mut m| {
                m.status = MessageStatus::Confirmed;
                m
            })
            .collect();

        let new_from_others: Vec<Message> = next
            .iter()
            .filter(|m| !known.contains(m.id.as_str()) && m.author_id != self.self_id)
            .cloned()
            .collect();

        let pending: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.status == MessageStatus::Pending)
            .cloned()
            .collect();
        next.extend(pending);

        self.messages = next;
        self.sort();

        ReconcileOutcome { new_from_others }
    }

    /// Stable sort by creation time; equal timestamps keep insertion order.
    fn sort(&mut self) {
        self.messages.sort_by_key(|m| m.created_at);
    }
}
