//! Unread counting against the `last_seen_at` watermark.

use carechat_proto::message::{AuthorId, Message, Timestamp};

use crate::store::OptimisticMessageStore;

/// Counts messages created after `last_seen_at` by authors other than
/// `self_id`.
///
/// This is a pure derivation — the count is never stored, only recomputed,
/// so it can never drift out of sync with the message list.
#[must_use]
pub fn recompute(messages: &[Message], last_seen_at: Timestamp, self_id: &AuthorId) -> usize {
    messages
        .iter()
        .filter(|m| m.created_at > last_seen_at && m.author_id != *self_id)
        .count()
}

/// Convenience wrapper deriving the unread count straight from a store.
#[must_use]
pub fn unread_count(store: &OptimisticMessageStore) -> usize {
    recompute(store.messages(), store.last_seen_at(), store.self_id())
}
