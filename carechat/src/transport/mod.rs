//! Transport abstraction for the consultation API.
//!
//! Defines the [`TransportPort`] capability the engine polls and sends
//! through. The engine is transport-agnostic: it only needs a
//! `fetch-messages` / `send-message` pair over whatever JSON-over-HTTP
//! shape the host application implements. Concrete implementations here:
//! - [`memory::InMemoryTransport`] — in-process transport for testing,
//!   with failure and latency injection.

pub mod memory;

use carechat_proto::message::{ConversationId, Message};

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The operation timed out before completing.
    #[error("transport operation timed out")]
    Timeout,

    /// The connection to the server has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server rejected or failed the request.
    #[error("server error")]
    Server {
        /// Human-readable detail, surfaced verbatim to the user on
        /// manual actions when present.
        detail: Option<String>,
    },

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Server-provided human-readable detail, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Server { detail } => detail.as_deref(),
            _ => None,
        }
    }

    /// The text shown to the user: the server detail when available,
    /// otherwise the generic error description.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.detail()
            .map_or_else(|| self.to_string(), ToOwned::to_owned)
    }
}

/// Async capability for reading and writing conversation messages.
///
/// Implementations carry the full authoritative message list on every
/// fetch — the engine reconciles rather than appending. Calls are expected
/// to be bounded: the scheduler additionally wraps them in a timeout.
pub trait TransportPort: Send + Sync {
    /// Fetches the authoritative, ordered message list of a conversation.
    fn fetch_messages(
        &self,
        conversation: &ConversationId,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, TransportError>> + Send;

    /// Sends a message and returns the server's confirmed copy
    /// (server id, server timestamp).
    fn send_message(
        &self,
        conversation: &ConversationId,
        content: &str,
    ) -> impl std::future::Future<Output = Result<Message, TransportError>> + Send;
}
