//! Notification bridge between the engine and the host UI's toast layer.
//!
//! The engine never renders anything; it reports noteworthy outcomes
//! (send success, send failure, manual refresh failure, new messages)
//! through a [`NotificationBridge`] and lets the host decide how to show
//! them.

use tokio::sync::mpsc;

/// Severity-tagged notification payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Informational event, e.g. "3 new messages".
    Info {
        /// Short heading.
        title: String,
        /// Body text.
        message: String,
    },
    /// Failure the user should see, e.g. a rejected send.
    Error {
        /// Short heading.
        title: String,
        /// Body text, server detail verbatim when available.
        message: String,
    },
    /// Positive confirmation, e.g. message sent.
    Success {
        /// Short heading.
        title: String,
        /// Body text.
        message: String,
    },
}

/// Sink for user-facing notifications.
///
/// Implementations must not block: they are called from async tasks and
/// from synchronous session methods alike.
pub trait NotificationBridge: Send + Sync + 'static {
    /// Informational toast.
    fn on_info(&self, title: &str, message: &str);
    /// Error toast.
    fn on_error(&self, title: &str, message: &str);
    /// Success toast.
    fn on_success(&self, title: &str, message: &str);
}

/// Bridge that forwards notifications over an mpsc channel.
///
/// Emission is best-effort: when the consumer falls behind and the channel
/// fills up, the notification is dropped rather than blocking the engine.
pub struct ChannelBridge {
    tx: mpsc::Sender<Notification>,
}

impl ChannelBridge {
    /// Creates a bridge and the receiver the host UI should drain.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl NotificationBridge for ChannelBridge {
    fn on_info(&self, title: &str, message: &str) {
        let _ = self.tx.try_send(Notification::Info {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn on_error(&self, title: &str, message: &str) {
        let _ = self.tx.try_send(Notification::Error {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn on_success(&self, title: &str, message: &str) {
        let _ = self.tx.try_send(Notification::Success {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}

/// Bridge that discards everything, for tests and headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBridge;

impl NotificationBridge for NullBridge {
    fn on_info(&self, _title: &str, _message: &str) {}
    fn on_error(&self, _title: &str, _message: &str) {}
    fn on_success(&self, _title: &str, _message: &str) {}
}
