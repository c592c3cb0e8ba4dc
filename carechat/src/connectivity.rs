//! Connectivity signals: online/offline and foreground/background.
//!
//! The host environment (browser events, mobile lifecycle hooks, a desktop
//! network watcher) owns the real signals and feeds them into a
//! [`ConnectivityPublisher`]; the engine only ever consumes the paired
//! [`ConnectivityMonitor`]. Splitting the two halves keeps the engine free
//! of any platform event listener and makes a fake monitor one function
//! call away in tests.

use tokio::sync::watch;

/// Current connectivity state as seen by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    /// Whether the network is reachable.
    pub online: bool,
    /// Whether the conversation view is in the foreground (tab visible).
    pub foreground: bool,
}

impl Connectivity {
    /// Whether background polling should run at all.
    #[must_use]
    pub const fn is_active(self) -> bool {
        self.online && self.foreground
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self {
            online: true,
            foreground: true,
        }
    }
}

/// Creates a connected publisher/monitor pair starting from `initial`.
#[must_use]
pub fn channel(initial: Connectivity) -> (ConnectivityPublisher, ConnectivityMonitor) {
    let (tx, rx) = watch::channel(initial);
    (
        ConnectivityPublisher { tx },
        ConnectivityMonitor { rx },
    )
}

/// Host-side handle that pushes platform transitions into the engine.
#[derive(Debug)]
pub struct ConnectivityPublisher {
    tx: watch::Sender<Connectivity>,
}

impl ConnectivityPublisher {
    /// Updates the online flag, notifying subscribers on change.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.online != online;
            state.online = online;
            changed
        });
    }

    /// Updates the foreground flag, notifying subscribers on change.
    pub fn set_foreground(&self, foreground: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.foreground != foreground;
            state.foreground = foreground;
            changed
        });
    }

    /// Returns the state currently visible to subscribers.
    #[must_use]
    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }
}

/// Engine-side view of connectivity: pull accessors plus change
/// notification.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    rx: watch::Receiver<Connectivity>,
}

impl ConnectivityMonitor {
    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> Connectivity {
        *self.rx.borrow()
    }

    /// Whether the network is currently reachable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.rx.borrow().online
    }

    /// Whether the view is currently in the foreground.
    #[must_use]
    pub fn is_foreground(&self) -> bool {
        self.rx.borrow().foreground
    }

    /// Waits for the next state change and returns the new state.
    ///
    /// Returns `None` once the publisher has been dropped — the last
    /// observed state then stays in effect forever.
    pub async fn changed(&mut self) -> Option<Connectivity> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
