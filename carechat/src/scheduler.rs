//! Poll scheduling for silent background refreshes.
//!
//! Each open conversation owns exactly one poll task, spawned by
//! [`SyncScheduler::spawn`] and cancelled when the session closes. The
//! task multiplexes three wake-up sources:
//!
//! 1. the repeating poll tick (silent refresh, gated on connectivity);
//! 2. connectivity transitions (coming back online or to the foreground
//!    refreshes immediately instead of waiting for the next tick);
//! 3. manual refresh requests from the session handle.
//!
//! All three funnel into the same fetch path, so the single-flight rule
//! holds by construction: the loop awaits each fetch before picking the
//! next wake-up, and a tick that would have fired mid-fetch is skipped,
//! not queued.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use carechat_proto::message::Message;

use crate::connectivity::ConnectivityMonitor;
use crate::notify::NotificationBridge;
use crate::session::SessionCore;
use crate::transport::{TransportError, TransportPort};

/// What initiated a fetch, which decides how its failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchTrigger {
    /// Background tick or connectivity-regain refresh: failures are
    /// swallowed (logged only) so transient blips stay quiet.
    Silent,
    /// User-requested refresh: failures surface through the bridge.
    Manual,
}

/// Handle to a conversation's poll task.
pub(crate) struct SyncScheduler {
    refresh_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawns the poll loop for `core`. The first tick fires immediately,
    /// so opening a conversation triggers an initial fetch.
    pub(crate) fn spawn<T, B>(core: Arc<SessionCore<T, B>>, monitor: ConnectivityMonitor) -> Self
    where
        T: TransportPort + 'static,
        B: NotificationBridge,
    {
        let (refresh_tx, refresh_rx) = mpsc::channel(4);
        let task = tokio::spawn(poll_loop(core, monitor, refresh_rx));
        Self { refresh_tx, task }
    }

    /// Queues a manual refresh. When a refresh is already queued the
    /// request collapses into it.
    pub(crate) fn request_refresh(&self) {
        if self.refresh_tx.try_send(()).is_err() {
            tracing::trace!("manual refresh already queued");
        }
    }

    /// Cancels the poll task. An in-flight fetch is dropped at its await
    /// point; its result is never applied.
    pub(crate) fn stop(&self) {
        self.task.abort();
    }
}

/// The per-conversation poll loop.
async fn poll_loop<T, B>(
    core: Arc<SessionCore<T, B>>,
    mut monitor: ConnectivityMonitor,
    mut refresh_rx: mpsc::Receiver<()>,
) where
    T: TransportPort + 'static,
    B: NotificationBridge,
{
    let mut interval = tokio::time::interval(core.config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_connectivity = monitor.current();
    let mut watch_connectivity = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if monitor.current().is_active() {
                    core.run_fetch(FetchTrigger::Silent).await;
                } else {
                    tracing::trace!(
                        conversation = %core.conversation_id,
                        "skipping poll tick while offline or backgrounded"
                    );
                }
            }
            changed = monitor.changed(), if watch_connectivity => {
                match changed {
                    Some(current) => {
                        let regained = (current.online && !last_connectivity.online)
                            || (current.foreground && !last_connectivity.foreground);
                        last_connectivity = current;
                        if regained && current.is_active() {
                            tracing::debug!(
                                conversation = %core.conversation_id,
                                "connectivity regained, refreshing immediately"
                            );
                            core.run_fetch(FetchTrigger::Silent).await;
                        }
                    }
                    // Publisher gone: the last observed state stays in
                    // effect, stop selecting on this branch.
                    None => watch_connectivity = false,
                }
            }
            request = refresh_rx.recv() => {
                match request {
                    Some(()) => core.run_fetch(FetchTrigger::Manual).await,
                    // Session handle dropped without close(); exit cleanly.
                    None => break,
                }
            }
        }
    }

    tracing::debug!(conversation = %core.conversation_id, "poll loop stopped");
}

impl<T: TransportPort, B: NotificationBridge> SessionCore<T, B> {
    /// Runs one fetch through the transport and applies its result.
    ///
    /// Each fetch is stamped with a monotonically increasing sequence
    /// number before it is issued; application is refused for any result
    /// whose stamp is not newer than the last applied one, so a slow fetch
    /// can never overwrite state written by a faster successor.
    pub(crate) async fn run_fetch(&self, trigger: FetchTrigger) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        let seq = self.next_fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let result = match tokio::time::timeout(
            self.config.request_timeout,
            self.transport.fetch_messages(&self.conversation_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        self.apply_fetch(seq, trigger, result);
    }

    /// Applies a fetch result to the store, or discards it as stale.
    fn apply_fetch(
        &self,
        seq: u64,
        trigger: FetchTrigger,
        result: Result<Vec<Message>, TransportError>,
    ) {
        match result {
            Ok(remote) => {
                if !self.alive.load(Ordering::SeqCst) {
                    tracing::debug!(seq, "discarding fetch result: session closed");
                    return;
                }
                let outcome = {
                    let mut state = self.state.lock();
                    if seq <= state.last_applied_fetch_seq {
                        tracing::debug!(
                            seq,
                            last_applied = state.last_applied_fetch_seq,
                            "discarding stale fetch result"
                        );
                        return;
                    }
                    state.last_applied_fetch_seq = seq;
                    state.store.reconcile(remote)
                };

                let count = outcome.new_count();
                if count > 0 {
                    tracing::debug!(
                        conversation = %self.conversation_id,
                        count,
                        "new messages from other participants"
                    );
                    self.bridge
                        .on_info("Nouveaux messages", &new_message_body(count));
                }
            }
            Err(e) => match trigger {
                FetchTrigger::Silent => {
                    tracing::debug!(
                        conversation = %self.conversation_id,
                        error = %e,
                        "silent refresh failed, keeping last known state"
                    );
                }
                FetchTrigger::Manual => {
                    tracing::warn!(
                        conversation = %self.conversation_id,
                        error = %e,
                        "manual refresh failed"
                    );
                    self.bridge
                        .on_error("Actualisation échouée", &e.user_message());
                }
            },
        }
    }
}

/// Body text of the "new messages" notification.
fn new_message_body(count: usize) -> String {
    if count == 1 {
        "1 nouveau message".to_string()
    } else {
        format!("{count} nouveaux messages")
    }
}
