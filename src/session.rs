//! Session lifecycle: connect, keep-alive deadline, reconciliation,
//! rate-limited reconnect.
//!
//! The controller owns all mutable session state. Each connection
//! attempt gets a fresh transport session and a new generation number;
//! reconciliation work issued under an older generation is discarded
//! before it can dispatch or acknowledge anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, info, warn};

use crate::api::MessageApi;
use crate::config::{Settings, UnknownFramePolicy};
use crate::notify::Dispatcher;
use crate::stream::{StreamEvent, StreamHandle, Transport};

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started or explicitly shut down.
    Idle,
    /// A connection attempt is underway.
    Connecting,
    /// Session open, events flowing.
    Open,
    /// Waiting out the reconnect delay.
    Reconnecting,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Transport closed or errored, or the connect itself failed.
    Closed,
    /// No traffic within the keep-alive window.
    Stale,
    /// Unrecognized frame under the reconnect policy.
    BadFrame,
}

/// Top-level orchestrator for one device stream.
pub struct SessionController {
    transport: Arc<dyn Transport>,
    api: Arc<dyn MessageApi>,
    dispatcher: Arc<Dispatcher>,
    keep_alive_timeout: Duration,
    unknown_frame_policy: UnknownFramePolicy,
    state: SessionState,
    generation: Arc<AtomicU64>,
}

impl SessionController {
    /// Wire the collaborators together.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        api: Arc<dyn MessageApi>,
        dispatcher: Arc<Dispatcher>,
        settings: &Settings,
    ) -> Self {
        Self {
            transport,
            api,
            dispatcher,
            keep_alive_timeout: settings.keep_alive_timeout,
            unknown_frame_policy: settings.unknown_frame_policy,
            state: SessionState::Idle,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run forever: connect, drive the session, wait out the backoff,
    /// connect again. Never gives up; `Idle` is only reachable through
    /// external shutdown of the whole process.
    pub async fn run(&mut self) {
        let reconcile_tx = self.spawn_reconciler();
        loop {
            let delay = self.run_once(&reconcile_tx).await;
            self.state = SessionState::Reconnecting;
            info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting after delay"
            );
            sleep(delay).await;
        }
    }

    /// One connect/drive cycle. Returns the delay to respect before
    /// the next attempt: reconnects are rate-limited to once per
    /// keep-alive window measured from this attempt's start.
    async fn run_once(&mut self, reconcile_tx: &mpsc::Sender<()>) -> Duration {
        self.state = SessionState::Connecting;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let connect_started = Instant::now();

        match self.transport.connect().await {
            Ok(handle) => {
                let end = self.drive_session(handle, reconcile_tx).await;
                debug!(?end, "Session ended");
            }
            Err(err) => {
                warn!(error = %err, "Failed to connect");
            }
        }

        reconnect_delay(self.keep_alive_timeout, connect_started.elapsed())
    }

    /// Consume events from one live session until it ends.
    ///
    /// The keep-alive deadline is armed on open and pushed forward by
    /// every heartbeat or data frame; it dies with this loop, so a
    /// closed session can never fire a stale timer.
    async fn drive_session(
        &mut self,
        mut handle: StreamHandle,
        reconcile_tx: &mpsc::Sender<()>,
    ) -> SessionEnd {
        let mut deadline = Instant::now() + self.keep_alive_timeout;

        let end = loop {
            tokio::select! {
                event = handle.events.recv() => match event {
                    Some(StreamEvent::Opened) => {
                        self.state = SessionState::Open;
                        deadline = Instant::now() + self.keep_alive_timeout;
                        info!("Session open, reconciling missed messages");
                        request_reconcile(reconcile_tx);
                    }
                    Some(StreamEvent::Heartbeat) => {
                        deadline = Instant::now() + self.keep_alive_timeout;
                    }
                    Some(StreamEvent::NewData) => {
                        deadline = Instant::now() + self.keep_alive_timeout;
                        request_reconcile(reconcile_tx);
                    }
                    Some(StreamEvent::Unknown(frame)) => {
                        warn!(frame = %frame, "Unknown message");
                        if self.unknown_frame_policy == UnknownFramePolicy::Reconnect {
                            break SessionEnd::BadFrame;
                        }
                    }
                    Some(StreamEvent::Closed { reason }) => {
                        info!(reason = %reason, "Connection closed, reconnecting");
                        break SessionEnd::Closed;
                    }
                    None => {
                        info!("Session task ended");
                        break SessionEnd::Closed;
                    }
                },
                () = sleep_until(deadline) => {
                    warn!(
                        timeout_ms = u64::try_from(self.keep_alive_timeout.as_millis())
                            .unwrap_or(u64::MAX),
                        "No traffic within keep-alive window, forcing reconnect"
                    );
                    break SessionEnd::Stale;
                }
            }
        };

        handle.close();
        end
    }

    /// Start the reconciliation worker.
    ///
    /// The capacity-1 channel is the dedup guard: one reconciliation
    /// in flight, at most one queued behind it. `try_send` from the
    /// event loop either queues that one re-run or finds it already
    /// queued. The single worker also serializes acks in fetch-issue
    /// order, so a later batch can never be overwritten by an earlier
    /// one completing late.
    ///
    /// Requests carry no payload; the worker reads the generation when
    /// it dequeues. A request left over from a replaced session then
    /// simply runs on behalf of the live one, so an open-time request
    /// that finds the queue full loses nothing.
    fn spawn_reconciler(&self) -> mpsc::Sender<()> {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let api = Arc::clone(&self.api);
        let dispatcher = Arc::clone(&self.dispatcher);
        let generation = Arc::clone(&self.generation);

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let issued = generation.load(Ordering::SeqCst);
                reconcile(api.as_ref(), &dispatcher, &generation, issued).await;
            }
        });

        tx
    }
}

/// Ask the worker for a reconciliation pass.
fn request_reconcile(tx: &mpsc::Sender<()>) {
    match tx.try_send(()) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("Reconciliation already queued");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            error!("Reconciliation worker stopped");
        }
    }
}

/// One fetch → dispatch → ack pass.
///
/// The generation is checked after every await point that matters: a
/// pass issued under a session that has since been replaced must not
/// notify or move the cursor.
async fn reconcile(
    api: &dyn MessageApi,
    dispatcher: &Dispatcher,
    generation: &AtomicU64,
    issued: u64,
) {
    let messages = match api.fetch_messages().await {
        Ok(messages) => messages,
        Err(err) => {
            warn!(error = %err, "Error while refreshing messages");
            return;
        }
    };

    if generation.load(Ordering::SeqCst) != issued {
        debug!(issued, "Dropping reconciliation from a replaced session");
        return;
    }

    let Some(high_water) = dispatcher.dispatch_batch(&messages).await else {
        debug!("No new messages");
        return;
    };

    if generation.load(Ordering::SeqCst) != issued {
        debug!(issued, "Dropping ack from a replaced session");
        return;
    }

    if let Err(err) = api.update_highest_message(high_water).await {
        warn!(message_id = high_water, error = %err, "Error while updating head");
    }
}

/// Reconnect delay: the remainder of the keep-alive window measured
/// from the previous attempt's start, floored at zero.
#[must_use]
fn reconnect_delay(keep_alive_timeout: Duration, elapsed: Duration) -> Duration {
    keep_alive_timeout.saturating_sub(elapsed)
}
