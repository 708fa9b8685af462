//! The driver loop: a fixed-interval, single-flight periodic task.
//!
//! Each firing runs the task unless the previous run is still going, in which
//! case the firing is dropped (never queued). Stopping lets an in-flight run
//! finish; [`Worker::wait_for_stop`] bounds that wait and aborts on timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::engine::ValidatorEngine;
use crate::metrics::NodeMetrics;
use crate::NodeError;

/// Work run once per driver tick.
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    async fn tick(&self) -> Result<(), NodeError>;
}

#[async_trait]
impl PeriodicTask for ValidatorEngine {
    async fn tick(&self) -> Result<(), NodeError> {
        self.advance().await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Clears the busy flag when a tick ends, even by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Worker {
    interval: Duration,
    metrics: Arc<NodeMetrics>,
    state: Arc<watch::Sender<WorkerState>>,
    stop_tx: watch::Sender<bool>,
    busy: Arc<AtomicBool>,
    current_tick: Arc<Mutex<Option<AbortHandle>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(interval: Duration, metrics: Arc<NodeMetrics>) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        let (stop_tx, _) = watch::channel(false);
        Self {
            interval,
            metrics,
            state: Arc::new(state),
            stop_tx,
            busy: Arc::new(AtomicBool::new(false)),
            current_tick: Arc::new(Mutex::new(None)),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Whether a tick is executing right now.
    pub fn is_working(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Begin firing `task` every interval. Only an idle worker can start.
    pub fn start(&self, task: Arc<dyn PeriodicTask>) {
        if self.state() != WorkerState::Idle {
            tracing::warn!(state = ?self.state(), "driver loop already started");
            return;
        }
        self.state.send_replace(WorkerState::Running);

        let mut stop_rx = self.stop_tx.subscribe();
        let state = Arc::clone(&self.state);
        let busy = Arc::clone(&self.busy);
        let current_tick = Arc::clone(&self.current_tick);
        let metrics = Arc::clone(&self.metrics);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut in_flight: Option<JoinHandle<()>> = None;

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = interval.tick() => {
                        if busy.swap(true, Ordering::AcqRel) {
                            metrics.ticks_skipped.inc();
                            tracing::debug!("previous tick still running, skipping");
                            continue;
                        }
                        let task = Arc::clone(&task);
                        let guard = BusyGuard(Arc::clone(&busy));
                        let tick = tokio::spawn(async move {
                            let _guard = guard;
                            if let Err(e) = task.tick().await {
                                tracing::error!(error = %e, "driver tick failed");
                            }
                        });
                        *current_tick.lock() = Some(tick.abort_handle());
                        in_flight = Some(tick);
                    }
                }
            }

            if let Some(tick) = in_flight {
                if let Err(e) = tick.await {
                    if e.is_panic() {
                        tracing::error!("driver tick panicked");
                    }
                }
            }
            state.send_replace(WorkerState::Stopped);
            tracing::info!("driver loop stopped");
        });
        *self.handle.lock() = Some(handle);
        tracing::info!(interval_ms = period.as_millis() as u64, "driver loop started");
    }

    /// Ask the loop to stop after the in-flight tick, if any.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
        self.state.send_modify(|state| {
            *state = match *state {
                WorkerState::Idle | WorkerState::Stopped => WorkerState::Stopped,
                WorkerState::Running | WorkerState::Stopping => WorkerState::Stopping,
            }
        });
    }

    /// Wait up to `timeout` for the loop to reach `Stopped`.
    ///
    /// On timeout the loop and its in-flight tick are aborted and `false` is
    /// returned.
    pub async fn wait_for_stop(&self, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let stopped = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|s| *s == WorkerState::Stopped)).await,
            Ok(Ok(_))
        );
        if stopped {
            self.handle.lock().take();
            return true;
        }

        tracing::warn!(timeout_ms = timeout.as_millis() as u64, "driver loop did not stop in time, aborting");
        if let Some(tick) = self.current_tick.lock().take() {
            tick.abort();
        }
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
        self.state.send_replace(WorkerState::Stopped);
        false
    }
}
