//! Background Sweep
//!
//! Periodic pruning of in-memory throttle state. The task runs on its own
//! timer, independent of request traffic, and lives exactly as long as the
//! [`SweepHandle`] returned by [`Sweeper::start`] is not stopped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

/// State that can drop its expired entries
pub trait Sweepable: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prune expired state. Returns the number of keys removed.
    fn sweep(&self) -> usize;
}

/// Sweeper over a fixed set of targets
pub struct Sweeper {
    targets: Vec<Arc<dyn Sweepable>>,
    period: Duration,
}

impl Sweeper {
    pub fn new(targets: Vec<Arc<dyn Sweepable>>, period: Duration) -> Self {
        Self { targets, period }
    }

    /// Run a single pass over every target.
    pub fn sweep_once(&self) -> usize {
        sweep_all(&self.targets)
    }

    /// Spawn the periodic task. Must be called inside a tokio runtime.
    pub fn start(self) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let Sweeper { targets, period } = self;

        info!(
            targets = targets.len(),
            period_secs = period.as_secs(),
            "Starting throttle sweep"
        );

        let task = tokio::spawn(async move {
            // First tick one period out; interval() would fire immediately
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("Throttle sweep shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        sweep_all(&targets);
                    }
                }
            }
        });

        SweepHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

fn sweep_all(targets: &[Arc<dyn Sweepable>]) -> usize {
    let mut total = 0;
    for target in targets {
        let removed = target.sweep();
        if removed > 0 {
            debug!(store = target.name(), removed, "Pruned expired throttle keys");
        }
        total += removed;
    }
    total
}

/// Owner of a running sweep task
///
/// Dropping the handle without calling [`SweepHandle::stop`] also ends the
/// task: the shutdown sender is dropped, which completes the receiver.
pub struct SweepHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the task and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
        info!("Throttle sweep stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
