//! Owned timer that runs the sweep and delivers notifications

use cadence_config::SchedulerPolicy;
use cadence_notify::Notifier;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{CoreEvent, FollowUpScheduler};

/// Deliver the notices for `events`, one attempt each.
///
/// Failures are logged and dropped. Returns how many were delivered.
pub async fn deliver_events(notifier: &dyn Notifier, events: &[CoreEvent], title: &str) -> usize {
    let mut delivered = 0;

    for notice in events.iter().filter_map(|e| e.notice(title)) {
        match notifier.deliver(&notice).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(
                client_id = %notice.client_id,
                notifier = notifier.name(),
                error = %e,
                "Failed to deliver notification"
            ),
        }
    }

    delivered
}

/// Handle to a running sweep task.
///
/// The task sweeps once after the warm-up delay and then on every interval
/// tick. [`SchedulerHandle::stop`] cancels both timers and waits for the
/// task; nothing runs after it returns. Dropping the handle aborts the task.
pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<FollowUpScheduler>>,
}

impl SchedulerHandle {
    /// Spawn the sweep task on the current tokio runtime
    pub fn start(
        scheduler: FollowUpScheduler,
        notifier: Arc<dyn Notifier>,
        timing: SchedulerPolicy,
        title: impl Into<String>,
    ) -> Self {
        let (tx, rx) = oneshot::channel();

        info!(
            warmup_ms = timing.warmup_delay.as_millis() as u64,
            interval_secs = timing.sweep_interval.as_secs(),
            notifier = notifier.name(),
            "Starting follow-up scheduler"
        );

        let task = tokio::spawn(run(scheduler, notifier, timing, title.into(), rx));

        Self {
            shutdown: Some(tx),
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the task and hand back the scheduler. `None` if the task died.
    pub async fn stop(mut self) -> Option<FollowUpScheduler> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        let task = self.task.take()?;
        match task.await {
            Ok(scheduler) => {
                info!("Follow-up scheduler stopped");
                Some(scheduler)
            }
            Err(e) => {
                warn!(error = %e, "Scheduler task ended abnormally");
                None
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    mut scheduler: FollowUpScheduler,
    notifier: Arc<dyn Notifier>,
    timing: SchedulerPolicy,
    title: String,
    mut shutdown: oneshot::Receiver<()>,
) -> FollowUpScheduler {
    // A dropped sender also resolves `shutdown`
    tokio::select! {
        biased;
        _ = &mut shutdown => return scheduler,
        _ = tokio::time::sleep(timing.warmup_delay) => {}
    }

    let mut interval = tokio::time::interval_at(
        Instant::now() + timing.sweep_interval,
        timing.sweep_interval,
    );
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let events = scheduler.sweep(cadence_util::now());

        if !events.is_empty() {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                delivered = deliver_events(notifier.as_ref(), &events, &title) => {
                    debug!(events = events.len(), delivered, "Sweep events handled");
                }
            }
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = interval.tick() => {}
        }
    }

    scheduler
}
