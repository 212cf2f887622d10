//! Job bindings and the per-job execution loop.

use super::trigger::{Trigger, TriggerKind};
use crate::error::BoxError;
use chrono::Local;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, trace};

/// Future returned by a job body.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

type JobBody = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// A job the process knows how to run, with an optional built-in trigger.
///
/// The default trigger applies when the job is absent from the declaration
/// table.
///
/// # Examples
///
/// ```rust
/// use reloadable_config::scheduled::{ScheduledJob, Trigger};
/// use std::time::Duration;
///
/// let job = ScheduledJob::new("refresh-feeds", || async {
///     println!("refreshing");
///     Ok(())
/// })
/// .with_default_trigger(Trigger::fixed_rate("refresh-feeds", Duration::from_secs(60)).unwrap());
///
/// assert_eq!(job.id(), "refresh-feeds");
/// ```
#[derive(Clone)]
pub struct ScheduledJob {
    id: String,
    body: JobBody,
    default_trigger: Option<Trigger>,
}

impl ScheduledJob {
    /// Bind `body` to job `id`.
    pub fn new<F, Fut>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            body: Arc::new(move || Box::pin(body()) as JobFuture),
            default_trigger: None,
        }
    }

    /// Trigger used when the job is not declared.
    pub fn with_default_trigger(mut self, trigger: Trigger) -> Self {
        self.default_trigger = Some(trigger);
        self
    }

    /// Job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Built-in trigger, if any.
    pub fn default_trigger(&self) -> Option<&Trigger> {
        self.default_trigger.as_ref()
    }

}

impl fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("id", &self.id)
            .field("default_trigger", &self.default_trigger)
            .finish_non_exhaustive()
    }
}

/// Handle to a scheduled job.
///
/// Cancelling stops further executions; a run already in progress finishes.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: String,
    trigger: Trigger,
    cancel: Arc<watch::Sender<bool>>,
    runs: Arc<AtomicU64>,
}

impl JobHandle {
    /// Job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Trigger the job was scheduled with.
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Stop scheduling further executions. Does not wait.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Number of executions started so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }
}

/// Start driving `job` on `runtime` according to `trigger`.
pub(crate) fn spawn(runtime: &Handle, job: ScheduledJob, trigger: Trigger) -> JobHandle {
    let (cancel, cancelled) = watch::channel(false);
    let handle = JobHandle {
        id: job.id.clone(),
        trigger: trigger.clone(),
        cancel: Arc::new(cancel),
        runs: Arc::new(AtomicU64::new(0)),
    };

    let runs = Arc::clone(&handle.runs);
    runtime.spawn(drive(job, trigger, cancelled, runs));
    handle
}

async fn drive(job: ScheduledJob, trigger: Trigger, mut cancelled: watch::Receiver<bool>, runs: Arc<AtomicU64>) {
    debug!(job = %job.id, trigger = %trigger, "Job scheduled");

    if !trigger.initial_delay().is_zero() && !pause(trigger.initial_delay(), &mut cancelled).await {
        return;
    }

    match trigger.kind() {
        TriggerKind::FixedRate(period) => {
            let mut ticker = interval(*period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.changed() => break,
                    _ = ticker.tick() => {}
                }
                if *cancelled.borrow() {
                    break;
                }
                execute(&job, &runs).await;
            }
        }
        TriggerKind::FixedDelay(delay) => loop {
            if *cancelled.borrow() {
                break;
            }
            execute(&job, &runs).await;
            if !pause(*delay, &mut cancelled).await {
                break;
            }
        },
        TriggerKind::Cron { .. } => loop {
            let Some(wait) = trigger.until_next(Local::now()) else {
                debug!(job = %job.id, "Cron schedule has no upcoming time");
                break;
            };
            if !pause(wait, &mut cancelled).await {
                break;
            }
            execute(&job, &runs).await;
        },
    }

    debug!(job = %job.id, "Job cancelled");
}

/// Sleep for `duration`; `false` if cancelled first.
async fn pause(duration: Duration, cancelled: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = cancelled.changed() => false,
        _ = sleep(duration) => !*cancelled.borrow(),
    }
}

/// Run one execution in its own task so a failure or panic stays contained,
/// including a panic while the body builds its future.
async fn execute(job: &ScheduledJob, runs: &AtomicU64) {
    runs.fetch_add(1, Ordering::SeqCst);
    trace!(job = %job.id, "Job running");
    let body = Arc::clone(&job.body);
    match tokio::spawn(async move { body().await }).await {
        Ok(Ok(())) => trace!(job = %job.id, "Job finished"),
        Ok(Err(e)) => error!(job = %job.id, error = %e, "Scheduled job failed"),
        Err(e) => error!(job = %job.id, error = %e, "Scheduled job panicked"),
    }
}
