//! Converges running jobs to the declared job table.

use super::config::{SCHEDULED_PREFIX, ScheduledTaskConfig};
use super::job::{self, JobHandle, ScheduledJob};
use super::trigger::Trigger;
use crate::core::ConfigRegistry;
use crate::notify::{ChangeNotifier, SubscriptionHandle};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Jobs that were running before the pass and were cancelled.
    pub cancelled: Vec<String>,
    /// Jobs scheduled from their declaration.
    pub scheduled: Vec<String>,
    /// Undeclared jobs scheduled with their default trigger.
    pub defaulted: Vec<String>,
    /// Jobs declared with `enabled = false`.
    pub disabled: Vec<String>,
    /// Enabled jobs without a usable trigger.
    pub skipped: Vec<String>,
    /// Enabled declarations with no bound job.
    pub unbound: Vec<String>,
}

impl ReconcileReport {
    /// Ids of every job running after the pass.
    pub fn active(&self) -> Vec<String> {
        let mut active: Vec<_> = self.scheduled.iter().chain(&self.defaulted).cloned().collect();
        active.sort();
        active
    }
}

struct ReconfigurerInner {
    registry: Arc<ConfigRegistry>,
    runtime: Handle,
    bindings: RwLock<BTreeMap<String, ScheduledJob>>,
    running: Mutex<BTreeMap<String, JobHandle>>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl ReconfigurerInner {
    fn reconcile(&self) -> ReconcileReport {
        let table = self.registry.get::<ScheduledTaskConfig>().unwrap_or_default();
        self.apply(&table)
    }

    fn apply(&self, table: &ScheduledTaskConfig) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        // Held for the whole pass so passes never interleave
        let mut running = self.running.lock();

        for (id, handle) in std::mem::take(&mut *running) {
            handle.cancel();
            report.cancelled.push(id);
        }

        let bindings = self.bindings.read();
        for (id, job) in bindings.iter() {
            let trigger = match table.get(id) {
                None => match job.default_trigger() {
                    Some(trigger) => {
                        report.defaulted.push(id.clone());
                        trigger.clone()
                    }
                    None => {
                        debug!(job = %id, "Job not declared and has no default trigger");
                        continue;
                    }
                },
                Some(definition) if !definition.enabled => {
                    debug!(job = %id, "Job disabled");
                    report.disabled.push(id.clone());
                    continue;
                }
                Some(definition) => match definition.trigger(id) {
                    Ok(Some(trigger)) => {
                        report.scheduled.push(id.clone());
                        trigger
                    }
                    Ok(None) => {
                        warn!(job = %id, "Job enabled without cron, fixed rate or fixed delay");
                        report.skipped.push(id.clone());
                        continue;
                    }
                    Err(e) => {
                        error!(job = %id, error = %e, "Invalid job trigger, skipping");
                        report.skipped.push(id.clone());
                        continue;
                    }
                },
            };

            running.insert(id.clone(), job::spawn(&self.runtime, job.clone(), trigger));
        }

        for (id, definition) in table.iter() {
            if definition.enabled && !bindings.contains_key(id) {
                warn!(job = %id, "Declared job has no binding");
                report.unbound.push(id.clone());
            }
        }

        info!(
            cancelled = report.cancelled.len(),
            running = running.len(),
            disabled = report.disabled.len(),
            skipped = report.skipped.len(),
            "Scheduled jobs reconfigured"
        );
        report
    }
}

/// Keeps scheduled jobs in line with the `scheduled` configuration.
///
/// On every change to [`ScheduledTaskConfig`] all running jobs are
/// cancelled and the enabled ones are scheduled again with their declared
/// trigger. Jobs the table does not mention run with their default
/// trigger; jobs declared with `enabled: false` stay off.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_config::prelude::*;
/// use reloadable_config::scheduled::{ScheduledJob, ScheduledTaskConfig, ScheduledTaskReconfigurer};
/// use tokio::runtime::Handle;
///
/// # async fn example() -> Result<()> {
/// let engine = ReloadEngine::builder()
///     .with_root_dir("/etc/app")
///     .register::<ScheduledTaskConfig>(ScheduledTaskConfig::descriptor())
///     .build()?;
///
/// let reconfigurer = ScheduledTaskReconfigurer::new(engine.registry().clone(), Handle::current());
/// reconfigurer.bind(ScheduledJob::new("refresh-feeds", || async { Ok(()) }));
/// reconfigurer.attach(engine.notifier());
///
/// engine.start()?;
/// println!("running: {:?}", reconfigurer.running_jobs());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ScheduledTaskReconfigurer {
    inner: Arc<ReconfigurerInner>,
}

impl ScheduledTaskReconfigurer {
    /// Create a reconfigurer reading the job table from `registry` and
    /// running jobs on `runtime`.
    pub fn new(registry: Arc<ConfigRegistry>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(ReconfigurerInner {
                registry,
                runtime,
                bindings: RwLock::new(BTreeMap::new()),
                running: Mutex::new(BTreeMap::new()),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Bind a job. Takes effect at the next reconciliation.
    pub fn bind(&self, job: ScheduledJob) {
        let id = job.id().to_string();
        if self.inner.bindings.write().insert(id.clone(), job).is_some() {
            warn!(job = %id, "Job binding replaced");
        }
    }

    /// Reconcile on every change published under `scheduled`, and once now.
    pub fn attach(&self, notifier: &ChangeNotifier) -> ReconcileReport {
        let weak: Weak<ReconfigurerInner> = Arc::downgrade(&self.inner);
        let handle = notifier.subscribe(SCHEDULED_PREFIX, move |_event| {
            if let Some(inner) = weak.upgrade() {
                inner.reconcile();
            }
            Ok(())
        });
        *self.inner.subscription.lock() = Some(handle);
        self.reconcile()
    }

    /// Reconcile against the table currently in the registry.
    pub fn reconcile(&self) -> ReconcileReport {
        self.inner.reconcile()
    }

    /// Reconcile against an explicit table.
    pub fn apply(&self, table: &ScheduledTaskConfig) -> ReconcileReport {
        self.inner.apply(table)
    }

    /// Ids of running jobs, sorted.
    pub fn running_jobs(&self) -> Vec<String> {
        self.inner.running.lock().keys().cloned().collect()
    }

    /// Handle of a running job.
    pub fn job_handle(&self, id: &str) -> Option<JobHandle> {
        self.inner.running.lock().get(id).cloned()
    }

    /// Trigger a running job was scheduled with.
    pub fn trigger_of(&self, id: &str) -> Option<Trigger> {
        self.job_handle(id).map(|handle| handle.trigger().clone())
    }

    /// Cancel every job and stop listening for changes.
    pub fn shutdown(&self) {
        self.inner.subscription.lock().take();
        let running = std::mem::take(&mut *self.inner.running.lock());
        for handle in running.values() {
            handle.cancel();
        }
        info!(cancelled = running.len(), "Scheduled jobs shut down");
    }
}

impl std::fmt::Debug for ScheduledTaskReconfigurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTaskReconfigurer")
            .field("bindings", &self.inner.bindings.read().len())
            .field("running", &self.running_jobs())
            .finish()
    }
}
