//! Scheduled jobs that follow the `scheduled` configuration.
//!
//! Jobs are bound in code with [`ScheduledJob`]; their triggers come from
//! [`ScheduledTaskConfig`] and are re-applied by
//! [`ScheduledTaskReconfigurer`] every time that configuration reloads.

mod config;
mod job;
mod reconfigurer;
mod trigger;

pub use config::{SCHEDULED_PREFIX, ScheduledTaskConfig, TaskDefinition, TimeUnit};
pub use job::{JobFuture, JobHandle, ScheduledJob};
pub use reconfigurer::{ReconcileReport, ScheduledTaskReconfigurer};
pub use trigger::{Trigger, TriggerKind};
