//! Declarations of scheduled jobs, loaded under the `scheduled` prefix.

use super::trigger::Trigger;
use crate::core::{ConfigDescriptor, Reloadable};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::time::Duration;

/// Prefix the job table is loaded from.
pub const SCHEDULED_PREFIX: &str = "scheduled";

/// Table of job declarations keyed by job id.
///
/// ```yaml
/// scheduled:
///   refresh-feeds:
///     enabled: true
///     fixed-rate: 30
///     time-unit: SECONDS
///   nightly-report:
///     enabled: true
///     cron: "0 2 * * *"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduledTaskConfig {
    tasks: BTreeMap<String, TaskDefinition>,
}

impl Reloadable for ScheduledTaskConfig {}

impl ScheduledTaskConfig {
    /// Descriptor for the job table in the default file.
    pub fn descriptor() -> ConfigDescriptor {
        ConfigDescriptor::new(SCHEDULED_PREFIX)
    }

    /// Declaration for `id`.
    pub fn get(&self, id: &str) -> Option<&TaskDefinition> {
        self.tasks.get(id)
    }

    /// Add or replace a declaration.
    pub fn insert(&mut self, id: impl Into<String>, definition: TaskDefinition) {
        self.tasks.insert(id.into(), definition);
    }

    /// Declarations in id order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, TaskDefinition> {
        self.tasks.iter()
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<(String, TaskDefinition)> for ScheduledTaskConfig {
    fn from_iter<I: IntoIterator<Item = (String, TaskDefinition)>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

/// One job's declaration.
///
/// Durations are counted in `time_unit`. When several triggers are given,
/// `cron` wins over `fixed_rate`, which wins over `fixed_delay`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDefinition {
    /// Whether the job should run.
    pub enabled: bool,
    /// Cron expression (5, 6 or 7 fields).
    pub cron: Option<String>,
    /// Pause between the end of one run and the start of the next.
    pub fixed_delay: Option<u64>,
    /// Period between run starts.
    pub fixed_rate: Option<u64>,
    /// Wait before the first run.
    pub initial_delay: Option<u64>,
    /// Unit of the duration fields.
    pub time_unit: TimeUnit,
}

impl TaskDefinition {
    /// An enabled cron job.
    pub fn cron(expression: impl Into<String>) -> Self {
        Self {
            enabled: true,
            cron: Some(expression.into()),
            ..Self::default()
        }
    }

    /// An enabled fixed-rate job, period in milliseconds.
    pub fn fixed_rate(period_ms: u64) -> Self {
        Self {
            enabled: true,
            fixed_rate: Some(period_ms),
            ..Self::default()
        }
    }

    /// An enabled fixed-delay job, delay in milliseconds.
    pub fn fixed_delay(delay_ms: u64) -> Self {
        Self {
            enabled: true,
            fixed_delay: Some(delay_ms),
            ..Self::default()
        }
    }

    /// A disabled declaration.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Compute the trigger for job `id`.
    ///
    /// Returns `Ok(None)` when no trigger is declared.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTrigger`](crate::error::ConfigError::InvalidTrigger)
    /// for an unparsable cron expression or a zero period.
    pub fn trigger(&self, id: &str) -> Result<Option<Trigger>> {
        let initial_delay = self
            .initial_delay
            .map(|amount| self.time_unit.duration(amount))
            .unwrap_or_default();

        let trigger = if let Some(expression) = self.cron.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Trigger::cron(id, expression)?
        } else if let Some(rate) = self.fixed_rate {
            Trigger::fixed_rate(id, self.time_unit.duration(rate))?
        } else if let Some(delay) = self.fixed_delay {
            Trigger::fixed_delay(id, self.time_unit.duration(delay))?
        } else {
            return Ok(None);
        };

        Ok(Some(trigger.with_initial_delay(initial_delay)))
    }
}

/// Unit for declared durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    /// Nanoseconds.
    #[serde(alias = "nanoseconds")]
    Nanoseconds,
    /// Microseconds.
    #[serde(alias = "microseconds")]
    Microseconds,
    /// Milliseconds.
    #[default]
    #[serde(alias = "milliseconds")]
    Milliseconds,
    /// Seconds.
    #[serde(alias = "seconds")]
    Seconds,
    /// Minutes.
    #[serde(alias = "minutes")]
    Minutes,
    /// Hours.
    #[serde(alias = "hours")]
    Hours,
    /// Days.
    #[serde(alias = "days")]
    Days,
}

impl TimeUnit {
    /// `amount` of this unit as a [`Duration`].
    pub fn duration(self, amount: u64) -> Duration {
        match self {
            Self::Nanoseconds => Duration::from_nanos(amount),
            Self::Microseconds => Duration::from_micros(amount),
            Self::Milliseconds => Duration::from_millis(amount),
            Self::Seconds => Duration::from_secs(amount),
            Self::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            Self::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            Self::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}
