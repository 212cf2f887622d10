//! When a scheduled job runs.

use crate::error::{ConfigError, Result};
use chrono::{DateTime, Local};
use cron::Schedule;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How executions of a job are spaced.
#[derive(Clone)]
pub enum TriggerKind {
    /// Runs at the times matched by a cron expression, local time.
    Cron {
        /// The expression as declared.
        expression: String,
        /// Parsed schedule.
        schedule: Box<Schedule>,
    },
    /// Runs start one period apart.
    FixedRate(Duration),
    /// Each run starts one delay after the previous one finished.
    FixedDelay(Duration),
}

impl PartialEq for TriggerKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Cron { expression: a, .. }, Self::Cron { expression: b, .. }) => a == b,
            (Self::FixedRate(a), Self::FixedRate(b)) | (Self::FixedDelay(a), Self::FixedDelay(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cron { expression, .. } => f.debug_tuple("Cron").field(expression).finish(),
            Self::FixedRate(period) => f.debug_tuple("FixedRate").field(period).finish(),
            Self::FixedDelay(delay) => f.debug_tuple("FixedDelay").field(delay).finish(),
        }
    }
}

/// A trigger plus the wait before the first execution.
///
/// # Examples
///
/// ```rust
/// use reloadable_config::scheduled::{Trigger, TriggerKind};
/// use std::time::Duration;
///
/// let trigger = Trigger::fixed_rate("heartbeat", Duration::from_secs(30))
///     .unwrap()
///     .with_initial_delay(Duration::from_secs(5));
/// assert_eq!(trigger.kind(), &TriggerKind::FixedRate(Duration::from_secs(30)));
///
/// // Five-field expressions run at second zero
/// assert!(Trigger::cron("report", "0 2 * * *").is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    kind: TriggerKind,
    initial_delay: Duration,
}

impl Trigger {
    /// A cron trigger.
    ///
    /// Five-field expressions get a leading seconds field of `0`; six- and
    /// seven-field expressions are used as written.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTrigger`] if the expression does not parse.
    pub fn cron(job: &str, expression: &str) -> Result<Self> {
        let expression = expression.trim();
        let normalized = if expression.split_whitespace().count() == 5 {
            format!("0 {}", expression)
        } else {
            expression.to_string()
        };

        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| ConfigError::invalid_trigger(job, format!("bad cron expression '{}': {}", expression, e)))?;

        Ok(Self::new(TriggerKind::Cron {
            expression: expression.to_string(),
            schedule: Box::new(schedule),
        }))
    }

    /// A fixed-rate trigger.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTrigger`] for a zero period.
    pub fn fixed_rate(job: &str, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(ConfigError::invalid_trigger(job, "fixed rate must be positive"));
        }
        Ok(Self::new(TriggerKind::FixedRate(period)))
    }

    /// A fixed-delay trigger.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTrigger`] for a zero delay.
    pub fn fixed_delay(job: &str, delay: Duration) -> Result<Self> {
        if delay.is_zero() {
            return Err(ConfigError::invalid_trigger(job, "fixed delay must be positive"));
        }
        Ok(Self::new(TriggerKind::FixedDelay(delay)))
    }

    fn new(kind: TriggerKind) -> Self {
        Self {
            kind,
            initial_delay: Duration::ZERO,
        }
    }

    /// Wait `delay` before the first execution.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// The spacing rule.
    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    /// Wait before the first execution.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Time from `now` until the next cron match; `None` for non-cron
    /// triggers or an exhausted schedule.
    pub fn until_next(&self, now: DateTime<Local>) -> Option<Duration> {
        match &self.kind {
            TriggerKind::Cron { schedule, .. } => schedule
                .after(&now)
                .next()
                .map(|next| (next - now).to_std().unwrap_or_default()),
            TriggerKind::FixedRate(_) | TriggerKind::FixedDelay(_) => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TriggerKind::Cron { expression, .. } => write!(f, "cron '{}'", expression)?,
            TriggerKind::FixedRate(period) => write!(f, "fixed rate {:?}", period)?,
            TriggerKind::FixedDelay(delay) => write!(f, "fixed delay {:?}", delay)?,
        }
        if !self.initial_delay.is_zero() {
            write!(f, " after {:?}", self.initial_delay)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_five_field_cron() {
        let trigger = Trigger::cron("job", "*/15 * * * *").unwrap();
        let now = Local.with_ymd_and_hms(2026, 3, 1, 10, 7, 30).unwrap();
        let wait = trigger.until_next(now).unwrap();
        let next = now + chrono::Duration::from_std(wait).unwrap();
        assert_eq!((next.minute(), next.second()), (15, 0));
    }

    #[test]
    fn test_six_field_cron_kept() {
        let trigger = Trigger::cron("job", "30 * * * * *").unwrap();
        let now = Local.with_ymd_and_hms(2026, 3, 1, 10, 7, 0).unwrap();
        assert_eq!(trigger.until_next(now), Some(Duration::from_secs(30)));
        assert!(matches!(trigger.kind(), TriggerKind::Cron { expression, .. } if expression == "30 * * * * *"));
    }

    #[test]
    fn test_invalid_cron() {
        let result = Trigger::cron("job", "61 * * * *");
        assert!(matches!(result, Err(ConfigError::InvalidTrigger { ref job, .. }) if job == "job"));
    }

    #[test]
    fn test_zero_periods_rejected() {
        assert!(Trigger::fixed_rate("job", Duration::ZERO).is_err());
        assert!(Trigger::fixed_delay("job", Duration::ZERO).is_err());
    }

    #[test]
    fn test_fixed_triggers_have_no_cron_wait() {
        let trigger = Trigger::fixed_delay("job", Duration::from_millis(5)).unwrap();
        assert_eq!(trigger.until_next(Local::now()), None);
    }

    #[test]
    fn test_display() {
        let trigger = Trigger::fixed_rate("job", Duration::from_secs(1))
            .unwrap()
            .with_initial_delay(Duration::from_millis(250));
        assert_eq!(trigger.to_string(), "fixed rate 1s after 250ms");
    }
}
