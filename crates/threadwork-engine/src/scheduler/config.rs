use std::time::Duration;

/// Tuning knobs for the [`super::Scheduler`], following the teacher
/// crate's `with_*` builder convention (`ActivityOptions`,
/// `WorkerPoolConfig`, `RetryPolicy`).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the global sweep checks for schedules whose `next_run`
    /// has passed and which have no live timer.
    pub sweep_interval: Duration,
    /// The ceiling beyond which a schedule relies purely on the sweep
    /// rather than a per-schedule one-shot timer. `tokio::time::sleep`
    /// has no practical platform ceiling, so this is a configured
    /// conservative value rather than a hard platform constraint (see
    /// SPEC_FULL.md §9).
    pub max_timer_delay: Duration,
    pub default_timezone: chrono_tz::Tz,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            max_timer_delay: Duration::from_secs(49 * 24 * 3600),
            default_timezone: chrono_tz::UTC,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_max_timer_delay(mut self, delay: Duration) -> Self {
        self.max_timer_delay = delay;
        self
    }

    pub fn with_default_timezone(mut self, timezone: chrono_tz::Tz) -> Self {
        self.default_timezone = timezone;
        self
    }
}
