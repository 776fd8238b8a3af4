//! The persisted [`Schedule`] record.

use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Active,
    /// Transient guard held while a `fire()` call is re-interpreting a
    /// recurring pattern. Never observed by callers of `schedule`/`list`
    /// for longer than that window; a schedule found in this state by
    /// the sweep or a timer is treated as not-due.
    Firing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Schedule {
    pub id: String,
    pub original_request: String,
    /// Template payload for the `SCHEDULE_TRIGGERED` event, carried
    /// opaquely.
    pub payload: Value,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    /// Natural-language recurrence, if this is a recurring schedule.
    pub pattern: Option<String>,
    pub occurrences: u32,
    pub max_occurrences: Option<u32>,
    pub dedupe_key: Option<String>,
    pub correlation_id: Option<String>,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Options accepted by [`super::Scheduler::schedule`].
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    pub timezone: Option<chrono_tz::Tz>,
    pub max_occurrences: Option<u32>,
    pub dedupe_key: Option<String>,
    pub correlation_id: Option<String>,
}

/// The result of a successful `schedule(...)` call.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    pub schedule_id: String,
    pub interpretation: String,
    pub next_run: DateTime<Utc>,
    pub pattern: Option<String>,
}

/// A filter passed to [`super::Scheduler::list`].
#[derive(Debug, Clone, Default)]
pub struct ScheduleListFilter {
    pub status: Option<ScheduleStatus>,
}
