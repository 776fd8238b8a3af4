//! Natural-language scheduling: interprets a request into an absolute
//! instant, persists it, and fires `SCHEDULE_TRIGGERED` events when due.

mod config;
mod engine;
mod error;
mod interpreter;
mod schedule;

pub use config::SchedulerConfig;
pub use engine::Scheduler;
pub use error::SchedulerError;
pub use interpreter::{interpret, Interpretation, TIME_INTERPRETATION_CAPABILITY};
pub use schedule::{Schedule, ScheduleListFilter, ScheduleOptions, ScheduleOutcome, ScheduleStatus};
