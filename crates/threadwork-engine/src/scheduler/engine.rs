//! Arms timers/sweeps for persisted schedules and fires
//! `SCHEDULE_TRIGGERED` events when they come due.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::driver::DriverFactory;
use crate::event::{EventPriorityBand, ScheduleTriggeredPayload, SystemEvent};
use crate::storage::{ScheduleFilter, Storage};
use crate::workflow::EventEmitter;

use super::config::SchedulerConfig;
use super::error::SchedulerError;
use super::interpreter::interpret;
use super::schedule::{Schedule, ScheduleListFilter, ScheduleOptions, ScheduleOutcome, ScheduleStatus};

struct Inner {
    storage: Arc<dyn Storage>,
    driver_factory: Arc<dyn DriverFactory>,
    emitter: EventEmitter,
    config: SchedulerConfig,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Translates natural-language schedule requests into absolute-time
/// events feeding back into the bus. Cheap to clone: internally `Arc`'d.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        driver_factory: Arc<dyn DriverFactory>,
        emitter: EventEmitter,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                storage,
                driver_factory,
                emitter,
                config,
                timers: Mutex::new(HashMap::new()),
                shutdown_tx,
                sweep_handle: Mutex::new(None),
            }),
        }
    }

    /// Starts the global sweep loop and re-arms timers for any active
    /// schedules already in storage (the on-startup recovery path).
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let active = self
            .inner
            .storage
            .search_schedules(&ScheduleFilter {
                status: Some(ScheduleStatus::Active),
                dedupe_key: None,
            })
            .await?;
        for schedule in active {
            self.arm_if_near(&schedule);
        }

        let scheduler = self.clone();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let interval = self.inner.config.sweep_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = scheduler.run_sweep_once().await {
                            tracing::warn!(error = %err, "schedule sweep failed");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
        *self.inner.sweep_handle.lock() = Some(handle);
        Ok(())
    }

    pub async fn stop(&self) {
        let _ = self.inner.shutdown_tx.send(true);
        let handle = self.inner.sweep_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        let timers: Vec<JoinHandle<()>> = self.inner.timers.lock().drain().map(|(_, h)| h).collect();
        for timer in timers {
            timer.abort();
        }
    }

    #[tracing::instrument(skip(self, payload_template, options), fields(request = %request))]
    pub async fn schedule(
        &self,
        request: &str,
        payload_template: serde_json::Value,
        options: ScheduleOptions,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        let timezone = options.timezone.unwrap_or(self.inner.config.default_timezone);
        let now = Utc::now();
        let interpretation = interpret(self.inner.driver_factory.as_ref(), now, timezone, request).await?;

        if let Some(dedupe_key) = &options.dedupe_key {
            self.cancel_by_dedupe_key(dedupe_key).await?;
        }

        let schedule = Schedule {
            id: Uuid::now_v7().to_string(),
            original_request: request.to_string(),
            payload: payload_template,
            next_run: interpretation.next,
            last_run: None,
            pattern: interpretation.pattern.clone(),
            occurrences: 0,
            max_occurrences: options.max_occurrences,
            dedupe_key: options.dedupe_key,
            correlation_id: options.correlation_id,
            status: ScheduleStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let schedule = self.inner.storage.insert_schedule(schedule).await?;

        let outcome = ScheduleOutcome {
            schedule_id: schedule.id.clone(),
            interpretation: interpretation.interpretation,
            next_run: schedule.next_run,
            pattern: schedule.pattern.clone(),
        };

        if schedule.next_run <= now {
            tracing::info!(schedule_id = %schedule.id, "schedule's first interpretation is in the past; firing immediately");
            self.fire(schedule).await?;
        } else {
            self.arm_if_near(&schedule);
        }

        Ok(outcome)
    }

    pub async fn cancel(&self, schedule_id: &str) -> Result<bool, SchedulerError> {
        let schedules = self
            .inner
            .storage
            .search_schedules(&ScheduleFilter::default())
            .await?;
        let Some(mut schedule) = schedules.into_iter().find(|s| s.id == schedule_id) else {
            return Ok(false);
        };
        if schedule.status != ScheduleStatus::Active {
            return Ok(false);
        }
        schedule.status = ScheduleStatus::Cancelled;
        schedule.updated_at = Utc::now();
        self.inner.storage.update_schedule(schedule).await?;
        if let Some(timer) = self.inner.timers.lock().remove(schedule_id) {
            timer.abort();
        }
        Ok(true)
    }

    pub async fn list(&self, filter: &ScheduleListFilter) -> Result<Vec<Schedule>, SchedulerError> {
        let schedules = self
            .inner
            .storage
            .search_schedules(&ScheduleFilter {
                status: filter.status,
                dedupe_key: None,
            })
            .await?;
        Ok(schedules)
    }

    async fn cancel_by_dedupe_key(&self, dedupe_key: &str) -> Result<(), SchedulerError> {
        let existing = self
            .inner
            .storage
            .search_schedules(&ScheduleFilter {
                status: Some(ScheduleStatus::Active),
                dedupe_key: Some(dedupe_key.to_string()),
            })
            .await?;
        for schedule in existing {
            let _ = self.cancel(&schedule.id).await;
        }
        Ok(())
    }

    /// Emits the event, advances occurrences/last_run, and either
    /// re-interprets the pattern for the next run or marks the schedule
    /// completed. Execution failures (event emission) are logged and
    /// swallowed per §4.6 — the schedule still advances.
    ///
    /// Between emitting the event and finishing the (potentially slow)
    /// re-interpretation of a recurring pattern, the schedule is
    /// persisted with a transient `Firing` status. This closes the
    /// window where the occurrence has already fired (and the timer
    /// that tracked it is already gone) but `next_run` in storage still
    /// shows the just-passed instant: without the guard, a concurrent
    /// sweep tick would see an "active, due, untimed" schedule and fire
    /// the same occurrence a second time.
    #[tracing::instrument(skip(self, schedule), fields(schedule_id = %schedule.id))]
    async fn fire(&self, mut schedule: Schedule) -> Result<(), SchedulerError> {
        let event = SystemEvent::ScheduleTriggered(ScheduleTriggeredPayload {
            schedule_id: schedule.id.clone(),
            schedule_name: None,
            original_request: schedule.original_request.clone(),
            payload: schedule.payload.clone(),
        });
        self.inner.emitter.emit_with_band(event, EventPriorityBand::Normal);

        schedule.occurrences += 1;
        schedule.last_run = Some(Utc::now());
        schedule.updated_at = Utc::now();

        let exhausted = schedule
            .max_occurrences
            .map(|max| schedule.occurrences >= max)
            .unwrap_or(false);
        let recurs = !exhausted && schedule.pattern.is_some();

        if recurs {
            schedule.status = ScheduleStatus::Firing;
            schedule = self.inner.storage.update_schedule(schedule).await?;
        } else {
            schedule.status = ScheduleStatus::Completed;
        }

        if recurs {
            let pattern = schedule.pattern.clone().expect("recurs implies pattern");
            let timezone = self.inner.config.default_timezone;
            match interpret(self.inner.driver_factory.as_ref(), Utc::now(), timezone, &pattern).await {
                Ok(interpretation) => {
                    schedule.next_run = interpretation.next;
                    schedule.pattern = interpretation.pattern.or(Some(pattern));
                    schedule.status = ScheduleStatus::Active;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to re-interpret recurring schedule; marking completed");
                    schedule.status = ScheduleStatus::Completed;
                }
            }
        }

        let schedule = self.inner.storage.update_schedule(schedule).await?;
        if schedule.status == ScheduleStatus::Active {
            self.arm_if_near(&schedule);
        }
        Ok(())
    }

    /// Arms a one-shot timer when the schedule's `next_run` is within
    /// `max_timer_delay`; otherwise leaves it to the global sweep.
    fn arm_if_near(&self, schedule: &Schedule) {
        let now = Utc::now();
        let delay = (schedule.next_run - now).to_std().unwrap_or(std::time::Duration::ZERO);
        if delay > self.inner.config.max_timer_delay {
            return;
        }

        let scheduler = self.clone();
        let schedule_id = schedule.id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.on_timer_fired(&schedule_id).await;
        });
        self.inner.timers.lock().insert(schedule.id.clone(), handle);
    }

    async fn on_timer_fired(&self, schedule_id: &str) {
        self.inner.timers.lock().remove(schedule_id);
        let schedules = match self
            .inner
            .storage
            .search_schedules(&ScheduleFilter::default())
            .await
        {
            Ok(schedules) => schedules,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load schedule on timer fire");
                return;
            }
        };
        let Some(schedule) = schedules.into_iter().find(|s| s.id == schedule_id) else {
            return;
        };
        if schedule.status != ScheduleStatus::Active || schedule.next_run > Utc::now() {
            return;
        }
        if let Err(err) = self.fire(schedule).await {
            tracing::warn!(error = %err, "failed to fire schedule");
        }
    }

    /// Fires any active schedule whose `next_run` has passed and which
    /// has no live timer — the global 60s fallback.
    #[tracing::instrument(skip(self))]
    async fn run_sweep_once(&self) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let active = self
            .inner
            .storage
            .search_schedules(&ScheduleFilter {
                status: Some(ScheduleStatus::Active),
                dedupe_key: None,
            })
            .await?;
        for schedule in active {
            if schedule.next_run > now {
                continue;
            }
            if self.inner.timers.lock().contains_key(&schedule.id) {
                continue;
            }
            if let Err(err) = self.fire(schedule).await {
                tracing::warn!(error = %err, "sweep failed to fire schedule");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverResponse, FakeDriver, FakeDriverFactory};
    use crate::storage::InMemoryStorage;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn harness(responses: Vec<DriverResponse>) -> (Scheduler, mpsc::UnboundedReceiver<(SystemEvent, EventPriorityBand)>) {
        let storage = Arc::new(InMemoryStorage::new());
        let driver_factory = Arc::new(FakeDriverFactory::new(FakeDriver::new(responses)));
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = EventEmitter::new(tx);
        let scheduler = Scheduler::new(storage, driver_factory, emitter, SchedulerConfig::default());
        (scheduler, rx)
    }

    fn future_response(seconds_from_now: i64) -> DriverResponse {
        let next = Utc::now() + chrono::Duration::seconds(seconds_from_now);
        DriverResponse {
            content: "ok".into(),
            structured_output: Some(json!({
                "next": next.to_rfc3339(),
                "interpretation": "soon"
            })),
        }
    }

    #[tokio::test]
    async fn schedule_persists_and_arms_timer() {
        let (scheduler, _rx) = harness(vec![future_response(3600)]);
        let outcome = scheduler
            .schedule("tomorrow at noon", json!({"tag": "t"}), ScheduleOptions::default())
            .await
            .unwrap();

        let listed = scheduler.list(&ScheduleListFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, outcome.schedule_id);
        assert_eq!(listed[0].status, ScheduleStatus::Active);
    }

    #[tokio::test]
    async fn past_next_run_fires_immediately() {
        let (scheduler, mut rx) = harness(vec![future_response(-10)]);
        let outcome = scheduler
            .schedule("yesterday", json!({"tag": "t"}), ScheduleOptions::default())
            .await
            .unwrap();

        let (event, _band) = rx.recv().await.unwrap();
        match event {
            SystemEvent::ScheduleTriggered(payload) => {
                assert_eq!(payload.schedule_id, outcome.schedule_id);
            }
            _ => panic!("expected ScheduleTriggered"),
        }

        let listed = scheduler.list(&ScheduleListFilter::default()).await.unwrap();
        assert_eq!(listed[0].status, ScheduleStatus::Completed);
        assert_eq!(listed[0].occurrences, 1);
    }

    #[tokio::test]
    async fn cancel_twice_returns_true_then_false() {
        let (scheduler, _rx) = harness(vec![future_response(3600)]);
        let outcome = scheduler
            .schedule("later", json!({}), ScheduleOptions::default())
            .await
            .unwrap();

        assert!(scheduler.cancel(&outcome.schedule_id).await.unwrap());
        assert!(!scheduler.cancel(&outcome.schedule_id).await.unwrap());
    }

    #[tokio::test]
    async fn dedupe_key_leaves_exactly_one_active_schedule() {
        let (scheduler, _rx) = harness(vec![future_response(3600), future_response(7200)]);
        let options = ScheduleOptions {
            dedupe_key: Some("daily-digest".to_string()),
            ..Default::default()
        };
        let first = scheduler
            .schedule("every day", json!({}), options.clone())
            .await
            .unwrap();
        let second = scheduler
            .schedule("every day", json!({}), options)
            .await
            .unwrap();

        let active = scheduler
            .list(&ScheduleListFilter {
                status: Some(ScheduleStatus::Active),
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.schedule_id);
        assert_ne!(first.schedule_id, second.schedule_id);
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_e_schedule_recurrence() {
        let responses = vec![
            future_response(60),
            future_response(60),
            future_response(60),
            future_response(60),
        ];
        let (scheduler, mut rx) = harness(responses);
        let options = ScheduleOptions {
            max_occurrences: Some(3),
            ..Default::default()
        };
        scheduler
            .schedule("every minute", json!({"tag": "t"}), options)
            .await
            .unwrap();
        scheduler.start().await.unwrap();

        for _ in 0..3 {
            tokio::time::advance(std::time::Duration::from_secs(61)).await;
            let _ = rx.recv().await.unwrap();
        }

        let listed = scheduler.list(&ScheduleListFilter::default()).await.unwrap();
        assert_eq!(listed[0].status, ScheduleStatus::Completed);
        assert_eq!(listed[0].occurrences, 3);
        scheduler.stop().await;
    }
}
