//! The per-execution bundle passed to a workflow's executor, and the
//! scoped emitter it uses to publish further events.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::driver::{Driver, DriverCriteria, DriverError, DriverFactory};
use crate::event::{EventPriorityBand, SystemEvent};
use crate::recorder::Recorder;
use crate::storage::Storage;

/// The per-execution bundle: state, storage, driver factory, recorder.
///
/// Logically read-only to the workflow body: a workflow returns a new
/// `state` in its [`super::definition::WorkflowResult`] rather than
/// mutating this one in place.
#[derive(Clone)]
pub struct WorkflowContext {
    pub state: String,
    pub storage: Arc<dyn Storage>,
    driver_factory: Arc<dyn DriverFactory>,
    pub recorder: Recorder,
}

impl WorkflowContext {
    pub fn new(
        state: String,
        storage: Arc<dyn Storage>,
        driver_factory: Arc<dyn DriverFactory>,
        recorder: Recorder,
    ) -> Self {
        Self {
            state,
            storage,
            driver_factory,
            recorder,
        }
    }

    /// Capability-based LLM driver factory, per §3.3.
    pub async fn create_driver(&self, criteria: &DriverCriteria) -> Result<Arc<dyn Driver>, DriverError> {
        self.driver_factory.create_driver(criteria).await
    }

    /// Returns a copy of this context with a new state value, leaving
    /// storage/driver factory/recorder untouched.
    pub fn with_state(&self, state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            storage: self.storage.clone(),
            driver_factory: self.driver_factory.clone(),
            recorder: self.recorder.clone(),
        }
    }
}

/// A typed channel from a running workflow back into the event bus.
///
/// Events emitted here are enqueued in call order but become eligible
/// for resolution only once the emitting workflow completes (§8 invariant
/// 6), which the engine enforces by draining the channel after the
/// executor future resolves rather than forwarding eagerly.
#[derive(Clone)]
pub struct EventEmitter {
    sender: UnboundedSender<(SystemEvent, EventPriorityBand)>,
}

impl EventEmitter {
    pub fn new(sender: UnboundedSender<(SystemEvent, EventPriorityBand)>) -> Self {
        Self { sender }
    }

    /// Emits an event at the default (`Normal`) priority band.
    pub fn emit(&self, event: SystemEvent) {
        self.emit_with_band(event, EventPriorityBand::default());
    }

    pub fn emit_with_band(&self, event: SystemEvent, band: EventPriorityBand) {
        // The receiving end (the engine's pending-emission buffer) always
        // outlives workflow executions; a send failure here would mean
        // the engine itself has already shut down, which callers cannot
        // act on, so it is dropped rather than surfaced.
        let _ = self.sender.send((event, band));
    }
}
