//! # Threadwork Engine
//!
//! An event-driven workflow engine: a typed event bus feeds a priority
//! resolver, which fans events out to registered workflows through a
//! bounded-concurrency dispatcher backed by a single shared state
//! document.
//!
//! ## Features
//!
//! - **Typed event catalog**: a closed, serde-tagged `SystemEvent` union
//!   covering issue/flow/knowledge/schedule lifecycles
//! - **Priority resolution**: predicate-filtered, priority-ordered
//!   dispatch with panic-safe predicate evaluation
//! - **Bespoke retry policy**: priority-decrementing retries capped at
//!   three attempts, distinct from exponential backoff
//! - **Natural-language scheduling**: NL requests interpreted into
//!   absolute instants via a pluggable driver, fired by timer or sweep
//! - **Pluggable storage and LLM driver traits**, with in-memory/fake
//!   reference implementations for tests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         EventQueue                            │
//! │        (priority bands: high > normal > low, FIFO within)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  WorkflowResolver / Registry                 │
//! │   (match event type, filter by predicate, sort by priority)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorkflowQueue                         │
//! │   (priority descending, FIFO within priority, retry policy)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Engine / Dispatcher                     │
//! │  (bounded concurrency, single-writer state, emitted events    │
//! │   loop back into the EventQueue once their workflow completes)│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use threadwork_engine::prelude::*;
//!
//! let engine = Engine::new(storage, driver_factory, EngineConfig::default());
//! engine.register_workflow(
//!     WorkflowDefinition::builder("notify_on_issue", "pings on new issues")
//!         .on_event("ISSUE_CREATED")
//!         .priority(50)
//!         .build(|_event, context, _emitter| {
//!             Box::pin(async move { WorkflowResult::success(context, None) })
//!         }),
//! );
//! engine.start().await?;
//! ```

pub mod driver;
pub mod engine;
pub mod event;
pub mod queue;
pub mod recorder;
pub mod scheduler;
pub mod storage;
pub mod workflow;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::driver::{Driver, DriverCriteria, DriverError, DriverFactory, DriverResponse, QueryOptions};
    pub use crate::engine::{Engine, EngineConfig, EngineError};
    pub use crate::event::{EventPriorityBand, SystemEvent};
    pub use crate::queue::{EventQueue, QueueStats, WorkflowQueue};
    pub use crate::recorder::{Recorder, RecorderEntry, RecorderEntryType, RecorderSink};
    pub use crate::scheduler::{Schedule, ScheduleOptions, ScheduleOutcome, Scheduler, SchedulerConfig};
    pub use crate::storage::{InMemoryStorage, SearchQuery, Storage, StorageError};
    pub use crate::workflow::{
        EventEmitter, WorkflowContext, WorkflowDefinition, WorkflowError, WorkflowRegistry,
        WorkflowResolver, WorkflowResult,
    };
}
