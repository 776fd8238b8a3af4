//! Workflow abstractions: the contract between the engine and the
//! business logic it dispatches to.
//!
//! - [`WorkflowDefinition`] — a registered descriptor (name, triggers, executor).
//! - [`WorkflowContext`] / [`EventEmitter`] — the per-execution bundle and
//!   its scoped outbound channel.
//! - [`WorkflowRegistry`] — holds definitions, indexed by trigger event type.
//! - [`WorkflowResolver`] — resolves one event to an ordered workflow list.

pub mod context;
pub mod definition;
pub mod registry;
pub mod resolver;

pub use context::{EventEmitter, WorkflowContext};
pub use definition::{
    Condition, Executor, ExecutorFuture, Triggers, WorkflowDefinition, WorkflowDefinitionBuilder,
    WorkflowDefinitionReady, WorkflowError, WorkflowResult,
};
pub use registry::WorkflowRegistry;
pub use resolver::{Resolution, WorkflowResolver};
