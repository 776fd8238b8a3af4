//! Workflow definitions: the registered descriptors the resolver matches
//! events against and the engine invokes.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::event::SystemEvent;

use super::context::WorkflowContext;

/// An error produced by a workflow execution.
///
/// Mirrors the teacher crate's `WorkflowError`: a message plus an optional
/// machine-readable code, with no implication of retryability (that
/// decision belongs to the queue, not the error).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct WorkflowError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl WorkflowError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for WorkflowError {}

/// The outcome of one workflow execution.
///
/// `context` carries the (possibly updated) state the engine will commit
/// when `success` is true; a workflow that never intends to change state
/// returns the context unchanged.
pub struct WorkflowResult {
    pub success: bool,
    pub context: WorkflowContext,
    pub output: Option<Value>,
    pub error: Option<WorkflowError>,
}

impl WorkflowResult {
    pub fn success(context: WorkflowContext, output: Option<Value>) -> Self {
        Self {
            success: true,
            context,
            output,
            error: None,
        }
    }

    pub fn failure(context: WorkflowContext, error: WorkflowError) -> Self {
        Self {
            success: false,
            context,
            output: None,
            error: Some(error),
        }
    }
}

/// A boxed future, since trait-object executors can't use `async fn`
/// directly.
pub type ExecutorFuture = Pin<Box<dyn Future<Output = WorkflowResult> + Send>>;

/// The executor capability: `(event, context, emitter) -> WorkflowResult`.
pub type Executor =
    Arc<dyn Fn(SystemEvent, WorkflowContext, super::context::EventEmitter) -> ExecutorFuture + Send + Sync>;

/// A side-effect-free, fast predicate over an event.
pub type Condition = Arc<dyn Fn(&SystemEvent) -> bool + Send + Sync>;

/// What triggers a workflow and at what priority it is enqueued.
#[derive(Clone)]
pub struct Triggers {
    pub event_types: HashSet<&'static str>,
    pub condition: Option<Condition>,
    pub priority: i32,
}

/// A registered workflow descriptor: name, triggers, and executor.
#[derive(Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: String,
    pub triggers: Triggers,
    pub executor: Executor,
}

impl fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("event_types", &self.triggers.event_types)
            .field("priority", &self.triggers.priority)
            .field("has_condition", &self.triggers.condition.is_some())
            .finish()
    }
}

impl WorkflowDefinition {
    /// Starts building a definition. `triggers.priority` is required (see
    /// §9 Open Questions: the source's priority defaults were ambiguous
    /// across duplicated workflows, so this implementation makes priority
    /// mandatory rather than defaulting it). The builder only exposes
    /// `.build()` once `.priority(..)` has been called.
    pub fn builder(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> WorkflowDefinitionBuilder {
        WorkflowDefinitionBuilder {
            name: name.into(),
            description: description.into(),
            event_types: HashSet::new(),
            condition: None,
        }
    }
}

/// Builder stage before a priority has been set. Only `.priority(..)`
/// (and the event-type accumulators) are available here.
pub struct WorkflowDefinitionBuilder {
    name: String,
    description: String,
    event_types: HashSet<&'static str>,
    condition: Option<Condition>,
}

impl WorkflowDefinitionBuilder {
    pub fn on_event(mut self, event_type: &'static str) -> Self {
        self.event_types.insert(event_type);
        self
    }

    pub fn on_events(mut self, event_types: impl IntoIterator<Item = &'static str>) -> Self {
        self.event_types.extend(event_types);
        self
    }

    pub fn condition(mut self, condition: impl Fn(&SystemEvent) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Sets the priority, unlocking `.build(..)`.
    pub fn priority(self, priority: i32) -> WorkflowDefinitionReady {
        WorkflowDefinitionReady {
            name: self.name,
            description: self.description,
            event_types: self.event_types,
            condition: self.condition,
            priority,
        }
    }
}

/// Builder stage once a priority has been set.
pub struct WorkflowDefinitionReady {
    name: String,
    description: String,
    event_types: HashSet<&'static str>,
    condition: Option<Condition>,
    priority: i32,
}

impl WorkflowDefinitionReady {
    pub fn condition(mut self, condition: impl Fn(&SystemEvent) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn on_event(mut self, event_type: &'static str) -> Self {
        self.event_types.insert(event_type);
        self
    }

    /// Finishes the definition. Panics if no event types were registered,
    /// matching the invariant that `eventTypes` must be non-empty.
    pub fn build(
        self,
        executor: impl Fn(SystemEvent, WorkflowContext, super::context::EventEmitter) -> ExecutorFuture
            + Send
            + Sync
            + 'static,
    ) -> WorkflowDefinition {
        assert!(
            !self.event_types.is_empty(),
            "workflow '{}' must trigger on at least one event type",
            self.name
        );
        WorkflowDefinition {
            name: self.name,
            description: self.description,
            triggers: Triggers {
                event_types: self.event_types,
                condition: self.condition,
                priority: self.priority,
            },
            executor: Arc::new(executor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_error_display_with_code() {
        let err = WorkflowError::new("boom").with_code("E_BOOM");
        assert_eq!(err.to_string(), "[E_BOOM] boom");
    }

    #[test]
    fn workflow_error_display_without_code() {
        let err = WorkflowError::new("boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    #[should_panic(expected = "must trigger on at least one event type")]
    fn build_without_event_types_panics() {
        WorkflowDefinition::builder("noop", "does nothing")
            .priority(0)
            .build(|_event, context, _emitter| Box::pin(async move { WorkflowResult::success(context, None) }));
    }

    #[test]
    fn builder_requires_priority_before_build_at_compile_time() {
        // This test exists to document the typestate invariant: the
        // expression below would not compile without `.priority(..)`
        // first, since `.build(..)` only exists on `WorkflowDefinitionReady`.
        let def = WorkflowDefinition::builder("demo", "demo workflow")
            .on_event("DATA_ARRIVED")
            .priority(10)
            .build(|_event, context, _emitter| Box::pin(async move { WorkflowResult::success(context, None) }));
        assert_eq!(def.triggers.priority, 10);
        assert_eq!(def.name, "demo");
    }
}
