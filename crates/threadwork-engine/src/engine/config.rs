use std::time::Duration;

/// Tuning knobs for the [`super::Engine`], following the teacher crate's
/// `with_*` builder convention (`ActivityOptions`, `WorkerPoolConfig`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Bounded concurrency for in-flight workflow executions. Default 1
    /// for determinism (§5); raise for throughput at the cost of
    /// last-writer-wins ordering becoming less predictable.
    pub max_concurrent_workflows: usize,
    /// `None` (default) leaves the inbound event queue unbounded.
    /// `Some(n)` makes `emit_event` fail fast rather than block once the
    /// queue holds `n` events.
    pub event_queue_capacity: Option<usize>,
    /// `None` (default) leaves workflow executions unbounded; the AI
    /// driver inside a workflow typically bounds itself.
    #[serde(with = "duration_opt_millis")]
    pub workflow_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: 1,
            event_queue_capacity: None,
            workflow_timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrent_workflows(mut self, n: usize) -> Self {
        self.max_concurrent_workflows = n.max(1);
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = Some(capacity);
        self
    }

    pub fn with_workflow_timeout(mut self, timeout: Duration) -> Self {
        self.workflow_timeout = Some(timeout);
        self
    }
}

mod duration_opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_millis()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
