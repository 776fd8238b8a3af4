//! The dispatcher: owns the event queue, workflow queue, shared state
//! document, registry, storage, and driver factory, and runs the main
//! pop-resolve-enqueue-drain loop (§4.4).

use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex as SyncMutex, RwLock as SyncRwLock};
use serde_json::Value;
use tokio::sync::{mpsc, watch, RwLock, Semaphore};
use tokio::task::JoinHandle;

use crate::driver::DriverFactory;
use crate::event::{
    DataArrivedPayload, EventPriorityBand, IssueCreatedPayload, IssueUpdateDelta,
    IssueUpdatedPayload, KnowledgeCreatedPayload, SystemEvent,
};
use crate::queue::{EventQueue, NewQueueItem, QueueItem, WorkflowQueue};
use crate::recorder::{Recorder, RecorderEntryType};
use crate::scheduler::Scheduler;
use crate::storage::{Issue, Knowledge, PondEntry, SearchQuery, Storage};
use crate::workflow::{
    EventEmitter, WorkflowContext, WorkflowDefinition, WorkflowError, WorkflowRegistry,
    WorkflowResolver,
};

use super::config::EngineConfig;
use super::error::EngineError;

struct Inner {
    config: EngineConfig,
    storage: Arc<dyn Storage>,
    driver_factory: Arc<dyn DriverFactory>,
    registry: SyncRwLock<WorkflowRegistry>,
    event_queue: EventQueue,
    workflow_queue: SyncMutex<WorkflowQueue>,
    state: RwLock<String>,
    semaphore: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: SyncMutex<Option<JoinHandle<()>>>,
}

/// The single-writer event-driven dispatcher. Cheap to clone: internally
/// `Arc`'d, matching the teacher's `WorkerPool` handle idiom.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(storage: Arc<dyn Storage>, driver_factory: Arc<dyn DriverFactory>, config: EngineConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let concurrency = config.max_concurrent_workflows;
        Self {
            inner: Arc::new(Inner {
                config,
                storage,
                driver_factory,
                registry: SyncRwLock::new(WorkflowRegistry::new()),
                event_queue: EventQueue::new(),
                workflow_queue: SyncMutex::new(WorkflowQueue::new()),
                state: RwLock::new(String::new()),
                semaphore: Arc::new(Semaphore::new(concurrency)),
                shutdown_tx,
                loop_handle: SyncMutex::new(None),
            }),
        }
    }

    /// A scheduler sharing this engine's storage, driver factory, and
    /// event emission path.
    pub fn scheduler(&self, config: crate::scheduler::SchedulerConfig) -> Scheduler {
        Scheduler::new(
            self.inner.storage.clone(),
            self.inner.driver_factory.clone(),
            self.event_emitter(),
            config,
        )
    }

    pub fn register_workflow(&self, def: WorkflowDefinition) {
        self.inner.registry.write().register(def);
    }

    /// Connects to storage and loads the persisted state document, then
    /// starts the dispatch loop. Refuses to start rather than run with an
    /// unreachable backing store (§7).
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<(), EngineError> {
        let persisted = self
            .inner
            .storage
            .get_state_document()
            .await
            .map_err(|err| EngineError::StartupFailed(err.into()))?;
        *self.inner.state.write().await = persisted.unwrap_or_default();

        let engine = self.clone();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = engine.inner.event_queue.pop() => {
                        engine.on_event(event).await;
                        engine.drain_workflow_queue().await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
        *self.inner.loop_handle.lock() = Some(handle);
        Ok(())
    }

    pub async fn stop(&self) {
        let _ = self.inner.shutdown_tx.send(true);
        let handle = self.inner.loop_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Pushes an event onto the inbound queue. Fails fast rather than
    /// blocking when a capacity is configured and the queue is full (§7).
    pub fn emit_event(&self, event: SystemEvent, band: EventPriorityBand) -> Result<(), EngineError> {
        if let Some(capacity) = self.inner.config.event_queue_capacity {
            if self.inner.event_queue.len() >= capacity {
                return Err(EngineError::QueueFull(capacity));
            }
        }
        self.inner.event_queue.push(event, band);
        Ok(())
    }

    fn event_emitter(&self) -> EventEmitter {
        let (tx, mut rx) = mpsc::unbounded_channel::<(SystemEvent, EventPriorityBand)>();
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some((event, band)) = rx.recv().await {
                let _ = engine.emit_event(event, band);
            }
        });
        EventEmitter::new(tx)
    }

    // -- pass-throughs (§4.4) --------------------------------------------

    pub async fn create_input(
        &self,
        source: impl Into<String>,
        content: Value,
        format: Option<String>,
    ) -> Result<PondEntry, EngineError> {
        let source = source.into();
        let entry = self
            .inner
            .storage
            .add_pond_entry(serde_json::json!({
                "source": source,
                "content": content,
                "format": format,
            }))
            .await?;
        self.emit_event(
            SystemEvent::DataArrived(DataArrivedPayload {
                source,
                content: entry.body.clone(),
                format: None,
                pond_entry_id: entry.id.clone(),
                timestamp: Utc::now(),
            }),
            EventPriorityBand::Normal,
        )?;
        Ok(entry)
    }

    pub async fn add_to_pond(&self, body: Value) -> Result<PondEntry, EngineError> {
        Ok(self.inner.storage.add_pond_entry(body).await?)
    }

    pub async fn create_issue(&self, body: Value, created_by: impl Into<String>) -> Result<Issue, EngineError> {
        let issue = self.inner.storage.create_issue(body).await?;
        self.emit_event(
            SystemEvent::IssueCreated(IssueCreatedPayload {
                issue_id: issue.id.clone(),
                issue: issue.body.clone(),
                created_by: created_by.into(),
                source_workflow: None,
            }),
            EventPriorityBand::Normal,
        )?;
        Ok(issue)
    }

    pub async fn update_issue(
        &self,
        id: &str,
        body: Value,
        updated_by: impl Into<String>,
    ) -> Result<Issue, EngineError> {
        let before = self.inner.storage.get_issue(id).await?.map(|issue| issue.body);
        let issue = self.inner.storage.update_issue(id, body).await?;
        let before = before.unwrap_or(Value::Null);
        let changed_fields = diff_top_level_keys(&before, &issue.body);
        self.emit_event(
            SystemEvent::IssueUpdated(IssueUpdatedPayload {
                issue_id: issue.id.clone(),
                updates: IssueUpdateDelta {
                    before,
                    after: issue.body.clone(),
                    changed_fields,
                },
                updated_by: updated_by.into(),
            }),
            EventPriorityBand::Normal,
        )?;
        Ok(issue)
    }

    pub async fn create_knowledge(
        &self,
        body: Value,
        source_workflow: impl Into<String>,
        extracted_from: crate::event::ExtractedFrom,
    ) -> Result<Knowledge, EngineError> {
        let knowledge = self.inner.storage.create_knowledge(body).await?;
        self.emit_event(
            SystemEvent::KnowledgeCreated(KnowledgeCreatedPayload {
                knowledge_id: knowledge.id.clone(),
                knowledge: knowledge.body.clone(),
                source_workflow: source_workflow.into(),
                extracted_from,
            }),
            EventPriorityBand::Normal,
        )?;
        Ok(knowledge)
    }

    pub async fn update_knowledge(&self, id: &str, body: Value) -> Result<Knowledge, EngineError> {
        Ok(self.inner.storage.update_knowledge(id, body).await?)
    }

    pub async fn search_pond(&self, query: &SearchQuery) -> Result<Vec<PondEntry>, EngineError> {
        Ok(self.inner.storage.search_pond(query).await?)
    }

    pub async fn search_issues(&self, query: &SearchQuery) -> Result<Vec<Issue>, EngineError> {
        Ok(self.inner.storage.search_issues(query).await?)
    }

    pub async fn search_knowledge(&self, query: &SearchQuery) -> Result<Vec<Knowledge>, EngineError> {
        Ok(self.inner.storage.search_knowledge(query).await?)
    }

    pub async fn get_state(&self) -> String {
        self.inner.state.read().await.clone()
    }

    pub async fn update_state(&self, state: impl Into<String>) -> Result<(), EngineError> {
        let state = state.into();
        self.inner.storage.update_state_document(state.clone()).await?;
        *self.inner.state.write().await = state;
        Ok(())
    }

    pub async fn append_to_state(&self, suffix: &str) -> Result<(), EngineError> {
        let mut guard = self.inner.state.write().await;
        if !guard.is_empty() {
            guard.push(' ');
        }
        guard.push_str(suffix);
        self.inner.storage.update_state_document(guard.clone()).await?;
        Ok(())
    }

    // -- dispatch loop internals -----------------------------------------

    #[tracing::instrument(skip(self, event), fields(event_type = event.event_type()))]
    async fn on_event(&self, event: SystemEvent) {
        let registry = self.inner.registry.read();
        let resolution = WorkflowResolver::resolve(&registry, &event);
        let mut workflow_queue = self.inner.workflow_queue.lock();
        for def in resolution.workflows {
            workflow_queue.enqueue(NewQueueItem {
                workflow_name: def.name.clone(),
                event: event.clone(),
                priority: def.triggers.priority,
            });
        }
    }

    /// Drains as many pending workflow-queue items as the concurrency
    /// semaphore allows, spawning each as an independent task.
    async fn drain_workflow_queue(&self) {
        loop {
            let permit = match self.inner.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let item = self.inner.workflow_queue.lock().dequeue();
            let Some(item) = item else {
                drop(permit);
                break;
            };
            let engine = self.clone();
            tokio::spawn(async move {
                engine.execute_item(item).await;
                drop(permit);
                // Frees a concurrency slot: pull in whatever is next,
                // since draining otherwise only happens on event arrival
                // and pending items (including retries) must not wait on
                // the next unrelated event to be picked up.
                engine.drain_workflow_queue().await;
            });
        }
    }

    async fn execute_item(&self, item: QueueItem) {
        let def = self.inner.registry.read().get_by_name(&item.workflow_name).cloned();
        let Some(def) = def else {
            tracing::warn!(workflow = %item.workflow_name, "workflow vanished from registry before execution");
            let mut queue = self.inner.workflow_queue.lock();
            let _ = queue.mark_completed(item.id, false);
            return;
        };

        let state = self.inner.state.read().await.clone();
        let execution_id = format!("{}-{}", item.workflow_name, item.id);
        let recorder = Recorder::new(execution_id, item.workflow_name.clone());
        let context = WorkflowContext::new(
            state,
            self.inner.storage.clone(),
            self.inner.driver_factory.clone(),
            recorder.clone(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let emitter = EventEmitter::new(tx);

        recorder.record(
            RecorderEntryType::Input,
            serde_json::to_value(&item.event).unwrap_or(Value::Null),
        );

        let future = (def.executor)(item.event.clone(), context, emitter);
        let outcome = match self.inner.config.workflow_timeout {
            Some(timeout) => tokio::time::timeout(timeout, future).await.ok(),
            None => Some(future.await),
        };

        while let Ok((event, band)) = rx.try_recv() {
            self.inner.event_queue.push(event, band);
        }

        match outcome {
            Some(result) if result.success => {
                recorder.record(
                    RecorderEntryType::Output,
                    result.output.clone().unwrap_or(Value::Null),
                );
                *self.inner.state.write().await = result.context.state.clone();
                let mut queue = self.inner.workflow_queue.lock();
                let _ = queue.mark_completed(item.id, true);
            }
            Some(result) => {
                let error = result
                    .error
                    .clone()
                    .unwrap_or_else(|| WorkflowError::new("workflow failed with no error detail"));
                recorder.record(
                    RecorderEntryType::Error,
                    serde_json::to_value(&error).unwrap_or(Value::Null),
                );
                self.retry_or_fail(item.id);
            }
            None => {
                recorder.record(
                    RecorderEntryType::Error,
                    serde_json::json!({"error": "workflow execution timed out"}),
                );
                self.retry_or_fail(item.id);
            }
        }
    }

    fn retry_or_fail(&self, id: u64) {
        let mut queue = self.inner.workflow_queue.lock();
        match queue.retry(id) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(id, "workflow exhausted retries and is now terminally failed"),
            Err(err) => tracing::warn!(id, error = %err, "failed to retry workflow queue item"),
        }
    }
}

fn diff_top_level_keys(before: &Value, after: &Value) -> Vec<String> {
    let (Value::Object(before), Value::Object(after)) = (before, after) else {
        return Vec::new();
    };
    let mut changed: Vec<String> = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect();
    changed.sort();
    changed
}
