//! Per-execution structured trace buffer.
//!
//! A [`Recorder`] is an opaque handle the engine injects into each
//! [`crate::workflow::WorkflowContext`]; it is free to attach sinks
//! (console, persistent log) outside the workflow body's view, per the
//! contract in §4.5.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderEntryType {
    Input,
    Output,
    Error,
    DbQuery,
    AiCall,
    Info,
    Debug,
    Warn,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecorderEntry {
    pub execution_id: String,
    pub workflow_name: String,
    pub entry_type: RecorderEntryType,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

/// An observer attached to a recorder, notified of every entry appended.
///
/// Sinks run outside the workflow body's view: a workflow only ever sees
/// the `Recorder` handle, never its sinks.
pub trait RecorderSink: Send + Sync {
    fn on_entry(&self, entry: &RecorderEntry);
}

/// The default sink: mirrors every entry into `tracing` at a level
/// matching its [`RecorderEntryType`].
pub struct TracingRecorderSink;

impl RecorderSink for TracingRecorderSink {
    fn on_entry(&self, entry: &RecorderEntry) {
        match entry.entry_type {
            RecorderEntryType::Error => {
                tracing::error!(execution_id = %entry.execution_id, workflow = %entry.workflow_name, data = %entry.data, "workflow recorder entry")
            }
            RecorderEntryType::Warn => {
                tracing::warn!(execution_id = %entry.execution_id, workflow = %entry.workflow_name, data = %entry.data, "workflow recorder entry")
            }
            RecorderEntryType::Debug => {
                tracing::debug!(execution_id = %entry.execution_id, workflow = %entry.workflow_name, data = %entry.data, "workflow recorder entry")
            }
            _ => {
                tracing::info!(execution_id = %entry.execution_id, workflow = %entry.workflow_name, entry_type = ?entry.entry_type, data = %entry.data, "workflow recorder entry")
            }
        }
    }
}

/// Append-only structured trace for one execution.
#[derive(Clone)]
pub struct Recorder {
    execution_id: String,
    workflow_name: String,
    buffer: Arc<Mutex<Vec<RecorderEntry>>>,
    sinks: Arc<Vec<Arc<dyn RecorderSink>>>,
}

impl Recorder {
    pub fn new(execution_id: impl Into<String>, workflow_name: impl Into<String>) -> Self {
        Self::with_sinks(
            execution_id,
            workflow_name,
            vec![Arc::new(TracingRecorderSink) as Arc<dyn RecorderSink>],
        )
    }

    pub fn with_sinks(
        execution_id: impl Into<String>,
        workflow_name: impl Into<String>,
        sinks: Vec<Arc<dyn RecorderSink>>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            workflow_name: workflow_name.into(),
            buffer: Arc::new(Mutex::new(Vec::new())),
            sinks: Arc::new(sinks),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn record(&self, entry_type: RecorderEntryType, data: Value) {
        let entry = RecorderEntry {
            execution_id: self.execution_id.clone(),
            workflow_name: self.workflow_name.clone(),
            entry_type,
            timestamp: Utc::now(),
            data,
        };
        for sink in self.sinks.iter() {
            sink.on_entry(&entry);
        }
        self.buffer.lock().push(entry);
    }

    /// Returns a copy of the accumulated entries.
    pub fn get_buffer(&self) -> Vec<RecorderEntry> {
        self.buffer.lock().clone()
    }

    /// Drains and returns the accumulated entries.
    pub fn clear_buffer(&self) -> Vec<RecorderEntry> {
        std::mem::take(&mut *self.buffer.lock())
    }

    /// Releases this recorder. A no-op for the in-process buffer sink;
    /// present so callers have a single place to hook teardown of
    /// externally attached sinks.
    pub fn close(&self) {}
}
