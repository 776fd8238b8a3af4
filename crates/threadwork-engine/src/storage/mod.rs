//! Storage interface consumed by the engine.
//!
//! Typed CRUD+search over issues, flows, knowledge, pond entries, the
//! shared state document, and schedules. The engine treats `search`
//! results opaquely and assumes no read-your-writes consistency, so it
//! re-reads whenever it needs a refreshed value.
//!
//! The concrete backend (a content-addressable vector/document store in
//! production) is out of scope; only the interface and an in-memory
//! reference implementation for tests live here.

mod memory;

pub use memory::InMemoryStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::scheduler::Schedule;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// A persisted issue. The engine treats the body as an opaque JSON value;
/// only storage and workflow bodies interpret its shape.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Issue {
    pub id: String,
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Flow {
    pub id: String,
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Knowledge {
    pub id: String,
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PondEntry {
    pub id: String,
    pub body: Value,
    pub created_at: DateTime<Utc>,
}

/// A free-text search query. Backed by a vector store in practice; the
/// engine is agnostic to how matches are ranked.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filter used by the scheduler's schedule search.
#[derive(Debug, Clone, Default)]
pub struct ScheduleFilter {
    pub status: Option<crate::scheduler::ScheduleStatus>,
    pub dedupe_key: Option<String>,
}

#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // -- Issues ---------------------------------------------------------
    async fn get_issue(&self, id: &str) -> Result<Option<Issue>, StorageError>;
    async fn search_issues(&self, query: &SearchQuery) -> Result<Vec<Issue>, StorageError>;
    async fn create_issue(&self, body: Value) -> Result<Issue, StorageError>;
    async fn update_issue(&self, id: &str, body: Value) -> Result<Issue, StorageError>;

    // -- Flows ------------------------------------------------------------
    async fn get_flow(&self, id: &str) -> Result<Option<Flow>, StorageError>;
    async fn search_flows(&self, query: &SearchQuery) -> Result<Vec<Flow>, StorageError>;
    async fn create_flow(&self, body: Value) -> Result<Flow, StorageError>;
    async fn update_flow(&self, id: &str, body: Value) -> Result<Flow, StorageError>;

    // -- Pond ---------------------------------------------------------------
    async fn search_pond(&self, query: &SearchQuery) -> Result<Vec<PondEntry>, StorageError>;
    async fn add_pond_entry(&self, body: Value) -> Result<PondEntry, StorageError>;

    // -- Knowledge ------------------------------------------------------
    async fn get_knowledge(&self, id: &str) -> Result<Option<Knowledge>, StorageError>;
    async fn search_knowledge(&self, query: &SearchQuery) -> Result<Vec<Knowledge>, StorageError>;
    async fn create_knowledge(&self, body: Value) -> Result<Knowledge, StorageError>;
    async fn update_knowledge(&self, id: &str, body: Value) -> Result<Knowledge, StorageError>;

    // -- State document -------------------------------------------------
    async fn get_state_document(&self) -> Result<Option<String>, StorageError>;
    async fn update_state_document(&self, state: String) -> Result<(), StorageError>;

    // -- Schedules (used only by the scheduler) --------------------------
    async fn insert_schedule(&self, schedule: Schedule) -> Result<Schedule, StorageError>;
    async fn update_schedule(&self, schedule: Schedule) -> Result<Schedule, StorageError>;
    async fn search_schedules(
        &self,
        filter: &ScheduleFilter,
    ) -> Result<Vec<Schedule>, StorageError>;
}
