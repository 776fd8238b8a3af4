//! In-memory [`Storage`] implementation used by the engine's own tests.
//!
//! This is a reference fixture, not a production backend: the production
//! backend is a content-addressable vector/document store and is out of
//! scope for this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use crate::scheduler::Schedule;

use super::{
    Flow, Issue, Knowledge, PondEntry, ScheduleFilter, SearchQuery, Storage, StorageError,
};

#[derive(Default)]
pub struct InMemoryStorage {
    issues: RwLock<HashMap<String, Issue>>,
    flows: RwLock<HashMap<String, Flow>>,
    knowledge: RwLock<HashMap<String, Knowledge>>,
    pond: RwLock<HashMap<String, PondEntry>>,
    state: RwLock<Option<String>>,
    schedules: RwLock<HashMap<String, Schedule>>,
    next_id: AtomicU64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{n}")
    }

    fn matches(text: &str, query: &SearchQuery) -> bool {
        query.text.is_empty() || text.to_lowercase().contains(&query.text.to_lowercase())
    }

    /// Test helper: returns the current state document without going
    /// through the async trait.
    pub fn snapshot_state(&self) -> Option<String> {
        self.state.read().clone()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_issue(&self, id: &str) -> Result<Option<Issue>, StorageError> {
        Ok(self.issues.read().get(id).cloned())
    }

    async fn search_issues(&self, query: &SearchQuery) -> Result<Vec<Issue>, StorageError> {
        let issues = self.issues.read();
        let mut matched: Vec<Issue> = issues
            .values()
            .filter(|i| Self::matches(&i.body.to_string(), query))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn create_issue(&self, body: Value) -> Result<Issue, StorageError> {
        let now = Utc::now();
        let issue = Issue {
            id: self.next_id("issue"),
            body,
            created_at: now,
            updated_at: now,
        };
        self.issues.write().insert(issue.id.clone(), issue.clone());
        Ok(issue)
    }

    async fn update_issue(&self, id: &str, body: Value) -> Result<Issue, StorageError> {
        let mut issues = self.issues.write();
        let issue = issues
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("issue {id}")))?;
        issue.body = body;
        issue.updated_at = Utc::now();
        Ok(issue.clone())
    }

    async fn get_flow(&self, id: &str) -> Result<Option<Flow>, StorageError> {
        Ok(self.flows.read().get(id).cloned())
    }

    async fn search_flows(&self, query: &SearchQuery) -> Result<Vec<Flow>, StorageError> {
        let flows = self.flows.read();
        let mut matched: Vec<Flow> = flows
            .values()
            .filter(|f| Self::matches(&f.body.to_string(), query))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn create_flow(&self, body: Value) -> Result<Flow, StorageError> {
        let now = Utc::now();
        let flow = Flow {
            id: self.next_id("flow"),
            body,
            created_at: now,
            updated_at: now,
        };
        self.flows.write().insert(flow.id.clone(), flow.clone());
        Ok(flow)
    }

    async fn update_flow(&self, id: &str, body: Value) -> Result<Flow, StorageError> {
        let mut flows = self.flows.write();
        let flow = flows
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("flow {id}")))?;
        flow.body = body;
        flow.updated_at = Utc::now();
        Ok(flow.clone())
    }

    async fn search_pond(&self, query: &SearchQuery) -> Result<Vec<PondEntry>, StorageError> {
        let pond = self.pond.read();
        let mut matched: Vec<PondEntry> = pond
            .values()
            .filter(|p| Self::matches(&p.body.to_string(), query))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn add_pond_entry(&self, body: Value) -> Result<PondEntry, StorageError> {
        let entry = PondEntry {
            id: self.next_id("pond"),
            body,
            created_at: Utc::now(),
        };
        self.pond.write().insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    async fn get_knowledge(&self, id: &str) -> Result<Option<Knowledge>, StorageError> {
        Ok(self.knowledge.read().get(id).cloned())
    }

    async fn search_knowledge(&self, query: &SearchQuery) -> Result<Vec<Knowledge>, StorageError> {
        let knowledge = self.knowledge.read();
        let mut matched: Vec<Knowledge> = knowledge
            .values()
            .filter(|k| Self::matches(&k.body.to_string(), query))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn create_knowledge(&self, body: Value) -> Result<Knowledge, StorageError> {
        let now = Utc::now();
        let knowledge = Knowledge {
            id: self.next_id("knowledge"),
            body,
            created_at: now,
            updated_at: now,
        };
        self.knowledge
            .write()
            .insert(knowledge.id.clone(), knowledge.clone());
        Ok(knowledge)
    }

    async fn update_knowledge(&self, id: &str, body: Value) -> Result<Knowledge, StorageError> {
        let mut knowledge = self.knowledge.write();
        let k = knowledge
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("knowledge {id}")))?;
        k.body = body;
        k.updated_at = Utc::now();
        Ok(k.clone())
    }

    async fn get_state_document(&self) -> Result<Option<String>, StorageError> {
        Ok(self.state.read().clone())
    }

    async fn update_state_document(&self, state: String) -> Result<(), StorageError> {
        *self.state.write() = Some(state);
        Ok(())
    }

    async fn insert_schedule(&self, schedule: Schedule) -> Result<Schedule, StorageError> {
        self.schedules
            .write()
            .insert(schedule.id.clone(), schedule.clone());
        Ok(schedule)
    }

    async fn update_schedule(&self, schedule: Schedule) -> Result<Schedule, StorageError> {
        let mut schedules = self.schedules.write();
        if !schedules.contains_key(&schedule.id) {
            return Err(StorageError::NotFound(format!("schedule {}", schedule.id)));
        }
        schedules.insert(schedule.id.clone(), schedule.clone());
        Ok(schedule)
    }

    async fn search_schedules(
        &self,
        filter: &ScheduleFilter,
    ) -> Result<Vec<Schedule>, StorageError> {
        let schedules = self.schedules.read();
        let matched = schedules
            .values()
            .filter(|s| {
                filter.status.map(|st| st == s.status).unwrap_or(true)
                    && filter
                        .dedupe_key
                        .as_ref()
                        .map(|dk| s.dedupe_key.as_deref() == Some(dk.as_str()))
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_and_get_issue() {
        let storage = InMemoryStorage::new();
        let issue = storage.create_issue(json!({"title": "bug"})).await.unwrap();
        let fetched = storage.get_issue(&issue.id).await.unwrap().unwrap();
        assert_eq!(fetched.body, json!({"title": "bug"}));
    }

    #[tokio::test]
    async fn update_unknown_issue_errors() {
        let storage = InMemoryStorage::new();
        let result = storage.update_issue("missing", json!({})).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn state_document_round_trip() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get_state_document().await.unwrap(), None);
        storage
            .update_state_document("hello".to_string())
            .await
            .unwrap();
        assert_eq!(
            storage.get_state_document().await.unwrap(),
            Some("hello".to_string())
        );
    }

    #[tokio::test]
    async fn search_pond_filters_by_text() {
        let storage = InMemoryStorage::new();
        storage.add_pond_entry(json!({"text": "apple"})).await.unwrap();
        storage.add_pond_entry(json!({"text": "banana"})).await.unwrap();
        let results = storage
            .search_pond(&SearchQuery::new("apple"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }
}
