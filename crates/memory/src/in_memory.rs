//! In-memory store — useful for testing and ephemeral sessions.
//!
//! Implements the same claim discipline as the SQLite backend: the status
//! check and the transition happen under one write lock, so concurrent
//! claimers see exactly one winner.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use taskloom_core::error::StorageError;
use taskloom_core::namespace::Namespace;
use taskloom_core::record::{ApprovalRequest, FileChangeEvent, MemoryRecord, ProjectState};
use taskloom_core::store::{ClaimOutcome, RecordStore, TaskStore};
use taskloom_core::task::{ExecutionReport, Task, TaskStatus};
use tokio::sync::RwLock;

/// An in-memory task/record store backed by Vecs.
#[derive(Default)]
pub struct InMemoryStore {
    tasks: Arc<RwLock<Vec<Task>>>,
    records: Arc<RwLock<Vec<MemoryRecord>>>,
    events: Arc<RwLock<Vec<FileChangeEvent>>>,
    approvals: Arc<RwLock<Vec<ApprovalRequest>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert(&self, task: &Task) -> Result<(), StorageError> {
        self.tasks.write().await.push(task.clone());
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, id: &str) -> Result<Option<Task>, StorageError> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .find(|t| t.namespace == *namespace && t.id == id)
            .cloned())
    }

    async fn pending(
        &self,
        namespace: &Namespace,
        to_agent: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Task>, StorageError> {
        let tasks = self.tasks.read().await;
        let mut matching: Vec<Task> = tasks
            .iter()
            .filter(|t| {
                t.namespace == *namespace
                    && t.status == TaskStatus::Pending
                    && to_agent.is_none_or(|a| t.to_agent == a)
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.payload
                .priority
                .cmp(&a.payload.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        matching.truncate(limit);
        Ok(matching)
    }

    async fn claim(&self, namespace: &Namespace, id: &str) -> Result<ClaimOutcome, StorageError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.namespace == *namespace && t.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("task {id}")))?;

        if task.status != TaskStatus::Pending {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        task.status = TaskStatus::InProgress;
        Ok(ClaimOutcome::Claimed(task.clone()))
    }

    async fn complete(
        &self,
        namespace: &Namespace,
        id: &str,
        result: &ExecutionReport,
    ) -> Result<(), StorageError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.namespace == *namespace && t.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("task {id}")))?;

        if task.status != TaskStatus::InProgress {
            return Err(StorageError::NotFound(format!(
                "task {id} is not in_progress"
            )));
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.result = Some(result.clone());
        Ok(())
    }

    async fn fail(
        &self,
        namespace: &Namespace,
        id: &str,
        error: &str,
    ) -> Result<(), StorageError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.namespace == *namespace && t.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("task {id}")))?;

        if task.status != TaskStatus::InProgress {
            return Err(StorageError::NotFound(format!(
                "task {id} is not in_progress"
            )));
        }
        task.status = TaskStatus::Failed;
        task.completed_at = Some(Utc::now());
        task.error = Some(error.to_string());
        Ok(())
    }

    async fn count(
        &self,
        namespace: &Namespace,
        status: Option<TaskStatus>,
    ) -> Result<usize, StorageError> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .filter(|t| t.namespace == *namespace && status.is_none_or(|s| t.status == s))
            .count())
    }

    async fn delete(&self, namespace: &Namespace, id: &str) -> Result<bool, StorageError> {
        let mut tasks = self.tasks.write().await;
        let len_before = tasks.len();
        tasks.retain(|t| !(t.namespace == *namespace && t.id == id));
        Ok(tasks.len() < len_before)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert_record(&self, record: &MemoryRecord) -> Result<i64, StorageError> {
        let mut records = self.records.write().await;
        let latest = records
            .iter()
            .filter(|r| r.namespace == record.namespace && r.file_path == record.file_path)
            .map(|r| r.version)
            .max()
            .unwrap_or(0);

        let mut stored = record.clone();
        stored.version = latest + 1;
        let version = stored.version;
        records.push(stored);
        Ok(version)
    }

    async fn records(
        &self,
        namespace: &Namespace,
        agent: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StorageError> {
        let records = self.records.read().await;
        let mut matching: Vec<MemoryRecord> = records
            .iter()
            .filter(|r| r.namespace == *namespace && agent.is_none_or(|a| r.agent == a))
            .cloned()
            .collect();
        matching.reverse(); // insertion order -> most recent first
        matching.truncate(limit);
        Ok(matching)
    }

    async fn append_event(&self, event: &FileChangeEvent) -> Result<(), StorageError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn events(
        &self,
        namespace: &Namespace,
        limit: usize,
    ) -> Result<Vec<FileChangeEvent>, StorageError> {
        let events = self.events.read().await;
        let mut matching: Vec<FileChangeEvent> = events
            .iter()
            .filter(|e| e.namespace == *namespace)
            .cloned()
            .collect();
        matching.reverse();
        matching.truncate(limit);
        Ok(matching)
    }

    async fn project_state(&self, namespace: &Namespace) -> Result<ProjectState, StorageError> {
        let events = self.events.read().await;
        let records = self.records.read().await;

        let mut paths = std::collections::HashSet::new();
        let mut last_updated = None;
        for event in events.iter().filter(|e| e.namespace == *namespace) {
            paths.insert(event.file_path.clone());
            if last_updated.is_none_or(|t| event.timestamp > t) {
                last_updated = Some(event.timestamp);
            }
        }

        let mut total_records = 0;
        let mut current_phase = None;
        for record in records.iter().filter(|r| r.namespace == *namespace) {
            total_records += 1;
            if last_updated.is_none_or(|t| record.created_at > t) {
                last_updated = Some(record.created_at);
            }
            if let Some(phase) = record.metadata.get("phase").and_then(|v| v.as_str()) {
                current_phase = Some(phase.to_string());
            }
        }

        Ok(ProjectState {
            total_files: paths.len(),
            total_records,
            last_updated,
            current_phase,
        })
    }

    async fn insert_approval(&self, approval: &ApprovalRequest) -> Result<(), StorageError> {
        self.approvals.write().await.push(approval.clone());
        Ok(())
    }
}
