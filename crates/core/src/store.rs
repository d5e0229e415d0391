//! Storage traits — the seams between the coordinator/memory layer and the
//! concrete stores.
//!
//! Implementations: SQLite (production), in-memory (testing). Every store
//! handle is constructed explicitly once per process and shared by reference
//! (`Arc<dyn _>`); there is no module-level client.
//!
//! All queries are namespace-scoped. Cross-namespace reads are impossible
//! through these interfaces: every method that touches persisted state takes
//! a `Namespace`.

use crate::error::StorageError;
use crate::namespace::Namespace;
use crate::record::{ApprovalRequest, FileChangeEvent, MemoryRecord, ProjectState};
use crate::task::{ExecutionReport, Task, TaskStatus};
use crate::vector::{Collection, VectorEntry, VectorMatch};
use async_trait::async_trait;

/// Outcome of a compare-and-set task claim.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// This dispatcher won the race; the task is now in_progress.
    Claimed(Task),
    /// Another dispatcher got there first. Not an error — skip the task.
    AlreadyClaimed,
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed(_))
    }
}

/// The task queue table.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert a new task. The task must be pending.
    async fn insert(&self, task: &Task) -> Result<(), StorageError>;

    /// Fetch a task by id within a namespace.
    async fn get(&self, namespace: &Namespace, id: &str) -> Result<Option<Task>, StorageError>;

    /// Pending tasks in dispatch order: priority descending, then creation
    /// time ascending (FIFO tie-break). Optionally filtered by recipient.
    async fn pending(
        &self,
        namespace: &Namespace,
        to_agent: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Task>, StorageError>;

    /// Compare-and-set claim: pending -> in_progress.
    ///
    /// Only a task still in pending may transition; a lost race yields
    /// `AlreadyClaimed` rather than an error. This is the mechanism that
    /// prevents duplicate execution under concurrent dispatchers.
    async fn claim(&self, namespace: &Namespace, id: &str) -> Result<ClaimOutcome, StorageError>;

    /// in_progress -> completed, attaching the result.
    async fn complete(
        &self,
        namespace: &Namespace,
        id: &str,
        result: &ExecutionReport,
    ) -> Result<(), StorageError>;

    /// in_progress -> failed, attaching the error text.
    async fn fail(&self, namespace: &Namespace, id: &str, error: &str)
    -> Result<(), StorageError>;

    /// Count tasks in a namespace, optionally by status.
    async fn count(
        &self,
        namespace: &Namespace,
        status: Option<TaskStatus>,
    ) -> Result<usize, StorageError>;

    /// Physically remove a task. Administrative/test cleanup only — normal
    /// flow never deletes.
    async fn delete(&self, namespace: &Namespace, id: &str) -> Result<bool, StorageError>;
}

/// Memory records, file-change events, and approval gates.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert a memory record. If earlier versions exist for the same
    /// (namespace, file_path), the stored version is bumped past the latest;
    /// the assigned version is returned. History is never overwritten.
    async fn insert_record(&self, record: &MemoryRecord) -> Result<i64, StorageError>;

    /// Records in a namespace, most-recent-first, optionally filtered by the
    /// producing agent. `limit` bounds the window.
    async fn records(
        &self,
        namespace: &Namespace,
        agent: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StorageError>;

    /// Append a file-change event.
    async fn append_event(&self, event: &FileChangeEvent) -> Result<(), StorageError>;

    /// Events in a namespace, most-recent-first, bounded.
    async fn events(
        &self,
        namespace: &Namespace,
        limit: usize,
    ) -> Result<Vec<FileChangeEvent>, StorageError>;

    /// Aggregate counts and timestamps for a namespace. An empty namespace
    /// yields zeroed defaults, never an error.
    async fn project_state(&self, namespace: &Namespace) -> Result<ProjectState, StorageError>;

    /// Insert a human-approval gate row.
    async fn insert_approval(&self, approval: &ApprovalRequest) -> Result<(), StorageError>;
}

/// Named collections of fixed-dimension vectors with payloads.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    /// Create a collection with a fixed dimension. Creating an existing
    /// collection with the same dimension is a no-op; with a different
    /// dimension it fails loudly — a mixed-dimension collection is corrupt.
    async fn create_collection(
        &self,
        collection: Collection,
        dimension: usize,
    ) -> Result<(), StorageError>;

    /// Insert or replace an entry. The vector length must match the
    /// collection dimension.
    async fn upsert(&self, collection: Collection, entry: VectorEntry) -> Result<(), StorageError>;

    /// Nearest-neighbor search restricted to one namespace's entries,
    /// ranked by cosine similarity, top-`limit`.
    async fn search(
        &self,
        collection: Collection,
        namespace: &Namespace,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorMatch>, StorageError>;

    /// Delete entries by id.
    async fn delete(&self, collection: Collection, ids: &[String]) -> Result<usize, StorageError>;
}
