//! The memory manager — single point of access to both stores, always
//! namespace-scoped.
//!
//! Reads degrade: a storage or embedding failure during `get_project_state`,
//! `get_agent_history`, or `search_code` logs a warning and returns empty
//! defaults, so a degraded store never blocks task execution. Writes do not:
//! `create_task`, `save_context`, `record_artifact`, `index_file`, and
//! `request_approval` propagate failure — an agent must not report success
//! if its outputs were not durably recorded.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use taskloom_core::artifact::collection_for_path;
use taskloom_core::error::{Error, Result};
use taskloom_core::event::{DomainEvent, EventBus};
use taskloom_core::namespace::Namespace;
use taskloom_core::provider::EmbeddingProvider;
use taskloom_core::record::{
    ApprovalRequest, FileChangeEvent, MemoryKind, MemoryRecord, ProjectState,
};
use taskloom_core::store::{RecordStore, TaskStore, VectorStore};
use taskloom_core::task::{Task, TaskPayload, TaskType};
use taskloom_core::vector::{Collection, VectorEntry, VectorMatch, VectorPayload};
use tracing::{debug, warn};
use uuid::Uuid;

/// Collections searched when assembling code context.
const SEARCH_COLLECTIONS: [Collection; 4] = [
    Collection::CodeSnippets,
    Collection::TestPatterns,
    Collection::ArchitecturePatterns,
    Collection::ProjectPatterns,
];

/// Single point of access to the relational store and the vector index.
///
/// Constructed once per process; shared by reference across concurrent agent
/// executions.
pub struct MemoryManager {
    tasks: Arc<dyn TaskStore>,
    records: Arc<dyn RecordStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    events: Arc<EventBus>,
    history_window: usize,
    search_top_k: usize,
    max_index_chars: usize,
}

impl MemoryManager {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        records: Arc<dyn RecordStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            tasks,
            records,
            vectors,
            embedder,
            events: Arc::new(EventBus::default()),
            history_window: 10,
            search_top_k: 5,
            max_index_chars: 4000,
        }
    }

    /// Share an existing event bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Bound the agent-history window.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Bound the number of search results.
    pub fn with_search_top_k(mut self, top_k: usize) -> Self {
        self.search_top_k = top_k;
        self
    }

    pub fn task_store(&self) -> Arc<dyn TaskStore> {
        self.tasks.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Aggregate counts and timestamps for a namespace.
    ///
    /// Never fails: an empty namespace yields zeroed defaults, and a storage
    /// failure degrades to the same.
    pub async fn get_project_state(&self, namespace: &Namespace) -> ProjectState {
        match self.records.project_state(namespace).await {
            Ok(state) => state,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Project state unavailable, using defaults");
                ProjectState::default()
            }
        }
    }

    /// Prior records produced by one agent, most-recent-first, bounded.
    ///
    /// Degrades to empty on storage failure.
    pub async fn get_agent_history(
        &self,
        namespace: &Namespace,
        agent_name: &str,
    ) -> Vec<MemoryRecord> {
        match self
            .records
            .records(namespace, Some(agent_name), self.history_window)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(namespace = %namespace, agent = %agent_name, error = %e, "Agent history unavailable");
                vec![]
            }
        }
    }

    /// Semantic search over the namespace's indexed artifacts.
    ///
    /// Embeds the query and ranks nearest neighbors across the artifact
    /// collections. Fails soft: an unreachable embedding provider or vector
    /// store yields an empty result, never an error — enrichment must not
    /// block task execution.
    pub async fn search_code(&self, namespace: &Namespace, query_text: &str) -> Vec<VectorMatch> {
        let query = match self.embedder.embed(query_text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Embedding provider unavailable, skipping search");
                return vec![];
            }
        };

        let mut matches = Vec::new();
        for collection in SEARCH_COLLECTIONS {
            match self
                .vectors
                .search(collection, namespace, &query, self.search_top_k)
                .await
            {
                Ok(found) => matches.extend(found),
                Err(e) => {
                    warn!(namespace = %namespace, collection = %collection, error = %e, "Vector search failed");
                }
            }
        }

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(self.search_top_k);
        matches
    }

    /// Append a context snapshot for future `get_agent_history` calls.
    pub async fn save_context(
        &self,
        namespace: &Namespace,
        agent_name: &str,
        phase: &str,
        context: &str,
    ) -> Result<()> {
        let mut record = MemoryRecord::new(
            namespace.clone(),
            format!("context/{agent_name}"),
            agent_name,
            MemoryKind::ContextSnapshot,
            format!("{agent_name} context snapshot"),
        );
        record.elements_description = context.to_string();
        record
            .metadata
            .insert("phase".into(), serde_json::json!(phase));

        let version = self.records.insert_record(&record).await?;
        self.events.publish(DomainEvent::RecordStored {
            namespace: namespace.to_string(),
            file_path: record.file_path.clone(),
            version,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Record a produced artifact: a versioned memory record plus the
    /// append-only file-change event. Hard-fails.
    pub async fn record_artifact(
        &self,
        record: &MemoryRecord,
        content: &str,
        tool_used: &str,
    ) -> Result<i64> {
        let version = self.records.insert_record(record).await?;

        let event = FileChangeEvent::new(
            record.namespace.clone(),
            record.file_path.clone(),
            tool_used,
            content,
        );
        self.records.append_event(&event).await?;

        self.events.publish(DomainEvent::RecordStored {
            namespace: record.namespace.to_string(),
            file_path: record.file_path.clone(),
            version,
            timestamp: Utc::now(),
        });
        Ok(version)
    }

    /// Read an artifact from disk and index it for semantic recall.
    pub async fn index_file(&self, namespace: &Namespace, file_path: &str) -> Result<Collection> {
        let content = tokio::fs::read_to_string(file_path)
            .await
            .map_err(|e| Error::Internal(format!("cannot read artifact {file_path}: {e}")))?;
        self.index_content(namespace, file_path, &content).await
    }

    /// Index already-loaded artifact content.
    ///
    /// The collection is chosen by the shared classification policy. The
    /// entry id derives from (namespace, path), so re-indexing a changed
    /// file replaces its previous entry. Indexing is a primary write:
    /// embedding or storage failure propagates.
    pub async fn index_content(
        &self,
        namespace: &Namespace,
        file_path: &str,
        content: &str,
    ) -> Result<Collection> {
        let collection = collection_for_path(file_path);

        let excerpt: String = content.chars().take(self.max_index_chars).collect();
        let vector = self.embedder.embed(&excerpt).await?;

        let mut hasher = Sha256::new();
        hasher.update(namespace.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(file_path.as_bytes());
        let id = format!("{:x}", hasher.finalize());

        let entry = VectorEntry {
            id,
            vector,
            payload: VectorPayload {
                namespace: namespace.clone(),
                content: excerpt,
                tags: vec![file_path.to_string()],
            },
        };
        self.vectors.upsert(collection, entry).await?;

        debug!(namespace = %namespace, file_path, collection = %collection, "Artifact indexed");
        self.events.publish(DomainEvent::FileIndexed {
            namespace: namespace.to_string(),
            file_path: file_path.to_string(),
            collection: collection.as_str().into(),
            timestamp: Utc::now(),
        });
        Ok(collection)
    }

    /// Insert a new pending task and return its id. Hard-fails.
    pub async fn create_task(
        &self,
        namespace: &Namespace,
        from_agent: &str,
        to_agent: &str,
        task_type: TaskType,
        payload: TaskPayload,
    ) -> Result<String> {
        let task = Task::new(namespace.clone(), from_agent, to_agent, task_type, payload);
        self.tasks.insert(&task).await?;

        self.events.publish(DomainEvent::TaskCreated {
            namespace: namespace.to_string(),
            task_id: task.id.clone(),
            to_agent: to_agent.to_string(),
            timestamp: Utc::now(),
        });
        Ok(task.id)
    }

    /// Open a human-approval gate. Approvals sit outside the delegation
    /// graph; this inserts the gate row and returns its id.
    pub async fn request_approval(
        &self,
        namespace: &Namespace,
        phase: &str,
        agent_name: &str,
        artifacts: Vec<String>,
        summary: &str,
    ) -> Result<String> {
        let approval = ApprovalRequest {
            id: Uuid::new_v4().to_string(),
            namespace: namespace.clone(),
            phase: phase.to_string(),
            agent: agent_name.to_string(),
            artifacts,
            summary: summary.to_string(),
            created_at: Utc::now(),
        };
        self.records.insert_approval(&approval).await?;

        self.events.publish(DomainEvent::ApprovalRequested {
            namespace: namespace.to_string(),
            approval_id: approval.id.clone(),
            phase: phase.to_string(),
            timestamp: Utc::now(),
        });
        Ok(approval.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use crate::vector_index::InMemoryVectorIndex;
    use taskloom_core::task::TaskStatus;
    use taskloom_providers::local::{HashEmbedder, UnavailableEmbedder};

    fn ns(s: &str) -> Namespace {
        Namespace::new(s).unwrap()
    }

    async fn manager() -> MemoryManager {
        let store = Arc::new(InMemoryStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::with_all_collections(64).await.unwrap());
        MemoryManager::new(
            store.clone(),
            store,
            vectors,
            Arc::new(HashEmbedder::new(64)),
        )
    }

    #[tokio::test]
    async fn project_state_defaults_on_empty() {
        let manager = manager().await;
        let state = manager.get_project_state(&ns("proj_new")).await;
        assert_eq!(state.total_files, 0);
        assert_eq!(state.total_records, 0);
    }

    #[tokio::test]
    async fn create_task_inserts_pending() {
        let manager = manager().await;
        let id = manager
            .create_task(
                &ns("proj_a"),
                "human",
                "planner",
                TaskType::NewTask,
                TaskPayload {
                    description: "plan the work".into(),
                    ..TaskPayload::default()
                },
            )
            .await
            .unwrap();

        let task = manager
            .task_store()
            .get(&ns("proj_a"), &id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.to_agent, "planner");
    }

    #[tokio::test]
    async fn history_is_bounded_and_agent_scoped() {
        let manager = manager().await;
        for i in 0..15 {
            let record = MemoryRecord::new(
                ns("proj_a"),
                format!("f{i}.rs"),
                "implementer",
                MemoryKind::Architecture,
                "desc",
            );
            manager.record_artifact(&record, "content", "file_write").await.unwrap();
        }

        let history = manager.get_agent_history(&ns("proj_a"), "implementer").await;
        assert_eq!(history.len(), 10); // default window
        assert_eq!(history[0].file_path, "f14.rs"); // most recent first

        let other = manager.get_agent_history(&ns("proj_a"), "reviewer").await;
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn index_then_search_round_trip() {
        let manager = manager().await;
        let content = "pub fn tokenize(input: &str) -> Vec<Token> { lexer state machine }";
        let collection = manager
            .index_content(&ns("proj_a"), "src/lexer.rs", content)
            .await
            .unwrap();
        assert_eq!(collection, Collection::CodeSnippets);

        let matches = manager
            .search_code(&ns("proj_a"), "tokenize input lexer state machine")
            .await;
        assert!(!matches.is_empty());
        assert!(matches[0].payload.tags.contains(&"src/lexer.rs".to_string()));
        assert!(matches[0].score > 0.5, "near-identical text should score high");
    }

    #[tokio::test]
    async fn search_is_namespace_isolated() {
        let manager = manager().await;
        manager
            .index_content(&ns("proj_a"), "src/a.rs", "alpha module content")
            .await
            .unwrap();
        manager
            .index_content(&ns("proj_b"), "src/b.rs", "alpha module content")
            .await
            .unwrap();

        let matches = manager.search_code(&ns("proj_a"), "alpha module content").await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].payload.namespace, ns("proj_a"));
    }

    #[tokio::test]
    async fn search_soft_fails_when_embedder_down() {
        let store = Arc::new(InMemoryStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::with_all_collections(8).await.unwrap());
        let manager = MemoryManager::new(
            store.clone(),
            store,
            vectors,
            Arc::new(UnavailableEmbedder::new(8)),
        );

        // No panic, no error: just empty
        let matches = manager.search_code(&ns("proj_a"), "anything").await;
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn index_hard_fails_when_embedder_down() {
        let store = Arc::new(InMemoryStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::with_all_collections(8).await.unwrap());
        let manager = MemoryManager::new(
            store.clone(),
            store,
            vectors,
            Arc::new(UnavailableEmbedder::new(8)),
        );

        let err = manager
            .index_content(&ns("proj_a"), "src/a.rs", "content")
            .await;
        assert!(err.is_err(), "indexing is a primary write and must propagate failure");
    }

    #[tokio::test]
    async fn reindex_replaces_previous_entry() {
        let manager = manager().await;
        manager
            .index_content(&ns("proj_a"), "src/a.rs", "first version of the module")
            .await
            .unwrap();
        manager
            .index_content(&ns("proj_a"), "src/a.rs", "second version of the module")
            .await
            .unwrap();

        let matches = manager.search_code(&ns("proj_a"), "version of the module").await;
        assert_eq!(matches.len(), 1, "same path must not duplicate entries");
        assert!(matches[0].payload.content.contains("second"));
    }

    #[tokio::test]
    async fn index_file_reads_from_disk() {
        let manager = manager().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handler_test.rs");
        std::fs::write(&path, "fn handles_the_edge_case() { assert!(true) }").unwrap();

        let collection = manager
            .index_file(&ns("proj_a"), path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(collection, Collection::TestPatterns);

        let missing = manager
            .index_file(&ns("proj_a"), "/no/such/file.rs")
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn save_context_feeds_history() {
        let manager = manager().await;
        manager
            .save_context(&ns("proj_a"), "planner", "design", "chose sqlite for the queue")
            .await
            .unwrap();

        let history = manager.get_agent_history(&ns("proj_a"), "planner").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, MemoryKind::ContextSnapshot);
        assert!(history[0].elements_description.contains("sqlite"));

        let state = manager.get_project_state(&ns("proj_a")).await;
        assert_eq!(state.current_phase.as_deref(), Some("design"));
    }

    #[tokio::test]
    async fn request_approval_returns_id() {
        let manager = manager().await;
        let id = manager
            .request_approval(
                &ns("proj_a"),
                "design",
                "architect",
                vec!["design.md".into()],
                "storage layer sign-off",
            )
            .await
            .unwrap();
        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn record_artifact_bumps_versions() {
        let manager = manager().await;
        let record = MemoryRecord::new(
            ns("proj_a"),
            "src/lib.rs",
            "implementer",
            MemoryKind::Architecture,
            "layout",
        );
        let v1 = manager.record_artifact(&record, "v1", "file_write").await.unwrap();
        let v2 = manager.record_artifact(&record, "v2", "file_edit").await.unwrap();
        assert_eq!(v1, 1);
        assert_eq!(v2, 2);

        let state = manager.get_project_state(&ns("proj_a")).await;
        assert_eq!(state.total_files, 1);
        assert_eq!(state.total_records, 2);
    }
}
