//! End-to-end integration tests for the Taskloom coordination pipeline.
//!
//! These exercise the full path from task creation through dispatch, the
//! agent contract, memory recording, and follow-up delegation — against the
//! real SQLite store on disk.

use std::sync::Arc;

use async_trait::async_trait;
use taskloom_agent::{
    AgentExecutor, AgentOutput, AgentProfile, AssembledContext, ContractRunner, Delegation,
    DocumentExecutor, ProfileRegistry,
};
use taskloom_coordinator::{Dispatcher, route_file_change};
use taskloom_core::error::AgentError;
use taskloom_core::namespace::Namespace;
use taskloom_core::record::{MemoryKind, MemoryRecord};
use taskloom_core::store::TaskStore;
use taskloom_core::task::{ExecutionReport, Task, TaskPayload, TaskStatus, TaskType};
use taskloom_memory::{MemoryManager, SqliteStore};
use taskloom_providers::local::{HashEmbedder, StaticProvider, UnavailableEmbedder};
use taskloom_memory::InMemoryVectorIndex;

fn ns(s: &str) -> Namespace {
    Namespace::new(s).unwrap()
}

struct World {
    dir: tempfile::TempDir,
    store: Arc<SqliteStore>,
    memory: Arc<MemoryManager>,
}

/// File-backed SQLite plus an in-process vector index and hash embedder.
async fn world() -> World {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("taskloom.db");
    let store = Arc::new(
        SqliteStore::new(&format!("sqlite://{}", db_path.display()))
            .await
            .unwrap(),
    );
    let vectors = Arc::new(InMemoryVectorIndex::with_all_collections(64).await.unwrap());
    let memory = Arc::new(MemoryManager::new(
        store.clone(),
        store.clone(),
        vectors,
        Arc::new(HashEmbedder::new(64)),
    ));
    World { dir, store, memory }
}

/// An executor for "agentX": produces one artifact and delegates to agentY.
struct AgentX {
    profile: AgentProfile,
}

impl AgentX {
    fn new() -> Self {
        Self {
            profile: AgentProfile::new(
                "agentX",
                "You are agentX.",
                "Do the work in {namespace}.",
                "out/x_{task_id}.md",
            ),
        }
    }
}

#[async_trait]
impl AgentExecutor for AgentX {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn execute(
        &self,
        task: &Task,
        _context: &AssembledContext,
        response: &str,
    ) -> Result<AgentOutput, AgentError> {
        Ok(AgentOutput {
            summary: format!("agentX handled: {}", task.payload.description),
            artifacts: vec![taskloom_agent::Artifact {
                path: self.profile.output_path(&task.id),
                content: response.to_string(),
                kind: MemoryKind::Other,
                brief_description: task.payload.description.clone(),
            }],
            next_steps: vec![],
            delegations: vec![Delegation {
                to_agent: "agentY".into(),
                task_type: TaskType::Delegation,
                payload: TaskPayload {
                    description: "follow up on agentX output".into(),
                    ..TaskPayload::default()
                },
            }],
        })
    }
}

#[tokio::test]
async fn full_delegation_scenario() {
    let w = world().await;

    // An external trigger creates the initial task.
    let task_id = w
        .memory
        .create_task(
            &ns("proj_a"),
            "human",
            "agentX",
            TaskType::NewTask,
            TaskPayload {
                description: "do X".into(),
                ..TaskPayload::default()
            },
        )
        .await
        .unwrap();

    let runner = Arc::new(ContractRunner::new(
        w.memory.clone(),
        Arc::new(StaticProvider::always("RESULT")),
        ns("proj_a"),
        w.dir.path().join("artifacts"),
    ));

    let dispatcher = Dispatcher::new(w.memory.clone(), runner, ns("proj_a"))
        .register(Arc::new(AgentX::new()));

    let outcomes = dispatcher.dispatch_once().await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success);

    // Fact 1 + 2: the task went pending -> in_progress -> completed
    let task = w.store.get(&ns("proj_a"), &task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.completed_at.is_some());

    // Fact 3: the result carries the created file
    let ExecutionReport::Success { files_created, summary, .. } = task.result.unwrap() else {
        panic!("expected a success report");
    };
    assert_eq!(files_created, vec![format!("out/x_{task_id}.md")]);
    assert!(summary.contains("do X"));

    // The artifact content is the provider response
    let artifact = std::fs::read_to_string(
        w.dir
            .path()
            .join("artifacts")
            .join(format!("out/x_{task_id}.md")),
    )
    .unwrap();
    assert_eq!(artifact, "RESULT");

    // Fact 4: a memory record exists in proj_a for the artifact
    let history = w.memory.get_agent_history(&ns("proj_a"), "agentX").await;
    assert!(
        history
            .iter()
            .any(|r| r.file_path == format!("out/x_{task_id}.md")),
        "artifact record missing from history"
    );
    assert!(history.iter().all(|r| r.namespace == ns("proj_a")));

    // Fact 5: a follow-up task for agentY exists, inheriting the namespace
    let follow_ups = w
        .store
        .pending(&ns("proj_a"), Some("agentY"), 10)
        .await
        .unwrap();
    assert_eq!(follow_ups.len(), 1);
    assert_eq!(follow_ups[0].namespace, ns("proj_a"));
    assert_eq!(follow_ups[0].from_agent, "agentX");
    assert_eq!(follow_ups[0].task_type, TaskType::Delegation);
}

#[tokio::test]
async fn namespace_isolation_across_the_stack() {
    let w = world().await;

    // Seed tasks and records in two namespaces
    for namespace in ["proj_a", "proj_b"] {
        w.memory
            .create_task(
                &ns(namespace),
                "human",
                "worker",
                TaskType::NewTask,
                TaskPayload::default(),
            )
            .await
            .unwrap();

        let record = MemoryRecord::new(
            ns(namespace),
            format!("{namespace}/file.rs"),
            "worker",
            MemoryKind::Architecture,
            "seed",
        );
        w.memory
            .record_artifact(&record, "content", "file_write")
            .await
            .unwrap();
        w.memory
            .index_content(&ns(namespace), &format!("{namespace}/file.rs"), "shared words here")
            .await
            .unwrap();
    }

    // Relational reads never cross namespaces
    let a_tasks = w.store.pending(&ns("proj_a"), None, 10).await.unwrap();
    assert_eq!(a_tasks.len(), 1);
    assert!(a_tasks.iter().all(|t| t.namespace == ns("proj_a")));

    let b_history = w.memory.get_agent_history(&ns("proj_b"), "worker").await;
    assert!(b_history.iter().all(|r| r.namespace == ns("proj_b")));

    // A third namespace sees nothing at all
    assert!(w.store.pending(&ns("proj_c"), None, 10).await.unwrap().is_empty());
    assert_eq!(w.memory.get_project_state(&ns("proj_c")).await.total_files, 0);

    // Vector search is namespace-filtered even with identical content
    let matches = w.memory.search_code(&ns("proj_a"), "shared words here").await;
    assert!(!matches.is_empty());
    assert!(matches.iter().all(|m| m.payload.namespace == ns("proj_a")));
}

#[tokio::test]
async fn concurrent_claims_on_sqlite_are_exclusive() {
    let w = world().await;

    let task = Task::new(
        ns("proj_a"),
        "human",
        "worker",
        TaskType::NewTask,
        TaskPayload::default(),
    );
    w.store.insert(&task).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = w.store.clone();
        let id = task.id.clone();
        handles.push(tokio::spawn(async move {
            store.claim(&ns("proj_a"), &id).await.unwrap()
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap().is_claimed() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1, "exactly one of four concurrent claimers may win");

    let stored = w.store.get(&ns("proj_a"), &task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn status_history_is_monotonic() {
    let w = world().await;

    let task = Task::new(
        ns("proj_a"),
        "human",
        "worker",
        TaskType::NewTask,
        TaskPayload::default(),
    );
    w.store.insert(&task).await.unwrap();

    let mut observed = vec![
        w.store
            .get(&ns("proj_a"), &task.id)
            .await
            .unwrap()
            .unwrap()
            .status,
    ];

    w.store.claim(&ns("proj_a"), &task.id).await.unwrap();
    observed.push(
        w.store
            .get(&ns("proj_a"), &task.id)
            .await
            .unwrap()
            .unwrap()
            .status,
    );

    w.store
        .fail(&ns("proj_a"), &task.id, "deliberate")
        .await
        .unwrap();
    observed.push(
        w.store
            .get(&ns("proj_a"), &task.id)
            .await
            .unwrap()
            .unwrap()
            .status,
    );

    assert_eq!(
        observed,
        vec![TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Failed]
    );

    // Terminal means terminal: no further transition is possible
    assert!(!w
        .store
        .claim(&ns("proj_a"), &task.id)
        .await
        .unwrap()
        .is_claimed());
    let report = ExecutionReport::Failure { error: "x".into() };
    assert!(w
        .store
        .complete(&ns("proj_a"), &task.id, &report)
        .await
        .is_err());
}

#[tokio::test]
async fn embedder_outage_degrades_search_but_not_dispatch() {
    // Same world, but the embedding provider is down.
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("taskloom.db");
    let store = Arc::new(
        SqliteStore::new(&format!("sqlite://{}", db_path.display()))
            .await
            .unwrap(),
    );
    let vectors = Arc::new(InMemoryVectorIndex::with_all_collections(8).await.unwrap());
    let memory = Arc::new(MemoryManager::new(
        store.clone(),
        store.clone(),
        vectors,
        Arc::new(UnavailableEmbedder::new(8)),
    ));

    // search_code degrades to empty without raising
    let matches = memory.search_code(&ns("proj_a"), "anything at all").await;
    assert!(matches.is_empty());

    // A no-artifact agent still completes its task end to end
    struct Minimal(AgentProfile);

    #[async_trait]
    impl AgentExecutor for Minimal {
        fn profile(&self) -> &AgentProfile {
            &self.0
        }

        async fn execute(
            &self,
            _task: &Task,
            _context: &AssembledContext,
            response: &str,
        ) -> Result<AgentOutput, AgentError> {
            Ok(AgentOutput {
                summary: response.to_string(),
                ..AgentOutput::default()
            })
        }
    }

    let task_id = memory
        .create_task(
            &ns("proj_a"),
            "human",
            "minimal",
            TaskType::NewTask,
            TaskPayload {
                description: "still works without search".into(),
                ..TaskPayload::default()
            },
        )
        .await
        .unwrap();

    let runner = Arc::new(ContractRunner::new(
        memory.clone(),
        Arc::new(StaticProvider::always("ok")),
        ns("proj_a"),
        dir.path().join("artifacts"),
    ));
    let dispatcher = Dispatcher::new(memory.clone(), runner, ns("proj_a")).register(Arc::new(
        Minimal(AgentProfile::new("minimal", "role", "instructions", "out/{task_id}.md")),
    ));

    let outcomes = dispatcher.dispatch_once().await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success, "outage of enrichment must not fail the task");

    let task = store.get(&ns("proj_a"), &task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn index_search_round_trip_through_dispatch() {
    let w = world().await;

    // A state_recorder run writes an artifact; the contract indexes it.
    let registry = ProfileRegistry::builtin();
    let executor = DocumentExecutor::new(
        registry.get("state_recorder").unwrap().clone(),
        MemoryKind::Other,
    );

    w.memory
        .create_task(
            &ns("proj_a"),
            "human",
            "state_recorder",
            TaskType::NewTask,
            TaskPayload {
                description: "record the storage layer rework".into(),
                ..TaskPayload::default()
            },
        )
        .await
        .unwrap();

    let runner = Arc::new(ContractRunner::new(
        w.memory.clone(),
        Arc::new(StaticProvider::always(
            "The storage layer was reworked to use a single write path.",
        )),
        ns("proj_a"),
        w.dir.path().join("artifacts"),
    ));
    let dispatcher =
        Dispatcher::new(w.memory.clone(), runner, ns("proj_a")).register(Arc::new(executor));

    let outcomes = dispatcher.dispatch_once().await;
    assert!(outcomes[0].success);

    // The indexed artifact is recallable by its own content
    let matches = w
        .memory
        .search_code(&ns("proj_a"), "storage layer reworked single write path")
        .await;
    assert!(!matches.is_empty());
    assert!(matches[0].score > 0.5);
}

#[test]
fn routing_policy_is_stable() {
    let expectations = [
        ("foo.py", "state_recorder"),
        ("test_bar.py", "test_engineer"),
        ("readme.md", "docs_writer"),
        (".env", "security_reviewer"),
        ("data.bin", "state_recorder"),
    ];
    for (path, agent) in expectations {
        for _ in 0..10 {
            assert_eq!(route_file_change(path), agent);
        }
    }
}
