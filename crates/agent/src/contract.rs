//! The agent execution contract — the uniform lifecycle every agent follows.
//!
//! The [`ContractRunner`] is a reusable pipeline parameterized by an
//! [`AgentExecutor`]: load context, build a bounded prompt, invoke the
//! generative provider under a fixed deadline, persist artifacts, record
//! memory, report a structured result, update the task status, and create
//! follow-up delegations. The step order is fixed.
//!
//! Failure semantics: any error between context load and memory recording is
//! written onto the task as `failed` and then re-raised, so the invoking
//! dispatcher knows the unit of work did not complete. A failure of the
//! status update itself leaves the queue inconsistent — that condition is
//! published as an operational alert and never swallowed.

use crate::profile::AgentProfile;
use crate::prompt::{self, AssembledContext, PromptLimits};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskloom_core::error::{AgentError, CoordinatorError, ProviderError, Result};
use taskloom_core::event::{DomainEvent, EventBus};
use taskloom_core::namespace::Namespace;
use taskloom_core::provider::GenerativeProvider;
use taskloom_core::record::{MemoryKind, MemoryRecord};
use taskloom_core::store::TaskStore;
use taskloom_core::task::{ExecutionReport, Task, TaskPayload, TaskType};
use taskloom_memory::MemoryManager;
use tracing::{debug, error, info, warn};

/// An artifact an agent wants persisted.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Path relative to the artifact root
    pub path: String,
    pub content: String,
    pub kind: MemoryKind,
    pub brief_description: String,
}

/// A follow-up task an agent wants created. The namespace is inherited from
/// the current run; an agent cannot delegate across namespaces.
#[derive(Debug, Clone)]
pub struct Delegation {
    pub to_agent: String,
    pub task_type: TaskType,
    pub payload: TaskPayload,
}

/// What one agent produced from one generative response.
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub summary: String,
    pub artifacts: Vec<Artifact>,
    pub next_steps: Vec<String>,
    pub delegations: Vec<Delegation>,
}

/// The single capability every agent implements: turn a task, its assembled
/// context, and the provider response into structured output.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    fn profile(&self) -> &AgentProfile;

    async fn execute(
        &self,
        task: &Task,
        context: &AssembledContext,
        response: &str,
    ) -> std::result::Result<AgentOutput, AgentError>;
}

/// A minimal executor: the response becomes one artifact at the profile's
/// output path. Enough for recording/review agents whose whole job is to
/// produce a document.
pub struct DocumentExecutor {
    profile: AgentProfile,
    kind: MemoryKind,
}

impl DocumentExecutor {
    pub fn new(profile: AgentProfile, kind: MemoryKind) -> Self {
        Self { profile, kind }
    }
}

#[async_trait]
impl AgentExecutor for DocumentExecutor {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn execute(
        &self,
        task: &Task,
        _context: &AssembledContext,
        response: &str,
    ) -> std::result::Result<AgentOutput, AgentError> {
        Ok(AgentOutput {
            summary: format!("{} produced {}", self.profile.name, self.profile.output_path(&task.id)),
            artifacts: vec![Artifact {
                path: self.profile.output_path(&task.id),
                content: response.to_string(),
                kind: self.kind,
                brief_description: task.payload.description.clone(),
            }],
            next_steps: vec![],
            delegations: vec![],
        })
    }
}

/// Runs the fixed contract pipeline for one namespace.
pub struct ContractRunner {
    memory: Arc<MemoryManager>,
    provider: Arc<dyn GenerativeProvider>,
    /// Resolved once at construction; stable for the runner's lifetime
    namespace: Namespace,
    artifact_root: PathBuf,
    events: Arc<EventBus>,
    timeout: Duration,
    max_tokens: u32,
    limits: PromptLimits,
}

impl ContractRunner {
    pub fn new(
        memory: Arc<MemoryManager>,
        provider: Arc<dyn GenerativeProvider>,
        namespace: Namespace,
        artifact_root: impl Into<PathBuf>,
    ) -> Self {
        let events = memory.event_bus();
        Self {
            memory,
            provider,
            namespace,
            artifact_root: artifact_root.into(),
            events,
            timeout: Duration::from_secs(600),
            max_tokens: 4096,
            limits: PromptLimits::default(),
        }
    }

    /// Override the generative deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_prompt_limits(mut self, limits: PromptLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Run the contract for one claimed task.
    ///
    /// The task must already be in_progress (the dispatcher claims before
    /// invoking). On success the task is completed with the report attached;
    /// on failure it is failed with the error text, and the error is
    /// re-raised.
    pub async fn run(
        &self,
        executor: &dyn AgentExecutor,
        task: &Task,
    ) -> Result<ExecutionReport> {
        if task.namespace != self.namespace {
            // Never execute across namespaces, and never touch the foreign
            // task's status either.
            return Err(CoordinatorError::NamespaceMissing(format!(
                "task {} belongs to namespace {}, runner is scoped to {}",
                task.id, task.namespace, self.namespace
            ))
            .into());
        }

        info!(
            namespace = %self.namespace,
            task_id = %task.id,
            agent = %executor.profile().name,
            "Running agent contract"
        );

        match self.run_steps(executor, task).await {
            Ok((report, delegations)) => {
                self.record_status(task, Ok(&report)).await?;
                // Delegations come last: each inherits the namespace.
                self.create_delegations(executor, delegations).await?;
                Ok(report)
            }
            Err(e) => {
                let message = e.to_string();
                self.record_status(task, Err(&message)).await?;
                Err(e)
            }
        }
    }

    /// Steps 2–7: context, prompt, generative call, artifacts, memory.
    async fn run_steps(
        &self,
        executor: &dyn AgentExecutor,
        task: &Task,
    ) -> Result<(ExecutionReport, Vec<Delegation>)> {
        let profile = executor.profile();

        // ── Step 2: load context ──
        let project_state = self.memory.get_project_state(&self.namespace).await;
        let history = self
            .memory
            .get_agent_history(&self.namespace, &profile.name)
            .await;
        let snippets = if task.payload.description.trim().is_empty() {
            vec![]
        } else {
            self.memory
                .search_code(&self.namespace, &task.payload.description)
                .await
        };
        let context = AssembledContext {
            project_state,
            history,
            snippets,
        };

        // ── Step 3: build the prompt ──
        let prompt = prompt::assemble(profile, &self.namespace, task, &context, self.limits);
        debug!(task_id = %task.id, prompt_chars = prompt.len(), "Prompt assembled");

        // ── Step 4: generative call under a fixed deadline ──
        let response = match tokio::time::timeout(
            self.timeout,
            self.provider.complete(&prompt, self.max_tokens),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(task_id = %task.id, timeout_secs = self.timeout.as_secs(), "Generative call timed out");
                return Err(ProviderError::Timeout {
                    provider: self.provider.name().to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
                .into());
            }
        };

        // ── Step 5: agent-specific output policy + artifact writes ──
        let output = executor.execute(task, &context, &response).await?;

        let mut files_created = Vec::with_capacity(output.artifacts.len());
        for artifact in &output.artifacts {
            let full_path = self.artifact_root.join(&artifact.path);
            if let Some(parent) = full_path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AgentError::ArtifactWriteFailed {
                        path: artifact.path.clone(),
                        reason: e.to_string(),
                    }
                })?;
            }
            tokio::fs::write(&full_path, &artifact.content)
                .await
                .map_err(|e| AgentError::ArtifactWriteFailed {
                    path: artifact.path.clone(),
                    reason: e.to_string(),
                })?;
            files_created.push(artifact.path.clone());
        }

        // ── Step 6: record memory and index every artifact ──
        for artifact in &output.artifacts {
            let mut record = MemoryRecord::new(
                self.namespace.clone(),
                artifact.path.clone(),
                profile.name.clone(),
                artifact.kind,
                artifact.brief_description.clone(),
            );
            if let Some(phase) = &task.payload.phase {
                record
                    .metadata
                    .insert("phase".into(), serde_json::json!(phase));
            }
            self.memory
                .record_artifact(&record, &artifact.content, "agent_contract")
                .await?;
            self.memory
                .index_content(&self.namespace, &artifact.path, &artifact.content)
                .await?;
        }

        self.memory
            .save_context(
                &self.namespace,
                &profile.name,
                task.payload.phase.as_deref().unwrap_or("unphased"),
                &output.summary,
            )
            .await?;

        // ── Step 7: structured result ──
        let report = ExecutionReport::Success {
            summary: output.summary,
            files_created,
            files_modified: vec![],
            next_steps: output.next_steps,
        };
        Ok((report, output.delegations))
    }

    /// Step 8: write the terminal status. A failure here is an operational
    /// alert, not a silent drop — the queue no longer reflects reality.
    async fn record_status(
        &self,
        task: &Task,
        outcome: std::result::Result<&ExecutionReport, &str>,
    ) -> Result<()> {
        let store = self.memory.task_store();
        let update = match outcome {
            Ok(report) => store.complete(&self.namespace, &task.id, report).await,
            Err(message) => store.fail(&self.namespace, &task.id, message).await,
        };

        match update {
            Ok(()) => {
                self.events.publish(DomainEvent::TaskFinished {
                    namespace: self.namespace.to_string(),
                    task_id: task.id.clone(),
                    success: outcome.is_ok(),
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                error!(
                    namespace = %self.namespace,
                    task_id = %task.id,
                    error = %reason,
                    "ALERT: task finished but status update failed; queue state is inconsistent"
                );
                self.events.publish(DomainEvent::QueueInconsistent {
                    namespace: self.namespace.to_string(),
                    task_id: task.id.clone(),
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                });
                Err(CoordinatorError::InconsistentQueueState {
                    task_id: task.id.clone(),
                    reason,
                }
                .into())
            }
        }
    }

    /// Step 9: follow-up delegations, each inheriting the namespace.
    async fn create_delegations(
        &self,
        executor: &dyn AgentExecutor,
        delegations: Vec<Delegation>,
    ) -> Result<()> {
        for delegation in delegations {
            let id = self
                .memory
                .create_task(
                    &self.namespace,
                    &executor.profile().name,
                    &delegation.to_agent,
                    delegation.task_type,
                    delegation.payload,
                )
                .await?;
            debug!(task_id = %id, to_agent = %delegation.to_agent, "Follow-up task created");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileRegistry;
    use taskloom_core::error::Error;
    use taskloom_core::task::TaskStatus;
    use taskloom_memory::{InMemoryStore, InMemoryVectorIndex};
    use taskloom_providers::local::{
        HashEmbedder, StaticProvider, UnavailableEmbedder, UnavailableProvider,
    };

    fn ns(s: &str) -> Namespace {
        Namespace::new(s).unwrap()
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        memory: Arc<MemoryManager>,
        _dir: tempfile::TempDir,
        artifact_root: PathBuf,
    }

    async fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::with_all_collections(64).await.unwrap());
        let memory = Arc::new(MemoryManager::new(
            store.clone(),
            store.clone(),
            vectors,
            Arc::new(HashEmbedder::new(64)),
        ));
        let dir = tempfile::tempdir().unwrap();
        let artifact_root = dir.path().to_path_buf();
        Harness {
            store,
            memory,
            _dir: dir,
            artifact_root,
        }
    }

    fn recorder_executor() -> DocumentExecutor {
        let profile = ProfileRegistry::builtin().get("state_recorder").unwrap().clone();
        DocumentExecutor::new(profile, MemoryKind::ContextSnapshot)
    }

    async fn claimed_task(harness: &Harness, namespace: &str) -> Task {
        let task = Task::new(
            ns(namespace),
            "human",
            "state_recorder",
            TaskType::NewTask,
            TaskPayload {
                description: "record the current project state".into(),
                ..TaskPayload::default()
            },
        );
        harness.store.insert(&task).await.unwrap();
        match harness.store.claim(&ns(namespace), &task.id).await.unwrap() {
            taskloom_core::store::ClaimOutcome::Claimed(claimed) => claimed,
            _ => panic!("fresh task must be claimable"),
        }
    }

    #[tokio::test]
    async fn success_path_completes_task_and_writes_artifact() {
        let h = harness().await;
        let task = claimed_task(&h, "proj_a").await;

        let runner = ContractRunner::new(
            h.memory.clone(),
            Arc::new(StaticProvider::always("RESULT")),
            ns("proj_a"),
            &h.artifact_root,
        );

        let report = runner.run(&recorder_executor(), &task).await.unwrap();
        assert!(report.is_success());

        // Task is completed with the report attached
        let stored = h.store.get(&ns("proj_a"), &task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        let ExecutionReport::Success { files_created, .. } = stored.result.unwrap() else {
            panic!("expected success report");
        };
        assert_eq!(files_created, vec![format!("records/state_{}.md", task.id)]);

        // The artifact landed on disk with the provider response
        let written = std::fs::read_to_string(
            h.artifact_root.join(format!("records/state_{}.md", task.id)),
        )
        .unwrap();
        assert_eq!(written, "RESULT");

        // Memory: a record for the artifact plus the context snapshot
        let history = h.memory.get_agent_history(&ns("proj_a"), "state_recorder").await;
        assert!(history.len() >= 2);
    }

    #[tokio::test]
    async fn provider_failure_fails_task_and_reraises() {
        let h = harness().await;
        let task = claimed_task(&h, "proj_a").await;

        let runner = ContractRunner::new(
            h.memory.clone(),
            Arc::new(UnavailableProvider),
            ns("proj_a"),
            &h.artifact_root,
        );

        let err = runner.run(&recorder_executor(), &task).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Unavailable(_))));

        let stored = h.store.get(&ns("proj_a"), &task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert!(stored.error.unwrap().contains("unavailable"));
    }

    struct SlowProvider;

    #[async_trait]
    impl GenerativeProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(
            &self,
            _prompt: &str,
            _max_tokens: u32,
        ) -> std::result::Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".into())
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_fails_task() {
        let h = harness().await;
        let task = claimed_task(&h, "proj_a").await;

        let runner = ContractRunner::new(
            h.memory.clone(),
            Arc::new(SlowProvider),
            ns("proj_a"),
            &h.artifact_root,
        )
        .with_timeout(Duration::from_millis(50));

        let err = runner.run(&recorder_executor(), &task).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Timeout { .. })));

        let stored = h.store.get(&ns("proj_a"), &task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn embedder_outage_does_not_block_execution() {
        // search_code degrades to empty; the run still reaches the status
        // update. Only indexing of produced artifacts would hard-fail, so
        // use an executor that produces no artifacts.
        let store = Arc::new(InMemoryStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::with_all_collections(8).await.unwrap());
        let memory = Arc::new(MemoryManager::new(
            store.clone(),
            store.clone(),
            vectors,
            Arc::new(UnavailableEmbedder::new(8)),
        ));

        struct NoArtifacts(AgentProfile);

        #[async_trait]
        impl AgentExecutor for NoArtifacts {
            fn profile(&self) -> &AgentProfile {
                &self.0
            }

            async fn execute(
                &self,
                _task: &Task,
                _context: &AssembledContext,
                response: &str,
            ) -> std::result::Result<AgentOutput, AgentError> {
                Ok(AgentOutput {
                    summary: response.to_string(),
                    ..AgentOutput::default()
                })
            }
        }

        let task = Task::new(
            ns("proj_a"),
            "human",
            "state_recorder",
            TaskType::NewTask,
            TaskPayload {
                description: "non-empty so search is attempted".into(),
                ..TaskPayload::default()
            },
        );
        store.insert(&task).await.unwrap();
        store.claim(&ns("proj_a"), &task.id).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let runner = ContractRunner::new(
            memory,
            Arc::new(StaticProvider::always("ok")),
            ns("proj_a"),
            dir.path(),
        );

        let profile = ProfileRegistry::builtin().get("state_recorder").unwrap().clone();
        let report = runner.run(&NoArtifacts(profile), &task).await.unwrap();
        assert!(report.is_success());

        let stored = store.get(&ns("proj_a"), &task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
    }

    struct DelegatingExecutor(AgentProfile);

    #[async_trait]
    impl AgentExecutor for DelegatingExecutor {
        fn profile(&self) -> &AgentProfile {
            &self.0
        }

        async fn execute(
            &self,
            _task: &Task,
            _context: &AssembledContext,
            response: &str,
        ) -> std::result::Result<AgentOutput, AgentError> {
            Ok(AgentOutput {
                summary: response.to_string(),
                artifacts: vec![],
                next_steps: vec!["verify the outcome".into()],
                delegations: vec![Delegation {
                    to_agent: "test_engineer".into(),
                    task_type: TaskType::Delegation,
                    payload: TaskPayload {
                        description: "test the recorded change".into(),
                        ..TaskPayload::default()
                    },
                }],
            })
        }
    }

    #[tokio::test]
    async fn delegations_inherit_namespace() {
        let h = harness().await;
        let task = claimed_task(&h, "proj_a").await;

        let runner = ContractRunner::new(
            h.memory.clone(),
            Arc::new(StaticProvider::always("done")),
            ns("proj_a"),
            &h.artifact_root,
        );

        let profile = ProfileRegistry::builtin().get("state_recorder").unwrap().clone();
        runner.run(&DelegatingExecutor(profile), &task).await.unwrap();

        let pending = h
            .store
            .pending(&ns("proj_a"), Some("test_engineer"), 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].namespace, ns("proj_a"));
        assert_eq!(pending[0].from_agent, "state_recorder");
        assert_eq!(pending[0].task_type, TaskType::Delegation);
    }

    #[tokio::test]
    async fn failed_run_creates_no_delegations() {
        let h = harness().await;
        let task = claimed_task(&h, "proj_a").await;

        let runner = ContractRunner::new(
            h.memory.clone(),
            Arc::new(UnavailableProvider),
            ns("proj_a"),
            &h.artifact_root,
        );

        let profile = ProfileRegistry::builtin().get("state_recorder").unwrap().clone();
        let _ = runner.run(&DelegatingExecutor(profile), &task).await;

        let pending = h
            .store
            .pending(&ns("proj_a"), Some("test_engineer"), 10)
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn foreign_namespace_task_is_rejected_untouched() {
        let h = harness().await;
        let task = claimed_task(&h, "proj_b").await;

        let runner = ContractRunner::new(
            h.memory.clone(),
            Arc::new(StaticProvider::always("x")),
            ns("proj_a"),
            &h.artifact_root,
        );

        let err = runner.run(&recorder_executor(), &task).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Coordinator(CoordinatorError::NamespaceMissing(_))
        ));

        // The foreign task's status was not modified
        let stored = h.store.get(&ns("proj_b"), &task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn status_update_failure_is_inconsistent_queue_state() {
        let h = harness().await;
        // Build a task that was never claimed: complete() will refuse,
        // which is exactly the step-8 failure mode.
        let task = Task::new(
            ns("proj_a"),
            "human",
            "state_recorder",
            TaskType::NewTask,
            TaskPayload::default(),
        );
        h.store.insert(&task).await.unwrap();

        let runner = ContractRunner::new(
            h.memory.clone(),
            Arc::new(StaticProvider::always("fine")),
            ns("proj_a"),
            &h.artifact_root,
        );

        let mut alerts = h.memory.event_bus().subscribe();

        let err = runner.run(&recorder_executor(), &task).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Coordinator(CoordinatorError::InconsistentQueueState { .. })
        ));

        // The alert event was published, not swallowed
        let mut saw_alert = false;
        while let Ok(event) = alerts.try_recv() {
            if matches!(event.as_ref(), DomainEvent::QueueInconsistent { .. }) {
                saw_alert = true;
            }
        }
        assert!(saw_alert, "queue inconsistency must surface as an alert event");
    }
}
