//! Task queue coordinator — dispatch, claim discipline, and delegation
//! routing.
//!
//! The dispatcher selects pending tasks for one namespace (priority
//! descending, FIFO tie-break), claims each with the store's compare-and-set,
//! and runs the claimed task through the agent contract. A lost claim race
//! is a skip, never an error. A failed task stays failed: retries are new
//! tasks created explicitly by a human or a supervisory agent, not automatic
//! resubmissions.

use std::collections::HashMap;
use std::sync::Arc;
use taskloom_agent::{AgentExecutor, ContractRunner};
use taskloom_core::artifact::{ArtifactClass, classify_path};
use taskloom_core::error::AgentError;
use taskloom_core::namespace::Namespace;
use taskloom_core::record::FileChangeEvent;
use taskloom_core::store::{ClaimOutcome, TaskStore};
use taskloom_core::task::{Task, TaskPayload, TaskType};
use taskloom_memory::MemoryManager;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Map a changed artifact to the downstream agent that should react.
///
/// Deterministic and total: every path yields exactly one target.
pub fn route_file_change(path: &str) -> &'static str {
    match classify_path(path) {
        ArtifactClass::Code => "state_recorder",
        ArtifactClass::Test => "test_engineer",
        ArtifactClass::Docs | ArtifactClass::Architecture => "docs_writer",
        ArtifactClass::Config => "security_reviewer",
        ArtifactClass::Other => "state_recorder",
    }
}

/// The result of dispatching one task.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub task_id: String,
    pub to_agent: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Drives the task queue for one namespace.
pub struct Dispatcher {
    memory: Arc<MemoryManager>,
    runner: Arc<ContractRunner>,
    executors: HashMap<String, Arc<dyn AgentExecutor>>,
    namespace: Namespace,
    poll_interval: std::time::Duration,
    batch_size: usize,
}

impl Dispatcher {
    pub fn new(
        memory: Arc<MemoryManager>,
        runner: Arc<ContractRunner>,
        namespace: Namespace,
    ) -> Self {
        Self {
            memory,
            runner,
            executors: HashMap::new(),
            namespace,
            poll_interval: std::time::Duration::from_secs(5),
            batch_size: 8,
        }
    }

    /// Register an executor under its profile name.
    pub fn register(mut self, executor: Arc<dyn AgentExecutor>) -> Self {
        self.executors
            .insert(executor.profile().name.clone(), executor);
        self
    }

    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn task_store(&self) -> Arc<dyn TaskStore> {
        self.memory.task_store()
    }

    /// Create the follow-up task for an observed file change, routed by the
    /// shared classification policy. The new task inherits the event's
    /// namespace.
    pub async fn enqueue_file_change(
        &self,
        event: &FileChangeEvent,
    ) -> taskloom_core::Result<String> {
        let target = route_file_change(&event.file_path);
        let mut context = std::collections::BTreeMap::new();
        context.insert(
            "file_path".to_string(),
            serde_json::json!(event.file_path.clone()),
        );
        context.insert(
            "tool_used".to_string(),
            serde_json::json!(event.tool_used.clone()),
        );

        self.memory
            .create_task(
                &event.namespace,
                "coordinator",
                target,
                TaskType::FileChangeTrigger,
                TaskPayload {
                    description: format!("react to a change in {}", event.file_path),
                    context,
                    ..TaskPayload::default()
                },
            )
            .await
    }

    /// Claim and execute one task. Returns None if the claim was lost.
    async fn dispatch_task(&self, task: &Task) -> Option<DispatchOutcome> {
        let store = self.task_store();

        let claimed = match store.claim(&self.namespace, &task.id).await {
            Ok(ClaimOutcome::Claimed(claimed)) => claimed,
            Ok(ClaimOutcome::AlreadyClaimed) => {
                // Lost the race to another dispatcher. Skip, try another.
                debug!(task_id = %task.id, "Claim lost, skipping");
                return None;
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Claim failed");
                return Some(DispatchOutcome {
                    task_id: task.id.clone(),
                    to_agent: task.to_agent.clone(),
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        };

        let Some(executor) = self.executors.get(&claimed.to_agent) else {
            // No executor registered: visible failure, not a silent requeue.
            let err = AgentError::UnknownAgent(claimed.to_agent.clone());
            let message = err.to_string();
            if let Err(e) = store.fail(&self.namespace, &claimed.id, &message).await {
                warn!(task_id = %claimed.id, error = %e, "Could not record unknown-agent failure");
            }
            return Some(DispatchOutcome {
                task_id: claimed.id.clone(),
                to_agent: claimed.to_agent.clone(),
                success: false,
                error: Some(message),
            });
        };

        match self.runner.run(executor.as_ref(), &claimed).await {
            Ok(_) => Some(DispatchOutcome {
                task_id: claimed.id.clone(),
                to_agent: claimed.to_agent.clone(),
                success: true,
                error: None,
            }),
            Err(e) => Some(DispatchOutcome {
                task_id: claimed.id.clone(),
                to_agent: claimed.to_agent.clone(),
                success: false,
                error: Some(e.to_string()),
            }),
        }
    }

    /// Drain one batch of claimable tasks. Returns the outcomes of every
    /// task this dispatcher actually claimed.
    pub async fn dispatch_once(&self) -> Vec<DispatchOutcome> {
        let store = self.task_store();
        let pending = match store.pending(&self.namespace, None, self.batch_size).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "Cannot list pending tasks");
                return vec![];
            }
        };

        let mut outcomes = Vec::new();
        for task in &pending {
            if let Some(outcome) = self.dispatch_task(task).await {
                if let Some(error) = &outcome.error {
                    warn!(task_id = %outcome.task_id, error = %error, "Task dispatch failed");
                } else {
                    info!(task_id = %outcome.task_id, agent = %outcome.to_agent, "Task dispatched");
                }
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Start the polling dispatch loop.
    ///
    /// Returns a channel receiver that emits dispatch outcomes and a join
    /// handle. The loop stops when the receiver is dropped.
    pub fn start(self: Arc<Self>) -> (mpsc::Receiver<DispatchOutcome>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<DispatchOutcome>(64);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);

            loop {
                interval.tick().await;

                for outcome in self.dispatch_once().await {
                    if tx.send(outcome).await.is_err() {
                        debug!("Outcome receiver dropped, stopping dispatch loop");
                        return;
                    }
                }
            }
        });

        (rx, handle)
    }
}
