//! Task — a unit of delegated work with a lifecycle status.
//!
//! Tasks are created by agents (or an external initializer) naming another
//! agent as recipient, claimed by a dispatcher, executed under the agent
//! contract, and finished as completed or failed. Status moves one way:
//! `pending -> in_progress -> {completed | failed}`. Completed and failed
//! are terminal; a task never re-enters pending.

use crate::namespace::Namespace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Why a task was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// One agent handing work to another
    Delegation,
    /// Fresh work from a human or scheduler
    NewTask,
    /// A project phase boundary was crossed
    PhaseTransition,
    /// A file write was observed and needs a downstream reaction
    FileChangeTrigger,
    /// First task of a brand-new project
    ProjectInitialization,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Delegation => "delegation",
            TaskType::NewTask => "new_task",
            TaskType::PhaseTransition => "phase_transition",
            TaskType::FileChangeTrigger => "file_change_trigger",
            TaskType::ProjectInitialization => "project_initialization",
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delegation" => Ok(TaskType::Delegation),
            "new_task" => Ok(TaskType::NewTask),
            "phase_transition" => Ok(TaskType::PhaseTransition),
            "file_change_trigger" => Ok(TaskType::FileChangeTrigger),
            "project_initialization" => Ok(TaskType::ProjectInitialization),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// The only legal moves are pending -> in_progress and
    /// in_progress -> completed/failed. Everything else is rejected.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// The structured work description carried by a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPayload {
    /// What the recipient agent is being asked to do
    #[serde(default)]
    pub description: String,

    /// Free-form context handed along by the sender
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,

    /// Explicit requirements the output must satisfy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,

    /// Outcomes the sender will verify against
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verifiable_outcomes: Vec<String>,

    /// Project phase this task belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Dispatch priority — higher runs first
    #[serde(default)]
    pub priority: i32,
}

/// The closed result of an agent contract run, attached to the task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionReport {
    Success {
        /// One-paragraph summary of what was done
        summary: String,

        /// Paths of artifacts created by this run
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files_created: Vec<String>,

        /// Paths of artifacts modified by this run
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files_modified: Vec<String>,

        /// Suggested follow-up work, if any
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        next_steps: Vec<String>,
    },
    Failure {
        error: String,
    },
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionReport::Success { .. })
    }
}

/// A unit of delegated work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Opaque identifier, generated at creation
    pub id: String,

    /// Isolation key — the task never leaves this namespace
    pub namespace: Namespace,

    /// Agent (or "human") that created the task
    pub from_agent: String,

    /// Agent expected to execute it
    pub to_agent: String,

    /// Why the task exists
    pub task_type: TaskType,

    /// The work description
    pub payload: TaskPayload,

    /// Lifecycle status
    pub status: TaskStatus,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task reached a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Attached on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionReport>,

    /// Attached on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(
        namespace: Namespace,
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        task_type: TaskType,
        payload: TaskPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            namespace,
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            task_type,
            payload,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        }
    }
}
