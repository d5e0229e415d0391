//! Durable project memory: records, file-change events, approval gates,
//! and the derived project state aggregate.

use crate::namespace::Namespace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of fact a memory record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Specification,
    Architecture,
    DebugReport,
    EdgeCaseTest,
    ChaosTest,
    UserStory,
    /// Snapshot of what an agent did during a contract run
    ContextSnapshot,
    Other,
}

impl MemoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryKind::Specification => "specification",
            MemoryKind::Architecture => "architecture",
            MemoryKind::DebugReport => "debug_report",
            MemoryKind::EdgeCaseTest => "edge_case_test",
            MemoryKind::ChaosTest => "chaos_test",
            MemoryKind::UserStory => "user_story",
            MemoryKind::ContextSnapshot => "context_snapshot",
            MemoryKind::Other => "other",
        }
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "specification" => Ok(MemoryKind::Specification),
            "architecture" => Ok(MemoryKind::Architecture),
            "debug_report" => Ok(MemoryKind::DebugReport),
            "edge_case_test" => Ok(MemoryKind::EdgeCaseTest),
            "chaos_test" => Ok(MemoryKind::ChaosTest),
            "user_story" => Ok(MemoryKind::UserStory),
            "context_snapshot" => Ok(MemoryKind::ContextSnapshot),
            "other" => Ok(MemoryKind::Other),
            other => Err(format!("unknown memory kind: {other}")),
        }
    }
}

/// A durable, versioned fact about a produced artifact.
///
/// Later writes for the same (namespace, file_path) are new versions, not
/// overwrites; history stays queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Isolation key
    pub namespace: Namespace,

    /// The artifact this record describes
    pub file_path: String,

    /// Which agent produced it
    pub agent: String,

    /// Kind of fact
    pub kind: MemoryKind,

    /// One-line description
    pub brief_description: String,

    /// What the artifact contains
    #[serde(default)]
    pub elements_description: String,

    /// Why it was produced this way
    #[serde(default)]
    pub rationale: String,

    /// Version line for this (namespace, file_path); starts at 1
    pub version: i64,

    /// Optional quality score in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f32>,

    /// Free-form structured metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// When this version was written
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a version-1 record; the store bumps the version on insert if
    /// earlier versions exist for the same (namespace, file_path).
    pub fn new(
        namespace: Namespace,
        file_path: impl Into<String>,
        agent: impl Into<String>,
        kind: MemoryKind,
        brief_description: impl Into<String>,
    ) -> Self {
        Self {
            namespace,
            file_path: file_path.into(),
            agent: agent.into(),
            kind,
            brief_description: brief_description.into(),
            elements_description: String::new(),
            rationale: String::new(),
            version: 1,
            quality_score: None,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// An observed file write. Append-only, one event per write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangeEvent {
    pub namespace: Namespace,
    pub file_path: String,

    /// Which operation produced the change
    pub tool_used: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Bounded-length snippet of the written content
    #[serde(default)]
    pub content_preview: String,
}

/// Upper bound on stored content previews.
pub const CONTENT_PREVIEW_MAX: usize = 500;

impl FileChangeEvent {
    pub fn new(
        namespace: Namespace,
        file_path: impl Into<String>,
        tool_used: impl Into<String>,
        content: &str,
    ) -> Self {
        let mut preview = String::with_capacity(CONTENT_PREVIEW_MAX.min(content.len()));
        for c in content.chars() {
            if preview.len() + c.len_utf8() > CONTENT_PREVIEW_MAX {
                break;
            }
            preview.push(c);
        }
        Self {
            namespace,
            file_path: file_path.into(),
            tool_used: tool_used.into(),
            timestamp: Utc::now(),
            session_id: None,
            content_preview: preview,
        }
    }
}

/// A human-approval gate. Blocking, and deliberately outside the delegation
/// graph — approvals are not tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub namespace: Namespace,
    pub phase: String,
    pub agent: String,
    pub artifacts: Vec<String>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate, namespace-scoped summary derived from records and events.
/// Not separately authoritative; an empty namespace yields zeroed defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectState {
    pub total_files: usize,
    pub total_records: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> Namespace {
        Namespace::new("proj_test").unwrap()
    }

    #[test]
    fn record_starts_at_version_one() {
        let rec = MemoryRecord::new(
            ns(),
            "src/lexer.rs",
            "implementer",
            MemoryKind::Architecture,
            "token stream design",
        );
        assert_eq!(rec.version, 1);
        assert!(rec.quality_score.is_none());
    }

    #[test]
    fn memory_kind_round_trip() {
        for kind in [
            MemoryKind::Specification,
            MemoryKind::DebugReport,
            MemoryKind::ContextSnapshot,
            MemoryKind::Other,
        ] {
            let parsed: MemoryKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn event_preview_is_bounded() {
        let long = "x".repeat(CONTENT_PREVIEW_MAX * 3);
        let ev = FileChangeEvent::new(ns(), "big.txt", "file_write", &long);
        assert_eq!(ev.content_preview.len(), CONTENT_PREVIEW_MAX);
    }

    #[test]
    fn event_preview_respects_char_boundaries() {
        let content = "é".repeat(CONTENT_PREVIEW_MAX);
        let ev = FileChangeEvent::new(ns(), "utf8.txt", "file_write", &content);
        assert!(ev.content_preview.len() <= CONTENT_PREVIEW_MAX);
        assert!(ev.content_preview.chars().all(|c| c == 'é'));
    }

    #[test]
    fn project_state_defaults_to_zero() {
        let state = ProjectState::default();
        assert_eq!(state.total_files, 0);
        assert_eq!(state.total_records, 0);
        assert!(state.last_updated.is_none());
        assert!(state.current_phase.is_none());
    }
}
