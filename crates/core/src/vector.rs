//! Vector entries and the semantic collection buckets.
//!
//! Each collection holds fixed-dimension vectors plus a payload. Entries are
//! replaced by delete+insert, never updated in place.

use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};

/// The fixed set of semantic buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    AgentMemories,
    ProjectPatterns,
    VerificationOutcomes,
    CodeSnippets,
    TestPatterns,
    ArchitecturePatterns,
    UserInteractions,
    CrossProjectInsights,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::AgentMemories => "agent_memories",
            Collection::ProjectPatterns => "project_patterns",
            Collection::VerificationOutcomes => "verification_outcomes",
            Collection::CodeSnippets => "code_snippets",
            Collection::TestPatterns => "test_patterns",
            Collection::ArchitecturePatterns => "architecture_patterns",
            Collection::UserInteractions => "user_interactions",
            Collection::CrossProjectInsights => "cross_project_insights",
        }
    }

    /// All collections, for bulk creation at start-up.
    pub fn all() -> [Collection; 8] {
        [
            Collection::AgentMemories,
            Collection::ProjectPatterns,
            Collection::VerificationOutcomes,
            Collection::CodeSnippets,
            Collection::TestPatterns,
            Collection::ArchitecturePatterns,
            Collection::UserInteractions,
            Collection::CrossProjectInsights,
        ]
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload stored alongside a vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPayload {
    pub namespace: Namespace,

    /// The text this vector was computed from
    pub content: String,

    /// Free-form tags (file path, kind, phase, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// An embedding plus payload, stored in a namespace-scoped collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
}

/// One ranked result of a nearest-neighbor search.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    /// Cosine similarity to the query, in [-1, 1]
    pub score: f32,
    pub payload: VectorPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_are_stable() {
        assert_eq!(Collection::CodeSnippets.as_str(), "code_snippets");
        assert_eq!(Collection::AgentMemories.as_str(), "agent_memories");
    }

    #[test]
    fn all_collections_are_distinct() {
        let all = Collection::all();
        let names: std::collections::HashSet<&str> = all.iter().map(|c| c.as_str()).collect();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn collection_serializes_snake_case() {
        let json = serde_json::to_string(&Collection::TestPatterns).unwrap();
        assert_eq!(json, "\"test_patterns\"");
    }
}
