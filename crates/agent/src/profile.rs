//! Agent profiles — configuration data, not logic.
//!
//! A profile carries the prompt text and output conventions for one named
//! agent. The generic contract consumes profiles; it never branches on the
//! agent name. The `{namespace}` placeholder in the instructions text is
//! substituted with the real namespace at prompt-assembly time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prompt text and output conventions for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent name, unique within the registry
    pub name: String,

    /// Role text prepended to every prompt
    pub role: String,

    /// Agent-specific instructions; may contain `{namespace}`
    pub instructions: String,

    /// Template for artifact paths, with `{task_id}` substituted
    pub output_path_template: String,
}

impl AgentProfile {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        instructions: impl Into<String>,
        output_path_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            instructions: instructions.into(),
            output_path_template: output_path_template.into(),
        }
    }

    /// Resolve the artifact path for a task.
    pub fn output_path(&self, task_id: &str) -> String {
        self.output_path_template.replace("{task_id}", task_id)
    }
}

/// A lookup table of agent profiles.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, AgentProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in delegation graph targets.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(AgentProfile::new(
            "state_recorder",
            "You are the project state recorder. You keep a precise account of what \
             exists in the project and why.",
            "Record what changed in project {namespace}, what the change affects, and \
             any follow-up work it implies. Be factual and terse.",
            "records/state_{task_id}.md",
        ));
        registry.register(AgentProfile::new(
            "test_engineer",
            "You are the test engineer. You design focused tests for recently \
             changed behavior.",
            "For project {namespace}, write test cases covering the changed behavior, \
             including edge cases the change could regress.",
            "tests/plan_{task_id}.md",
        ));
        registry.register(AgentProfile::new(
            "docs_writer",
            "You are the documentation writer. You keep prose accurate and short.",
            "Update the documentation of project {namespace} to reflect the change \
             described in the task.",
            "docs/update_{task_id}.md",
        ));
        registry.register(AgentProfile::new(
            "security_reviewer",
            "You are the security reviewer. You examine configuration changes for \
             exposure of secrets, weakened permissions, and unsafe defaults.",
            "Review the configuration change in project {namespace} and list any \
             security concerns with severity.",
            "reviews/security_{task_id}.md",
        ));
        registry
    }

    pub fn register(&mut self, profile: AgentProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&AgentProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_routing_targets() {
        let registry = ProfileRegistry::builtin();
        for name in ["state_recorder", "test_engineer", "docs_writer", "security_reviewer"] {
            assert!(registry.get(name).is_some(), "missing builtin profile: {name}");
        }
    }

    #[test]
    fn output_path_substitutes_task_id() {
        let registry = ProfileRegistry::builtin();
        let profile = registry.get("test_engineer").unwrap();
        assert_eq!(profile.output_path("t42"), "tests/plan_t42.md");
    }

    #[test]
    fn register_overrides_by_name() {
        let mut registry = ProfileRegistry::builtin();
        registry.register(AgentProfile::new("docs_writer", "r", "i", "out/{task_id}.md"));
        assert_eq!(registry.get("docs_writer").unwrap().role, "r");
    }

    #[test]
    fn names_are_sorted() {
        let registry = ProfileRegistry::builtin();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
