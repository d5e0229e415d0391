//! Deterministic prompt assembly.
//!
//! One prompt string built from fixed sections in a fixed order: role text,
//! instructions (namespace placeholder substituted), task description,
//! requirements, verifiable outcomes, then a bounded excerpt of the top
//! context entries. Identical inputs produce identical prompts. Two caps
//! bound the size: characters per entry and total entry count.

use crate::profile::AgentProfile;
use taskloom_core::namespace::Namespace;
use taskloom_core::record::{MemoryRecord, ProjectState};
use taskloom_core::task::Task;
use taskloom_core::vector::VectorMatch;

/// Size caps for assembled prompts.
#[derive(Debug, Clone, Copy)]
pub struct PromptLimits {
    /// Character cap per included context entry
    pub max_excerpt_chars: usize,
    /// Total context entries (history + search) included
    pub max_context_entries: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_excerpt_chars: 600,
            max_context_entries: 8,
        }
    }
}

/// Everything the memory manager assembled for one contract run.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub project_state: ProjectState,
    pub history: Vec<MemoryRecord>,
    pub snippets: Vec<VectorMatch>,
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

/// Build the prompt for one contract run.
pub fn assemble(
    profile: &AgentProfile,
    namespace: &Namespace,
    task: &Task,
    context: &AssembledContext,
    limits: PromptLimits,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&profile.role);
    prompt.push_str("\n\n");

    prompt.push_str(&profile.instructions.replace("{namespace}", namespace.as_str()));
    prompt.push_str("\n\n");

    prompt.push_str("## Task\n");
    prompt.push_str(&task.payload.description);
    prompt.push('\n');

    if !task.payload.requirements.is_empty() {
        prompt.push_str("\n## Requirements\n");
        for requirement in &task.payload.requirements {
            prompt.push_str(&format!("- {requirement}\n"));
        }
    }

    if !task.payload.verifiable_outcomes.is_empty() {
        prompt.push_str("\n## Verifiable outcomes\n");
        for outcome in &task.payload.verifiable_outcomes {
            prompt.push_str(&format!("- {outcome}\n"));
        }
    }

    prompt.push_str(&format!(
        "\n## Project\nfiles: {}, records: {}",
        context.project_state.total_files, context.project_state.total_records
    ));
    if let Some(phase) = &context.project_state.current_phase {
        prompt.push_str(&format!(", phase: {phase}"));
    }
    prompt.push('\n');

    // History first, then search results, under one shared entry budget.
    let mut remaining = limits.max_context_entries;

    if remaining > 0 && !context.history.is_empty() {
        prompt.push_str("\n## Prior work\n");
        for record in context.history.iter().take(remaining) {
            prompt.push_str(&format!(
                "- [{} v{}] {}: {}\n",
                record.file_path,
                record.version,
                record.brief_description,
                excerpt(&record.elements_description, limits.max_excerpt_chars)
            ));
        }
        remaining = remaining.saturating_sub(context.history.len());
    }

    if remaining > 0 && !context.snippets.is_empty() {
        prompt.push_str("\n## Relevant context\n");
        for snippet in context.snippets.iter().take(remaining) {
            prompt.push_str(&format!(
                "- [score={:.2}] {}\n",
                snippet.score,
                excerpt(&snippet.payload.content, limits.max_excerpt_chars)
            ));
        }
    }

    prompt
}
