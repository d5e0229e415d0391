//! `taskloom dispatch` — Run the dispatcher against the configured project.

use std::sync::Arc;
use std::time::Duration;
use taskloom_agent::{ContractRunner, DocumentExecutor, ProfileRegistry, PromptLimits};
use taskloom_coordinator::Dispatcher;
use taskloom_core::record::MemoryKind;
use taskloom_providers::HttpGenerativeProvider;
use tracing::info;

/// Document kind each built-in agent's output is recorded under.
const BUILTIN_AGENTS: [(&str, MemoryKind); 4] = [
    ("state_recorder", MemoryKind::Other),
    ("test_engineer", MemoryKind::EdgeCaseTest),
    ("docs_writer", MemoryKind::Specification),
    ("security_reviewer", MemoryKind::DebugReport),
];

pub async fn run(once: bool) -> anyhow::Result<()> {
    let ctx = super::open().await?;

    let provider = Arc::new(HttpGenerativeProvider::new(
        ctx.config.generative.api_url.clone(),
        ctx.config.generative.api_key.clone().unwrap_or_default(),
        ctx.config.generative.model.clone(),
    )?);

    let runner = Arc::new(
        ContractRunner::new(
            ctx.memory.clone(),
            provider,
            ctx.namespace.clone(),
            ctx.config.data_dir.join("artifacts"),
        )
        .with_timeout(Duration::from_secs(ctx.config.generative.timeout_secs))
        .with_max_tokens(ctx.config.generative.max_tokens)
        .with_prompt_limits(PromptLimits {
            max_excerpt_chars: ctx.config.context.max_excerpt_chars,
            max_context_entries: ctx.config.context.max_context_entries,
        }),
    );

    let registry = ProfileRegistry::builtin();
    let mut dispatcher = Dispatcher::new(ctx.memory.clone(), runner, ctx.namespace.clone())
        .with_poll_interval(Duration::from_secs(ctx.config.dispatch.poll_interval_secs))
        .with_batch_size(ctx.config.dispatch.batch_size);

    for (name, kind) in BUILTIN_AGENTS {
        let profile = registry
            .get(name)
            .expect("builtin registry covers builtin agents")
            .clone();
        dispatcher = dispatcher.register(Arc::new(DocumentExecutor::new(profile, kind)));
    }

    if once {
        let outcomes = dispatcher.dispatch_once().await;
        println!("Dispatched {} task(s)", outcomes.len());
        for outcome in outcomes {
            match outcome.error {
                None => println!("  {} -> {}  ok", outcome.task_id, outcome.to_agent),
                Some(error) => {
                    println!("  {} -> {}  FAILED: {error}", outcome.task_id, outcome.to_agent)
                }
            }
        }
        return Ok(());
    }

    info!(namespace = %ctx.namespace, "Dispatch loop running; Ctrl-C to stop");
    let (mut rx, handle) = Arc::new(dispatcher).start();

    loop {
        tokio::select! {
            outcome = rx.recv() => {
                match outcome {
                    Some(outcome) => match outcome.error {
                        None => info!(task_id = %outcome.task_id, agent = %outcome.to_agent, "completed"),
                        Some(error) => info!(task_id = %outcome.task_id, agent = %outcome.to_agent, %error, "failed"),
                    },
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}
