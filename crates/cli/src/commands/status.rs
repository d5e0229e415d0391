//! `taskloom status` — Show project state and queue counts.

use taskloom_core::store::TaskStore;
use taskloom_core::task::TaskStatus;

pub async fn run() -> anyhow::Result<()> {
    let ctx = super::open().await?;
    let store = ctx.memory.task_store();

    let state = ctx.memory.get_project_state(&ctx.namespace).await;

    println!("Taskloom Status");
    println!("===============");
    println!("  Namespace:   {}", ctx.namespace);
    println!("  Data dir:    {}", ctx.config.data_dir.display());
    println!("  Files:       {}", state.total_files);
    println!("  Records:     {}", state.total_records);
    match &state.current_phase {
        Some(phase) => println!("  Phase:       {phase}"),
        None => println!("  Phase:       (none)"),
    }
    if let Some(updated) = state.last_updated {
        println!("  Updated:     {updated}");
    }

    println!("\n  Queue:");
    for status in [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ] {
        let count = store.count(&ctx.namespace, Some(status)).await?;
        println!("    {:<12} {count}", status.as_str());
    }

    Ok(())
}
