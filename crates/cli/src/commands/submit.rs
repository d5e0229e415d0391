//! `taskloom submit` — Create a task in the queue.

use taskloom_core::task::{TaskPayload, TaskType};

pub async fn run(to: &str, description: &str, priority: i32) -> anyhow::Result<()> {
    let ctx = super::open().await?;

    let id = ctx
        .memory
        .create_task(
            &ctx.namespace,
            "human",
            to,
            TaskType::NewTask,
            TaskPayload {
                description: description.to_string(),
                priority,
                ..TaskPayload::default()
            },
        )
        .await?;

    println!("Created task {id} for {to} in '{}'", ctx.namespace);
    Ok(())
}
