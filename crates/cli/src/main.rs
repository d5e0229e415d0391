//! Taskloom CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Initialize config, data directory, and namespace
//! - `submit`   — Create a task in the queue
//! - `dispatch` — Run the dispatch loop (or a single pass)
//! - `status`   — Show project state and queue counts

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "taskloom",
    about = "Taskloom — task delegation and namespaced memory for agent pipelines",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and namespace marker
    Init {
        /// The project namespace
        #[arg(short, long)]
        namespace: String,
    },

    /// Create a task in the queue
    Submit {
        /// Recipient agent
        #[arg(short, long)]
        to: String,

        /// What the agent should do
        #[arg(short, long)]
        description: String,

        /// Dispatch priority (higher runs first)
        #[arg(short, long, default_value_t = 0)]
        priority: i32,
    },

    /// Run the dispatcher
    Dispatch {
        /// Drain one batch and exit instead of polling
        #[arg(long)]
        once: bool,
    },

    /// Show project state and queue counts
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { namespace } => commands::init::run(&namespace).await?,
        Commands::Submit {
            to,
            description,
            priority,
        } => commands::submit::run(&to, &description, priority).await?,
        Commands::Dispatch { once } => commands::dispatch::run(once).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
