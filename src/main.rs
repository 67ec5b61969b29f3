// ABOUTME: Command-line entry point for the hybrid query orchestrator.
// ABOUTME: Classifies, plans or runs a query and prints the result as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hybrid_orchestrator::{AgentContext, Orchestrator, OrchestratorConfig, RoutingStats};

/// Hybrid query orchestrator
#[derive(Parser, Debug)]
#[command(name = "hybrid-orchestrator")]
#[command(about = "Route queries to domain workers or multi-step plans")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a query without planning or executing it
    Classify { query: String },
    /// Classify and plan a query without executing it
    Plan { query: String },
    /// Run a query through the full pipeline
    Run {
        query: String,
        /// Existing conversation thread to continue
        #[arg(long)]
        thread: Option<String>,
        /// User the request is made on behalf of
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = OrchestratorConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let orchestrator =
        Orchestrator::from_config(&config).context("Failed to initialise orchestrator")?;

    let output = match cli.command {
        Commands::Classify { query } => {
            serde_json::to_string_pretty(&orchestrator.classify_only(&query))?
        }
        Commands::Plan { query } => {
            serde_json::to_string_pretty(&orchestrator.plan_only(&query).await)?
        }
        Commands::Run {
            query,
            thread,
            user,
        } => {
            let mut context = AgentContext::new();
            if let Some(thread) = thread {
                context = context.with_thread(thread);
            }
            if let Some(user) = user {
                context = context.with_user(user);
            }

            let mut stats = RoutingStats::new();
            let result = orchestrator
                .process_query(&query, &mut context, &mut stats)
                .await;
            log::debug!("Routing stats: {}", serde_json::to_string(&stats)?);
            serde_json::to_string_pretty(&result)?
        }
    };

    println!("{}", output);
    Ok(())
}
