//! Folio CLI - Command-line interface
//!
//! Usage:
//!   folio build-index
//!   folio refresh
//!   folio query <question> [--mode hr|technical|summary] [--answer]
//!   folio repo <owner/name>
//!   folio config

use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_core::config::AppConfig;
use folio_core::ChatMode;
use folio_ingest::{FetchLimits, GitHubClient, RepoFetcher};
use folio_rag::{context_sources, FolioRuntime, PreparedChat};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Portfolio assistant retrieval toolkit")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to ./folio.toml when present)
    #[arg(long, global = true, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the portfolio and resume indexes from their sources
    BuildIndex,
    /// Clear the repository cache and rebuild the base indexes
    Refresh,
    /// Print the context retrieved for a question
    Query {
        /// Question to ask
        question: String,
        /// Answering persona
        #[arg(long, default_value = "hr")]
        mode: ChatMode,
        /// Portfolio results to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Also generate an answer from the context
        #[arg(long)]
        answer: bool,
    },
    /// Fetch and index a repository ahead of time
    Repo {
        /// Repository identifier, e.g. owner/name
        id: String,
    },
    /// Print the effective configuration with secrets redacted
    Config,
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,folio={}", config.logging.level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn query(
    runtime: &FolioRuntime,
    question: &str,
    mode: ChatMode,
    top_k: Option<usize>,
    answer: bool,
) -> anyhow::Result<()> {
    runtime.start().await?;

    let context = runtime
        .engine()
        .retrieve_with_top_k(question, mode, top_k)
        .await;
    if context.is_empty() {
        println!("(no context retrieved)");
    }
    for (i, chunk) in context.iter().enumerate() {
        println!("--- {} ---\n{}\n", i + 1, chunk);
    }
    println!("sources: {}", context_sources(&context).join(", "));

    if answer {
        let chat = runtime.chat();
        let response = match chat.prepare(question, mode).await {
            PreparedChat::Redirect(message) => message,
            PreparedChat::Ready { system, user, .. } => {
                chat.responder().complete(&system, &user).await
            }
        };
        println!("\n=== answer ({mode}) ===\n{response}");
    }
    Ok(())
}

async fn prebuild_repo(runtime: &FolioRuntime, id: &str) -> anyhow::Result<()> {
    runtime.start().await?;
    tracing::info!("Prebuilding repository index for {}", id);

    let github = &runtime.config().github;
    let host = GitHubClient::from_config(github)?;
    let fetcher = RepoFetcher::new(Arc::new(host)).with_limits(FetchLimits::from(github));

    let store = runtime
        .indexes()
        .get_or_build_repo_index(id, &fetcher)
        .await
        .with_context(|| format!("indexing repository {id}"))?;
    println!("{id}: {} vectors", store.size());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config);

    if let Commands::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    let runtime = FolioRuntime::from_config(config)?;

    match cli.command {
        Commands::BuildIndex => {
            let sizes = runtime.rebuild().await?;
            println!(
                "Indexes built: portfolio {} vectors, resume {} vectors",
                sizes.portfolio, sizes.resume
            );
        }
        Commands::Refresh => {
            let sizes = runtime.refresh().await?;
            println!(
                "Repository cache cleared. Indexes rebuilt: portfolio {} vectors, resume {} vectors",
                sizes.portfolio, sizes.resume
            );
        }
        Commands::Query {
            question,
            mode,
            top_k,
            answer,
        } => query(&runtime, &question, mode, top_k, answer).await?,
        Commands::Repo { id } => prebuild_repo(&runtime, &id).await?,
        Commands::Config => {}
    }

    Ok(())
}
