//! Ghostwriter Server
//!
//! CLI entry point: runs the pipeline from the terminal, exposes the web
//! search helper the researchers shell out to, and serves the HTTP API.

mod api;
mod harness;

use clap::{Parser, Subcommand};
use ghostwriter_core::config::{Credentials, GhostwriterConfig};
use ghostwriter_core::pipeline::{Ghostwriter, RunScope};
use std::net::SocketAddr;
use tokio::net::TcpListener;

const DEFAULT_FULL_TOPIC: &str = "DeFi yield farming opportunities on Stellar blockchain in 2025";
const DEFAULT_RESEARCH_TOPIC: &str = "Blend Capital lending protocol overview";
const DEFAULT_EXTRACTION_TOPIC: &str = "Stellar blockchain consensus mechanism";

#[derive(Parser, Clone)]
#[command(author, version, about = "Ghostwriter - Cited research reports from a multi-stage LLM pipeline")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Run the complete 8-stage pipeline (default)
    Full {
        topic: Option<String>,
        #[command(flatten)]
        run: RunArgs,
        /// Style guide for the final report
        #[arg(short, long, default_value = "defi_report")]
        style: String,
    },
    /// Run only the research stage
    Stage1 {
        topic: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Run research, draft and extraction
    Stages123 {
        topic: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Search the web and print the results
    Search {
        query: String,
        #[arg(long, default_value = "5")]
        max_results: u32,
        /// Print JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// List sessions in the workspace
    Sessions,
    /// Start the HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

#[derive(clap::Args, Clone, Default)]
struct RunArgs {
    /// Number of parallel researchers
    #[arg(short, long)]
    researchers: Option<usize>,
    /// Maximum revise/re-verify passes
    #[arg(long)]
    max_revisions: Option<u32>,
}

impl RunArgs {
    fn apply(&self, config: &mut GhostwriterConfig) {
        if let Some(n) = self.researchers {
            config.num_researchers = n;
        }
        if let Some(n) = self.max_revisions {
            config.max_revision_iterations = n;
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so credentials and GHOSTWRITER_* overrides are visible
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    let command = args.command.unwrap_or(CliCommand::Full {
        topic: None,
        run: RunArgs::default(),
        style: "defi_report".to_string(),
    });

    match command {
        CliCommand::Full { topic, run, style } => {
            let mut config = GhostwriterConfig::from_env()?;
            run.apply(&mut config);
            let topic = topic.unwrap_or_else(|| DEFAULT_FULL_TOPIC.to_string());
            harness::run_pipeline(config, &topic, &style, RunScope::Full).await
        }
        CliCommand::Stage1 { topic, run } => {
            let mut config = GhostwriterConfig::from_env()?;
            run.apply(&mut config);
            let topic = topic.unwrap_or_else(|| DEFAULT_RESEARCH_TOPIC.to_string());
            harness::run_pipeline(config, &topic, "technical", RunScope::Research).await
        }
        CliCommand::Stages123 { topic, run } => {
            let mut config = GhostwriterConfig::from_env()?;
            run.apply(&mut config);
            let topic = topic.unwrap_or_else(|| DEFAULT_EXTRACTION_TOPIC.to_string());
            harness::run_pipeline(config, &topic, "technical", RunScope::ThroughExtraction).await
        }
        CliCommand::Search {
            query,
            max_results,
            json,
        } => harness::search(&query, max_results, json).await,
        CliCommand::Sessions => harness::list_sessions(&GhostwriterConfig::from_env()?).await,
        CliCommand::Serve { port } => run_server(port).await,
    }
}

async fn run_server(port: u16) -> anyhow::Result<()> {
    let config = GhostwriterConfig::from_env()?;
    let credentials = Credentials::from_env();
    // Refuse to start without the credentials every run needs
    Ghostwriter::from_credentials(config.clone(), &credentials)?;
    let state = api::AppState::new(config, credentials).await?;
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    println!("🚀 Ghostwriter API listening on http://{}/api/ghostwriter", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
