use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autopr::codegen::AttachedFile;
use autopr::config::AppConfig;
use autopr::server::{create_router, AppState};
use autopr::shutdown::cancel_on_shutdown;
use autopr::workflow::{WorkflowRequest, WorkflowResult};

#[derive(Parser)]
#[command(name = "autopr", about = "Turn a prompt into a GitHub pull request")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Run one workflow and print the result as JSON.
    /// Credentials come from configuration (ai.api_key, github.token).
    Execute {
        /// Repository URL, e.g. https://github.com/owner/repo
        #[arg(long)]
        repo: String,
        /// What to change
        #[arg(long)]
        prompt: String,
        /// Work on this existing branch instead of creating one
        #[arg(long)]
        branch: Option<String>,
        /// Model override for the AI calls
        #[arg(long)]
        model: Option<String>,
        /// File to attach to the prompt (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(config.logging.json);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Execute {
            repo,
            prompt,
            branch,
            model,
            files,
        } => execute_once(config, repo, prompt, branch, model, files).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        workspace = %config.workspace.base_dir.display(),
        "Starting autopr server"
    );

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(config.clone(), shutdown.clone()));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    ))
    .await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel_on_shutdown(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn execute_once(
    config: AppConfig,
    repo: String,
    prompt: String,
    branch: Option<String>,
    model: Option<String>,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let mut attached_files = Vec::with_capacity(files.len());
    for path in files {
        let content = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        attached_files.push(AttachedFile::new(name, content));
    }

    let credentials = config.credential_defaults();
    let request = WorkflowRequest {
        prompt,
        ai_credential: credentials.resolve_ai_key(None),
        repository_url: repo,
        vcs_credential: credentials.resolve_github_token(None),
        target_branch: branch,
        attached_files,
        model_override: model,
    };

    let shutdown = CancellationToken::new();
    let state = AppState::new(config, shutdown.clone());
    tokio::spawn(cancel_on_shutdown(shutdown.clone()));

    let result = state.orchestrator.execute(&request, &shutdown).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let WorkflowResult::Failure { .. } = result {
        std::process::exit(1);
    }
    Ok(())
}
