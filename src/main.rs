use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use outreach::approval::ApprovalGate;
use outreach::config::AppConfig;
use outreach::server::{create_router, AppState};
use outreach::shutdown::{graceful_shutdown, wait_for_shutdown};
use outreach::workflow::types::Phase;
use outreach::workflow::{AbortSignal, Orchestrator};

#[derive(Parser)]
#[command(name = "outreach", about = "Research a professor, draft an email, send it once approved")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one outreach workflow, asking for approval on the terminal
    Run {
        /// Professor identifier substituted into the profile source URLs
        identifier: String,

        /// Skip the approval prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Serve the HTTP API, where approvals arrive as requests
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the terminal state
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            identifier,
            auto_approve,
        } => run_once(&config, &identifier, auto_approve).await,
        Command::Serve => {
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_once(
    config: &AppConfig,
    identifier: &str,
    auto_approve: bool,
) -> anyhow::Result<ExitCode> {
    let orchestrator = Orchestrator::from_config(config)?;
    let gate = ApprovalGate::from_config(&config.approval, auto_approve);

    let abort = AbortSignal::new();
    let on_signal = abort.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        on_signal.abort();
        tracing::warn!("Run will stop at the next stage boundary; signal again to exit now");
        wait_for_shutdown().await;
        std::process::exit(130);
    });

    let terminal = orchestrator.run(identifier, &gate, &abort).await?;
    println!("{}", serde_json::to_string_pretty(&terminal)?);

    Ok(match terminal.phase {
        Phase::Failed | Phase::Aborted => ExitCode::FAILURE,
        Phase::Done | Phase::RejectedEnd => ExitCode::SUCCESS,
    })
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting outreach server"
    );

    let state = Arc::new(AppState::new(&config)?);
    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    ))
    .await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    graceful_shutdown(&state).await;

    Ok(())
}
