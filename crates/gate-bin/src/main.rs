//! Clarity gate command-line interface.
//!
//! Wires the identity provider, the request orchestrator and the access
//! evaluator into one `AuthRuntime` and drives the lifecycle from
//! subcommands. Carries no gate logic of its own.

mod app;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Clarity gate command-line interface.
#[derive(Parser)]
#[command(name = "clarity-gate")]
#[command(about = "Session and identity gate for the Clarity dashboard")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Origin the passwordless auth endpoints are mounted on.
    #[arg(
        long,
        env = "CLARITY_AUTH_BASE_URL",
        default_value = "https://app.clarity.dev",
        global = true
    )]
    auth_url: String,

    /// Origin of the dashboard backend API.
    #[arg(
        long,
        env = "CLARITY_API_BASE_URL",
        default_value = "https://app.clarity.dev",
        global = true
    )]
    api_url: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CLARITY_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the stored session and print a snapshot
    Status,
    /// Interactive passwordless login
    Login,
    /// Sign out and clear the local session
    Logout,
    /// Show which dashboard routes the current session may enter
    Routes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let runtime = app::build_runtime(&cli.auth_url, &cli.api_url)?;

    match cli.command {
        Commands::Status => app::status(&runtime).await?,
        Commands::Login => app::login(&runtime).await?,
        Commands::Logout => app::logout(&runtime).await?,
        Commands::Routes => app::routes(&runtime).await?,
    }

    Ok(())
}
