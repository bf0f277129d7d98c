//! Yuanqi - command-line client for Yuanqi agents
//!
//! Main entry point for the Yuanqi CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ask, config};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Yuanqi - command-line client for Yuanqi agents
#[derive(Parser)]
#[command(name = "yuanqi")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding config.toml (default: ~/.config/yuanqi)
    #[arg(long, global = true, env = "YUANQI_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Assistant id
    #[arg(long, global = true, env = "YUANQI_ASSISTANT_ID")]
    pub assistant_id: Option<String>,

    /// User id sent with every request
    #[arg(long, global = true, env = "YUANQI_USER_ID")]
    pub user_id: Option<String>,

    /// API token
    #[arg(long, global = true, env = "YUANQI_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask an assistant a one-shot question
    Ask(ask::AskArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for replies and --json output.
    let default_filter = if cli.verbose {
        "yuanqi=debug,yuanqi_client=debug,yuanqi_config=debug,info"
    } else {
        "yuanqi=info,yuanqi_client=warn,yuanqi_config=warn,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();

    // Files and YUANQI_* variables, then command-line flags on top
    let mut loaded =
        yuanqi_config::load_config_with_options(None, cli.config_dir.as_deref(), |var| {
            std::env::var(var).ok()
        })?;
    loaded.config.merge(yuanqi_config::YuanqiConfig {
        assistant_id: cli.assistant_id,
        user_id: cli.user_id,
        token: cli.token,
        ..Default::default()
    });
    tracing::debug!(sources = ?loaded.loaded_from(), "Resolved configuration");

    let ctx = commands::Context {
        loaded,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
