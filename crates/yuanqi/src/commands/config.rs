//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use yuanqi_client::DEFAULT_ENDPOINT;
use yuanqi_config::YuanqiConfig;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration and which files were loaded
    Show,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = masked(ctx.config());

    if ctx.json_output {
        let sources: Vec<_> = ctx
            .loaded
            .sources
            .iter()
            .map(|s| {
                json!({
                    "layer": s.layer.as_str(),
                    "path": s.path.display().to_string(),
                    "loaded": s.loaded,
                })
            })
            .collect();
        let output = json!({
            "config": config,
            "sources": sources,
            "warnings": ctx.loaded.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# Yuanqi Configuration\n");

    println!("Config file search order (later overrides earlier):");
    for source in &ctx.loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!(
            "  {} {:<8} {}",
            status,
            source.layer.as_str(),
            source.path.display()
        );
    }
    println!();

    let unset = "(not set)";
    println!("Assistant:");
    println!("  assistant_id: {}", config.assistant_id.as_deref().unwrap_or(unset));
    println!("  user_id:      {}", config.user_id.as_deref().unwrap_or(unset));
    println!("  token:        {}", config.token.as_deref().unwrap_or(unset));
    println!("  version:      {}", config.version.as_deref().unwrap_or(unset));
    println!(
        "  chat_type:    {}",
        config.chat_type.as_deref().unwrap_or("published")
    );
    println!(
        "  endpoint:     {}",
        config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    );
    match config.timeout() {
        Some(timeout) => println!("  timeout:      {}s", timeout.as_secs()),
        None => println!("  timeout:      none"),
    }
    println!();

    if let Err(e) = config.validate() {
        println!("⚠ {}\n", e);
    }

    if !ctx.loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &ctx.loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        println!("{}", config.to_toml()?);
    }

    Ok(())
}

/// A copy of `config` that is safe to print.
fn masked(config: &YuanqiConfig) -> YuanqiConfig {
    YuanqiConfig {
        token: config.masked_token(),
        ..config.clone()
    }
}
