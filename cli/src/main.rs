// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS GTM CLI
//!
//! The `aegis-gtm` binary drives the go-to-market analysis engine from the
//! command line.
//!
//! ## Commands
//!
//! - `aegis-gtm analyze <type>` - Run product_overview, target_account, target_persona or email_generation
//! - `aegis-gtm website validate|fetch` - Check and scrape websites
//! - `aegis-gtm cache clear|invalidate` - Manage the website cache
//! - `aegis-gtm providers status` - Circuit breaker and health view of LLM providers
//! - `aegis-gtm config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use aegis_gtm::commands::{
    self, AnalyzeCommand, CacheCommand, ConfigCommand, ProvidersCommand, WebsiteCommand,
};
use gtm_core::domain::engine_config::{EngineConfigManifest, LoggingConfig};

/// AEGIS GTM - Marketing analysis on top of resilient LLM orchestration
#[derive(Parser)]
#[command(name = "aegis-gtm")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AEGIS_GTM_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "AEGIS_GTM_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an analysis
    #[command(name = "analyze")]
    Analyze {
        #[command(flatten)]
        command: AnalyzeCommand,
    },

    /// Website validation and scraping
    #[command(name = "website")]
    Website {
        #[command(subcommand)]
        command: WebsiteCommand,
    },

    /// Website cache management
    #[command(name = "cache")]
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// LLM provider status
    #[command(name = "providers")]
    Providers {
        #[command(subcommand)]
        command: ProvidersCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logging settings come from the config when it loads; a broken config is
    // reported by the command itself
    let logging = EngineConfigManifest::load_or_default(cli.config.clone())
        .map(|config| config.spec.logging)
        .unwrap_or_default();
    init_logging(cli.log_level.as_deref().unwrap_or(&logging.level), &logging)?;

    match cli.command {
        Some(Commands::Analyze { command }) => {
            commands::analyze::handle_command(command, cli.config).await
        }
        Some(Commands::Website { command }) => {
            commands::website::handle_command(command, cli.config).await
        }
        Some(Commands::Cache { command }) => {
            commands::cache::handle_command(command, cli.config).await
        }
        Some(Commands::Providers { command }) => {
            commands::providers::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
