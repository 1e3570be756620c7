// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use gtm_core::domain::engine_config::EngineConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./aegis-gtm.yaml)
        #[arg(short, long, default_value = "./aegis-gtm.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. AEGIS_GTM_CONFIG_PATH: {}",
            std::env::var("AEGIS_GTM_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./aegis-gtm.yaml");
        println!("  4. ~/.aegis/gtm.yaml");
        println!("  5. /etc/aegis/gtm.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Engine:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Environment: {}", spec.environment.as_str());
    println!();

    println!("{}", "LLM Providers:".bold());
    if spec.llm_providers.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    }
    let mut providers: Vec<_> = spec.llm_providers.iter().collect();
    providers.sort_by_key(|p| p.priority);
    for provider in providers {
        let status = if provider.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!(
            "  {} ({}) priority {} [{}]",
            provider.name.bold(),
            provider.provider_type,
            provider.priority,
            status
        );
        println!("    Endpoint: {}", provider.endpoint);
        println!("    Model: {}", provider.model);
    }
    println!();

    println!("{}", "Circuit Breaker:".bold());
    if spec.circuit_breaker.disable {
        println!("  {}", "disabled".yellow());
    } else {
        println!("  Failure threshold: {}", spec.circuit_breaker.failure_threshold);
        println!("  Recovery timeout: {}s", spec.circuit_breaker.recovery_timeout_secs);
    }
    println!();

    println!("{}", "Scraping:".bold());
    println!("  Endpoint: {}", spec.scraping.endpoint);
    println!("  User agent: {}", spec.scraping.user_agent);
    println!("  Crawl limit: {}", spec.scraping.crawl_limit);
    println!();

    println!("{}", "Website Cache:".bold());
    if spec.environment.caching_enabled() {
        println!("  Directory: {}", spec.cache.directory.display());
        if spec.environment.enforces_cache_ttl() {
            println!("  TTL: {}h", spec.cache.ttl_hours);
        } else {
            println!("  TTL: {}", "none (manual invalidation)".dimmed());
        }
    } else {
        println!("  {}", "disabled".dimmed());
    }
    println!();

    println!("{}", "Content:".bold());
    println!("  Min chunk length: {}", spec.content.min_content_length);
    println!("  Max content length: {}", spec.content.max_content_length);
    println!("  Chunk size: {}", spec.content.chunk_size);
    println!();

    println!("{}", "Logging:".bold());
    println!("  Level: {}", spec.logging.level);
    println!("  Format: {}", spec.logging.format);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = EngineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    std::fs::write(&output, sample_config(with_examples))
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn sample_config(with_examples: bool) -> &'static str {
    if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    }
}
