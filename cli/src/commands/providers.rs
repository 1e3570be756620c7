// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! LLM provider commands
//!
//! Commands: status
//!
//! Breaker state lives in the process that owns the `LLMClient`. A one-shot
//! CLI invocation builds a fresh client, so every circuit reads CLOSED with
//! zero counters; live state is only visible when the engine is embedded in
//! a long-lived process.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use gtm_core::domain::circuit_breaker::CircuitState;
use gtm_core::domain::engine_config::EngineConfigManifest;

use crate::runtime::Engine;

#[derive(Subcommand)]
pub enum ProvidersCommand {
    /// Show registered providers in failover order with breaker state.
    ///
    /// Breakers start fresh in every CLI invocation, so this shows CLOSED with
    /// zero counters unless the engine runs inside a long-lived process. Use
    /// --probe to check provider reachability now.
    Status {
        /// Also send a health probe to every provider
        #[arg(long)]
        probe: bool,
    },
}

pub async fn handle_command(
    command: ProvidersCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let engine = Engine::build(config)?;

    match command {
        ProvidersCommand::Status { probe } => {
            let report = engine.llm.health_report().await;
            if report.is_empty() {
                println!("{}", "No LLM providers registered".yellow());
                return Ok(());
            }

            println!("{}", "LLM Providers (failover order):".bold());
            println!(
                "  {}",
                "Breaker state is per process; a fresh CLI run starts every circuit CLOSED".dimmed()
            );
            for health in &report {
                let state = match health.breaker.state {
                    CircuitState::Closed => "CLOSED".green(),
                    CircuitState::HalfOpen => "HALF_OPEN".yellow(),
                    CircuitState::Open => "OPEN".red(),
                };
                println!(
                    "  {} priority {} [{}] failures {} (total {}/{} ok)",
                    health.name.bold(),
                    health.priority,
                    state,
                    health.breaker.failure_count,
                    health.breaker.total_failures,
                    health.breaker.total_successes
                );
            }

            if probe {
                println!();
                println!("{}", "Health probes:".bold());
                for (name, result) in engine.llm.health_check_all().await {
                    match result {
                        Ok(()) => println!("  {} {}", "✓".green(), name),
                        Err(e) => println!("  {} {}: {}", "✗".red(), name, e),
                    }
                }
            }
        }
    }

    Ok(())
}
