// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Website cache commands
//!
//! Commands: clear, invalidate

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use gtm_core::domain::engine_config::EngineConfigManifest;
use gtm_core::domain::website::CacheTier;

use crate::runtime::Engine;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TierArg {
    Raw,
    Processed,
    All,
}

impl TierArg {
    fn tiers(self) -> &'static [CacheTier] {
        match self {
            TierArg::Raw => &[CacheTier::Raw],
            TierArg::Processed => &[CacheTier::Processed],
            TierArg::All => &[CacheTier::Raw, CacheTier::Processed],
        }
    }
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Remove every entry of a cache tier
    Clear {
        #[arg(long, value_enum, default_value = "all")]
        tier: TierArg,
    },

    /// Remove one URL from both tiers
    Invalidate {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub async fn handle_command(command: CacheCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let fetcher = Engine::website_only(&config);

    if !fetcher.caching_enabled() {
        println!(
            "{}",
            format!(
                "Website caching is disabled in {}; nothing to do",
                config.spec.environment.as_str()
            )
            .yellow()
        );
        return Ok(());
    }

    match command {
        CacheCommand::Clear { tier } => {
            for tier in tier.tiers() {
                let removed = fetcher
                    .clear(*tier)
                    .await
                    .with_context(|| format!("Failed to clear {} tier", tier.as_str()))?;
                println!(
                    "{} Cleared {} {} entries",
                    "✓".green(),
                    removed,
                    tier.as_str()
                );
            }
        }
        CacheCommand::Invalidate { url } => {
            fetcher
                .invalidate(&url)
                .await
                .with_context(|| format!("Failed to invalidate {}", url))?;
            println!("{} Invalidated {}", "✓".green(), url);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_covers_both_tiers() {
        assert_eq!(TierArg::All.tiers(), &[CacheTier::Raw, CacheTier::Processed]);
        assert_eq!(TierArg::Raw.tiers(), &[CacheTier::Raw]);
    }
}
