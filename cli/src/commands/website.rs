// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Website commands
//!
//! Commands: validate, fetch

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;

use gtm_core::domain::engine_config::EngineConfigManifest;
use gtm_core::domain::website::ScrapeFormat;

use crate::runtime::Engine;

#[derive(Subcommand)]
pub enum WebsiteCommand {
    /// Check scheme, DNS, reachability and robots.txt for a URL
    Validate {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Scrape a website (served from the cache when available)
    Fetch {
        #[arg(value_name = "URL")]
        url: String,

        /// Crawl linked pages instead of scraping a single page
        #[arg(long)]
        crawl: bool,

        /// Maximum pages to crawl (default: scraping.crawl_limit)
        #[arg(long)]
        limit: Option<u32>,

        /// Print the chunked, prompt-ready text instead of raw content
        #[arg(long)]
        processed: bool,
    },
}

pub async fn handle_command(
    command: WebsiteCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let fetcher = Engine::website_only(&config);

    match command {
        WebsiteCommand::Validate { url } => {
            let validation = fetcher.validate_url(&url).await;
            if validation.is_valid {
                println!("{} {}", "✓".green(), validation.normalized_url.green());
            } else {
                println!(
                    "{} {}: {}",
                    "✗".red(),
                    validation.url,
                    validation.reason.as_deref().unwrap_or("invalid").red()
                );
            }
            println!("{}", serde_json::to_string_pretty(&validation)?);
            if !validation.is_valid {
                std::process::exit(1);
            }
        }
        WebsiteCommand::Fetch {
            url,
            crawl,
            limit,
            processed,
        } => {
            let output = if processed {
                let content = fetcher
                    .get_processed_content(&url, crawl)
                    .await
                    .map_err(|e| anyhow::anyhow!(e.reason()))?;
                json!({
                    "url": content.url,
                    "from_cache": content.from_cache,
                    "chunks": content.chunks.len(),
                    "text": content.text,
                })
            } else {
                let content = fetcher
                    .extract_website_content(&url, crawl, limit, &ScrapeFormat::defaults())
                    .await
                    .map_err(|e| anyhow::anyhow!(e.reason()))?;
                let from_cache = content.from_cache;
                let mut value = serde_json::to_value(&content)?;
                value["from_cache"] = json!(from_cache);
                value
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
