// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Analysis command
//!
//! `aegis-gtm analyze <type>` builds an `AnalysisRequest` from flags (or a
//! request file) and prints the validated response as JSON.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;

use gtm_core::domain::analysis::{AnalysisRequest, AnalysisType};
use gtm_core::domain::engine_config::EngineConfigManifest;

use crate::runtime::Engine;

#[derive(Args)]
pub struct AnalyzeCommand {
    /// product_overview, target_account, target_persona or email_generation
    #[arg(value_name = "TYPE")]
    pub analysis_type: AnalysisType,

    /// Company website
    #[arg(short, long)]
    pub url: Option<String>,

    /// User-supplied context: inline JSON or @path/to/file.json
    #[arg(long, value_name = "JSON")]
    pub context: Option<String>,

    /// Output of an earlier analysis: inline JSON or @path/to/file.json
    #[arg(long, value_name = "JSON")]
    pub inferred: Option<String>,

    /// Account or persona hypothesis
    #[arg(long)]
    pub hypothesis: Option<String>,

    /// Extra free-form context for the prompt
    #[arg(long)]
    pub additional_context: Option<String>,

    /// Email tone (email_generation)
    #[arg(long)]
    pub tone: Option<String>,

    /// Number of emails (email_generation)
    #[arg(long)]
    pub emails: Option<u32>,

    /// Call to action (email_generation)
    #[arg(long)]
    pub cta: Option<String>,

    /// Full request as a JSON file; flags override its fields
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,
}

pub async fn handle_command(command: AnalyzeCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let engine = Engine::build(config)?;

    let analysis_type = command.analysis_type;
    let request = build_request(command)?;

    match engine.analysis.run(analysis_type, &request).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => {
            eprintln!(
                "{} {} ({})",
                "✗".red(),
                err.to_string().red(),
                err.status_code()
            );
            eprintln!("{}", serde_json::to_string_pretty(&err.detail())?);
            std::process::exit(1);
        }
    }
}

pub fn build_request(command: AnalyzeCommand) -> Result<AnalysisRequest> {
    let mut request = match &command.request {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read request file {:?}", path))?;
            serde_json::from_str::<AnalysisRequest>(&raw)
                .with_context(|| format!("Invalid request file {:?}", path))?
        }
        None => AnalysisRequest::default(),
    };

    if command.url.is_some() {
        request.website_url = command.url;
    }
    if let Some(context) = command.context.as_deref() {
        request.user_inputted_context = Some(read_json_arg(context)?);
    }
    if let Some(inferred) = command.inferred.as_deref() {
        request.llm_inferred_context = Some(read_json_arg(inferred)?);
    }
    if command.hypothesis.is_some() {
        request.hypothesis = command.hypothesis;
    }
    if command.additional_context.is_some() {
        request.additional_context = command.additional_context;
    }

    if command.tone.is_some() || command.emails.is_some() || command.cta.is_some() {
        let mut preferences = request.preferences.take().unwrap_or_default();
        if let Some(tone) = command.tone {
            preferences.tone = tone;
        }
        if let Some(count) = command.emails {
            preferences.email_count = count;
        }
        if command.cta.is_some() {
            preferences.call_to_action = command.cta;
        }
        request.preferences = Some(preferences);
    }

    Ok(request)
}

/// Inline JSON, `@file`, or plain text kept as a JSON string
fn read_json_arg(arg: &str) -> Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file {}", path))?,
        None => arg.to_string(),
    };
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
