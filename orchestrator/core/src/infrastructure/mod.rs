// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cache;
pub mod content_fetcher;
pub mod llm;
pub mod preprocessing;
pub mod prompt_template_engine;
pub mod scraping;
pub mod url_validator;

pub use content_fetcher::ContentFetcher;
pub use prompt_template_engine::{PromptTemplateEngine, RenderedPrompt};
