// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Template Engine
//!
//! Renders system and user prompts for the analysis endpoints, using
//! Handlebars for placeholder substitution.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Transform named template pairs plus prompt variables into LLM input
//!
//! # Built-in Templates
//!
//! Each analysis type ships a `<name>.system` / `<name>.user` pair:
//! `product_overview`, `target_account`, `target_persona`, `email_generation`.
//! Further pairs may be registered by name at startup.
//!
//! HTML escaping is disabled: website content and JSON context are injected
//! verbatim.
//!
//! # Usage
//!
//! ```ignore
//! let engine = PromptTemplateEngine::new();
//! let prompt = engine.render_named("product_overview", &variables)?;
//! llm.generate_structured_output::<ProductOverviewResponse>(&prompt.user, Some(&prompt.system)).await?;
//! ```

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;

const BUILTIN_TEMPLATES: &[(&str, &str, &str)] = &[
    (
        "product_overview",
        include_str!("../../templates/product_overview.system.hbs"),
        include_str!("../../templates/product_overview.user.hbs"),
    ),
    (
        "target_account",
        include_str!("../../templates/target_account.system.hbs"),
        include_str!("../../templates/target_account.user.hbs"),
    ),
    (
        "target_persona",
        include_str!("../../templates/target_persona.system.hbs"),
        include_str!("../../templates/target_persona.user.hbs"),
    ),
    (
        "email_generation",
        include_str!("../../templates/email_generation.system.hbs"),
        include_str!("../../templates/email_generation.user.hbs"),
    ),
];

/// A rendered system + user prompt pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

pub struct PromptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl PromptTemplateEngine {
    /// Create an engine with the built-in templates registered
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false); // Missing variables render empty
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, system, user) in BUILTIN_TEMPLATES {
            for (suffix, source) in [("system", system), ("user", user)] {
                if let Err(e) = handlebars.register_template_string(&format!("{}.{}", name, suffix), source) {
                    tracing::error!("Built-in template '{}.{}' failed to compile: {}", name, suffix, e);
                }
            }
        }

        Self { handlebars }
    }

    /// Register (or replace) a named system + user template pair
    pub fn register(&mut self, name: &str, system: &str, user: &str) -> Result<()> {
        self.validate_template(system)?;
        self.validate_template(user)?;
        self.handlebars
            .register_template_string(&format!("{}.system", name), system)
            .with_context(|| format!("Failed to register system template '{}'", name))?;
        self.handlebars
            .register_template_string(&format!("{}.user", name), user)
            .with_context(|| format!("Failed to register user template '{}'", name))?;
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(&format!("{}.system", name))
            && self.handlebars.has_template(&format!("{}.user", name))
    }

    /// Render an inline template string
    pub fn render<T: Serialize>(&self, template: &str, variables: &T) -> Result<String> {
        self.handlebars
            .render_template(template, variables)
            .context("Failed to render prompt template")
    }

    /// Render a registered template pair
    pub fn render_named<T: Serialize>(&self, name: &str, variables: &T) -> Result<RenderedPrompt> {
        if !self.has_template(name) {
            anyhow::bail!("Unknown prompt template: {}", name);
        }

        let system = self
            .handlebars
            .render(&format!("{}.system", name), variables)
            .with_context(|| format!("Failed to render system prompt '{}'", name))?;
        let user = self
            .handlebars
            .render(&format!("{}.user", name), variables)
            .with_context(|| format!("Failed to render user prompt '{}'", name))?;

        Ok(RenderedPrompt {
            system: system.trim().to_string(),
            user: user.trim().to_string(),
        })
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::Template::compile(template)
            .map(|_| ())
            .context("Invalid Handlebars template syntax")
    }
}

impl Default for PromptTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a template string with a simple key-value map
pub fn render_simple(template: &str, vars: &HashMap<String, String>) -> Result<String> {
    PromptTemplateEngine::new().render(template, vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_templates_registered() {
        let engine = PromptTemplateEngine::new();
        for name in ["product_overview", "target_account", "target_persona", "email_generation"] {
            assert!(engine.has_template(name), "missing {name}");
        }
        assert!(!engine.has_template("press_release"));
    }

    #[test]
    fn test_product_overview_injects_content_verbatim() {
        let engine = PromptTemplateEngine::new();
        let prompt = engine
            .render_named(
                "product_overview",
                &json!({
                    "website_url": "https://acme.test",
                    "website_content": "<b>Rockets & more</b>"
                }),
            )
            .unwrap();

        assert!(prompt.user.contains("https://acme.test"));
        assert!(prompt.user.contains("<b>Rockets & more</b>"));
        assert!(!prompt.user.contains("Additional context"));
        assert!(!prompt.system.is_empty());
    }

    #[test]
    fn test_optional_sections() {
        let engine = PromptTemplateEngine::new();
        let prompt = engine
            .render_named(
                "target_account",
                &json!({
                    "context_source": "user_inputted",
                    "context": "{\"company_name\": \"Acme\"}",
                    "hypothesis": "Mid-market logistics firms"
                }),
            )
            .unwrap();

        assert!(prompt.user.contains("Company context (user_inputted)"));
        assert!(prompt.user.contains("\"company_name\": \"Acme\""));
        assert!(prompt.user.contains("Mid-market logistics firms"));
        assert!(!prompt.user.contains("Website content"));
    }

    #[test]
    fn test_email_preferences_rendered() {
        let engine = PromptTemplateEngine::new();
        let prompt = engine
            .render_named(
                "email_generation",
                &json!({
                    "context_source": "llm_inferred",
                    "context": "{}",
                    "email_count": 4,
                    "tone": "friendly",
                    "call_to_action": "Book a demo"
                }),
            )
            .unwrap();

        assert!(prompt.user.starts_with("Write an outbound email campaign of 4 emails in a friendly tone."));
        assert!(prompt.user.contains("Book a demo"));
    }

    #[test]
    fn test_unknown_template_is_error() {
        let engine = PromptTemplateEngine::new();
        assert!(engine.render_named("nope", &json!({})).is_err());
    }

    #[test]
    fn test_register_custom_pair() {
        let mut engine = PromptTemplateEngine::new();
        engine
            .register("one_liner", "Be terse.", "Describe {{company}} in one line.")
            .unwrap();
        let prompt = engine.render_named("one_liner", &json!({"company": "Acme"})).unwrap();
        assert_eq!(prompt.system, "Be terse.");
        assert_eq!(prompt.user, "Describe Acme in one line.");

        assert!(engine.register("broken", "ok", "{{#if x}}unclosed").is_err());
    }

    #[test]
    fn test_missing_variables_render_empty() {
        let engine = PromptTemplateEngine::new();
        let result = engine.render("Task: {{instruction}}|", &json!({})).unwrap();
        assert_eq!(result, "Task: |");
    }

    #[test]
    fn test_validate_template() {
        let engine = PromptTemplateEngine::new();
        assert!(engine.validate_template("{{company}}").is_ok());
        assert!(engine.validate_template("{{company").is_err());
    }

    #[test]
    fn test_render_simple() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Acme".to_string());
        vars.insert("tier".to_string(), "enterprise".to_string());

        let result = render_simple("{{name}} ({{tier}})", &vars).unwrap();
        assert_eq!(result, "Acme (enterprise)");
    }
}
