// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Generation Context & Sufficiency
//!
//! Typed view over the loosely structured context blobs callers send
//! (user-supplied JSON, a previous LLM result, or a list of partial objects),
//! plus the pure predicates deciding whether that context is enough to run a
//! given generation stage.
//!
//! ## Readiness chain
//!
//! | Stage | Requires |
//! |-------|----------|
//! | `Company` | company name, overview, and use cases or capabilities |
//! | `TargetAccount` | `Company` + industry, target name/description, one firmographic |
//! | `TargetPersona` | `Company` + `TargetAccount` |
//!
//! Each predicate calls the one before it, so sufficiency at a later stage
//! always implies sufficiency at every earlier stage.
//!
//! ## Boundary parsing
//!
//! - JSON object: fields are read by their accepted key names.
//! - JSON array: objects are shallow-merged, **first non-empty value wins**.
//! - JSON string: parsed as JSON; unparseable text yields an empty context.
//! - Anything else: empty context. Parsing never fails.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const COMPANY_NAME_KEYS: &[&str] = &["company_name", "name"];
const OVERVIEW_KEYS: &[&str] = &["overview", "company_overview", "description"];
const USE_CASE_KEYS: &[&str] = &["use_cases"];
const CAPABILITY_KEYS: &[&str] = &["capabilities"];
const INDUSTRY_KEYS: &[&str] = &["industry"];
const TARGET_NAME_KEYS: &[&str] = &["target_company_name", "target_account_name"];
const TARGET_DESCRIPTION_KEYS: &[&str] =
    &["target_company_description", "target_account_description"];
const EMPLOYEES_KEYS: &[&str] = &["employees", "employee_count"];
const DEPARTMENT_SIZE_KEYS: &[&str] = &["department_size"];
const REVENUE_KEYS: &[&str] = &["revenue"];

/// Nested object some producers use for account-level attributes
const FIRMOGRAPHICS_KEY: &str = "firmographics";

/// Generation stage whose data requirements are being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStage {
    Company,
    TargetAccount,
    TargetPersona,
}

impl std::fmt::Display for EndpointStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EndpointStage::Company => "company",
            EndpointStage::TargetAccount => "target_account",
            EndpointStage::TargetPersona => "target_persona",
        };
        f.write_str(name)
    }
}

/// Where a piece of context came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    UserInputted,
    LlmInferred,
    Website,
    None,
}

impl ContextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextSource::UserInputted => "user_inputted",
            ContextSource::LlmInferred => "llm_inferred",
            ContextSource::Website => "website",
            ContextSource::None => "none",
        }
    }
}

/// Typed generation context, validated at the boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_cases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_company_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employees: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_size: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<Value>,

    /// The merged source object, kept verbatim for prompt rendering
    #[serde(skip)]
    pub raw: Map<String, Value>,
}

impl GenerationContext {
    /// Parse any caller-supplied context blob. Never fails.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map.clone()),
            Value::Array(items) => Self::from_map(merge_partials(items)),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                // A JSON string holding another JSON string is not a context
                Ok(parsed) if !parsed.is_string() => Self::from_value(&parsed),
                _ => Self::default(),
            },
            _ => Self::default(),
        }
    }

    fn from_map(raw: Map<String, Value>) -> Self {
        let company_name = find_present(&raw, COMPANY_NAME_KEYS).and_then(as_text);
        let overview = find_present(&raw, OVERVIEW_KEYS).and_then(as_text);
        let use_cases = find_present(&raw, USE_CASE_KEYS).map(as_list).unwrap_or_default();
        let capabilities = find_present(&raw, CAPABILITY_KEYS).map(as_list).unwrap_or_default();
        let industry = find_account_field(&raw, INDUSTRY_KEYS).and_then(as_text);
        let target_company_name = find_account_field(&raw, TARGET_NAME_KEYS).and_then(as_text);
        let target_company_description =
            find_account_field(&raw, TARGET_DESCRIPTION_KEYS).and_then(as_text);
        let employees = find_account_field(&raw, EMPLOYEES_KEYS).cloned();
        let department_size = find_account_field(&raw, DEPARTMENT_SIZE_KEYS).cloned();
        let revenue = find_account_field(&raw, REVENUE_KEYS).cloned();

        Self {
            company_name,
            overview,
            use_cases,
            capabilities,
            industry,
            target_company_name,
            target_company_description,
            employees,
            department_size,
            revenue,
            raw,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The merged source object as JSON
    pub fn to_json(&self) -> Value {
        Value::Object(self.raw.clone())
    }
}

/// Shallow-merge a list of partial objects; an earlier non-empty value is
/// never overwritten by a later one.
fn merge_partials(items: &[Value]) -> Map<String, Value> {
    let mut merged = Map::new();
    for item in items {
        let Some(object) = item.as_object() else {
            continue;
        };
        for (key, value) in object {
            let keep_existing = merged.get(key).map(is_present).unwrap_or(false);
            if !keep_existing {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

fn find_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| map.get(*k)).find(|v| is_present(v))
}

/// Account attributes may sit at the top level or under `firmographics`
fn find_account_field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    find_present(map, keys).or_else(|| {
        map.get(FIRMOGRAPHICS_KEY)
            .and_then(Value::as_object)
            .and_then(|nested| find_present(nested, keys))
    })
}

/// Non-null, non-blank string, non-empty list, non-empty object
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(_) | Value::Array(_) => Some(item.to_string()),
                other => as_text(other),
            })
            .collect(),
        other => as_text(other).into_iter().collect(),
    }
}

fn has_text(field: &Option<String>) -> bool {
    field.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

fn has_value(field: &Option<Value>) -> bool {
    field.as_ref().map(is_present).unwrap_or(false)
}

// ============================================================================
// Sufficiency Evaluator
// ============================================================================

/// Result of a sufficiency check, with the requirements that were not met
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SufficiencyReport {
    pub stage: EndpointStage,
    pub sufficient: bool,
    pub missing: Vec<&'static str>,
}

impl SufficiencyReport {
    /// Human-facing hints for the missing requirements
    pub fn recommendations(&self) -> Vec<String> {
        self.missing
            .iter()
            .map(|requirement| match *requirement {
                "company_name" => "Provide the company name".to_string(),
                "overview" => "Provide a company overview or description".to_string(),
                "use_cases_or_capabilities" => {
                    "List at least one use case or product capability".to_string()
                }
                "industry" => "Specify the target industry".to_string(),
                "target_company_name" => "Name the target account".to_string(),
                "target_company_description" => "Describe the target account".to_string(),
                "firmographics" => {
                    "Include employees, department size or revenue for the target account"
                        .to_string()
                }
                other => format!("Provide {}", other),
            })
            .collect()
    }
}

/// Pure, side-effect-free readiness predicates.
///
/// Policy: presence only. A field counts when it is non-null, a non-blank
/// string, or a non-empty list/object. No confidence scores are consulted.
pub struct ContextSufficiencyEvaluator;

impl ContextSufficiencyEvaluator {
    pub fn company_sufficient(ctx: &GenerationContext) -> bool {
        Self::company_missing(ctx).is_empty()
    }

    pub fn target_account_sufficient(ctx: &GenerationContext) -> bool {
        Self::company_sufficient(ctx) && Self::account_missing(ctx).is_empty()
    }

    pub fn target_persona_sufficient(ctx: &GenerationContext) -> bool {
        Self::company_sufficient(ctx) && Self::target_account_sufficient(ctx)
    }

    pub fn is_sufficient(stage: EndpointStage, ctx: &GenerationContext) -> bool {
        match stage {
            EndpointStage::Company => Self::company_sufficient(ctx),
            EndpointStage::TargetAccount => Self::target_account_sufficient(ctx),
            EndpointStage::TargetPersona => Self::target_persona_sufficient(ctx),
        }
    }

    /// Evaluate a stage and list every unmet requirement along the chain
    pub fn assess(stage: EndpointStage, ctx: &GenerationContext) -> SufficiencyReport {
        let mut missing = Self::company_missing(ctx);
        if stage != EndpointStage::Company {
            missing.extend(Self::account_missing(ctx));
        }

        SufficiencyReport {
            stage,
            sufficient: missing.is_empty(),
            missing,
        }
    }

    fn company_missing(ctx: &GenerationContext) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !has_text(&ctx.company_name) {
            missing.push("company_name");
        }
        if !has_text(&ctx.overview) {
            missing.push("overview");
        }
        if ctx.use_cases.is_empty() && ctx.capabilities.is_empty() {
            missing.push("use_cases_or_capabilities");
        }
        missing
    }

    fn account_missing(ctx: &GenerationContext) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !has_text(&ctx.industry) {
            missing.push("industry");
        }
        if !has_text(&ctx.target_company_description) {
            missing.push("target_company_description");
        }
        if !has_text(&ctx.target_company_name) {
            missing.push("target_company_name");
        }
        if !(has_value(&ctx.employees) || has_value(&ctx.department_size) || has_value(&ctx.revenue))
        {
            missing.push("firmographics");
        }
        missing
    }
}

// ============================================================================
// Resolution envelope
// ============================================================================

/// Context selected for a generation call
#[derive(Debug, Clone, Serialize)]
pub struct ContextEnvelope {
    pub source: ContextSource,

    /// Structured context, for user-supplied or LLM-inferred sources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Page text, for the website source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    pub is_ready: bool,

    pub from_cache: bool,
}

/// Outcome of resolving context for a stage.
///
/// Insufficiency is a normal outcome, not an error.
#[derive(Debug, Clone)]
pub enum ContextOutcome {
    Ready(ContextEnvelope),
    NotReady {
        stage: EndpointStage,
        missing: Vec<String>,
        recommendations: Vec<String>,
    },
}

impl ContextOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ContextOutcome::Ready(_))
    }

    pub fn source(&self) -> ContextSource {
        match self {
            ContextOutcome::Ready(envelope) => envelope.source,
            ContextOutcome::NotReady { .. } => ContextSource::None,
        }
    }

    /// Uniform envelope view; `NotReady` maps to an empty, unready envelope
    pub fn envelope(&self) -> ContextEnvelope {
        match self {
            ContextOutcome::Ready(envelope) => envelope.clone(),
            ContextOutcome::NotReady { .. } => ContextEnvelope {
                source: ContextSource::None,
                context: None,
                content: None,
                html: None,
                is_ready: false,
                from_cache: false,
            },
        }
    }
}
