// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Analysis Domain
//!
//! Generation endpoints, their inputs, the structured artifacts they produce
//! and the error taxonomy handed to the API layer.
//!
//! | Type | Stage checked | Artifact |
//! |------|---------------|----------|
//! | `product_overview` | none (direct fetch) | [`ProductOverviewResponse`] |
//! | `target_account` | `company` | [`TargetAccountResponse`] |
//! | `target_persona` | `target_account` | [`TargetPersonaResponse`] |
//! | `email_generation` | `target_persona` | [`EmailGenerationResponse`] |
//!
//! Artifact schemas are derived with `schemars` and enforced on every LLM
//! response before deserialisation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::context::EndpointStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    ProductOverview,
    TargetAccount,
    TargetPersona,
    EmailGeneration,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::ProductOverview => "product_overview",
            AnalysisType::TargetAccount => "target_account",
            AnalysisType::TargetPersona => "target_persona",
            AnalysisType::EmailGeneration => "email_generation",
        }
    }

    /// Readiness stage the resolved context must satisfy.
    ///
    /// `None` for product overview, which reads the website directly.
    pub fn required_stage(&self) -> Option<EndpointStage> {
        match self {
            AnalysisType::ProductOverview => None,
            AnalysisType::TargetAccount => Some(EndpointStage::Company),
            AnalysisType::TargetPersona => Some(EndpointStage::TargetAccount),
            AnalysisType::EmailGeneration => Some(EndpointStage::TargetPersona),
        }
    }

    /// Name of the built-in prompt template pair
    pub fn template_name(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "product_overview" | "company" => Ok(AnalysisType::ProductOverview),
            "target_account" | "account" => Ok(AnalysisType::TargetAccount),
            "target_persona" | "persona" => Ok(AnalysisType::TargetPersona),
            "email_generation" | "email" | "campaign" => Ok(AnalysisType::EmailGeneration),
            other => Err(format!("Unknown analysis type: {}", other)),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Input shared by every generation endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,

    /// Context typed or pasted by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_inputted_context: Option<Value>,

    /// Output of an earlier generation step (e.g. a product overview)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_inferred_context: Option<Value>,

    /// Free-form account or persona hypothesis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<EmailPreferences>,
}

impl AnalysisRequest {
    pub fn for_website(url: impl Into<String>) -> Self {
        Self {
            website_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Website URL, if present and not blank
    pub fn website(&self) -> Option<&str> {
        self.website_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPreferences {
    #[serde(default = "default_tone")]
    pub tone: String,

    #[serde(default = "default_email_count")]
    pub email_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
}

fn default_tone() -> String {
    "professional".to_string()
}

fn default_email_count() -> u32 {
    3
}

impl Default for EmailPreferences {
    fn default() -> Self {
        Self {
            tone: default_tone(),
            email_count: default_email_count(),
            call_to_action: None,
        }
    }
}

// ============================================================================
// Artifacts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProductOverviewResponse {
    pub company_name: String,
    pub company_url: String,
    /// One-paragraph company overview
    pub description: String,
    pub capabilities: Vec<String>,
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub business_profile_insights: Vec<String>,
    #[serde(default)]
    pub positioning_insights: Vec<String>,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub target_customer_insights: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SignalPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BuyingSignal {
    pub title: String,
    pub description: String,
    pub priority: SignalPriority,
    #[serde(default)]
    pub detection_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Firmographics {
    pub industry: String,
    #[serde(default)]
    pub employees: Option<String>,
    #[serde(default)]
    pub department_size: Option<String>,
    #[serde(default)]
    pub revenue: Option<String>,
    #[serde(default)]
    pub geography: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TargetAccountResponse {
    pub target_account_name: String,
    pub target_account_description: String,
    pub target_account_rationale: Vec<String>,
    pub firmographics: Firmographics,
    pub buying_signals: Vec<BuyingSignal>,
    #[serde(default)]
    pub buying_signals_rationale: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersonaDemographics {
    pub job_titles: Vec<String>,
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub seniority: Vec<String>,
    #[serde(default)]
    pub buying_roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersonaUseCase {
    pub use_case: String,
    pub pain_points: String,
    pub desired_outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TargetPersonaResponse {
    pub target_persona_name: String,
    pub target_persona_description: String,
    pub target_persona_rationale: Vec<String>,
    pub demographics: PersonaDemographics,
    pub use_cases: Vec<PersonaUseCase>,
    #[serde(default)]
    pub buying_signals: Vec<BuyingSignal>,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmailSubjects {
    pub primary: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmailMessage {
    /// 1-based position in the sequence
    pub position: u32,
    pub subject: String,
    pub body: String,
    pub call_to_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmailGenerationResponse {
    pub subjects: EmailSubjects,
    pub emails: Vec<EmailMessage>,
    #[serde(default)]
    pub rationale: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors returned by the analysis service, always tagged with the
/// analysis type that produced them.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{analysis_type}: missing required input '{field}'")]
    MissingInput {
        analysis_type: AnalysisType,
        field: &'static str,
    },

    #[error("{analysis_type}: insufficient context for {stage}")]
    InsufficientContext {
        analysis_type: AnalysisType,
        stage: EndpointStage,
        missing: Vec<String>,
        recommendations: Vec<String>,
    },

    #[error("{analysis_type}: website rejected ({reason})")]
    InvalidWebsite {
        analysis_type: AnalysisType,
        url: String,
        reason: String,
    },

    #[error("{analysis_type}: LLM returned invalid output: {message}")]
    InvalidLlmOutput {
        analysis_type: AnalysisType,
        message: String,
    },

    #[error("{analysis_type}: LLM output failed schema validation")]
    SchemaValidation {
        analysis_type: AnalysisType,
        errors: Vec<String>,
    },

    #[error("{analysis_type}: analysis failed: {message}")]
    Failed {
        analysis_type: AnalysisType,
        message: String,
    },
}

impl AnalysisError {
    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            AnalysisError::MissingInput { analysis_type, .. }
            | AnalysisError::InsufficientContext { analysis_type, .. }
            | AnalysisError::InvalidWebsite { analysis_type, .. }
            | AnalysisError::InvalidLlmOutput { analysis_type, .. }
            | AnalysisError::SchemaValidation { analysis_type, .. }
            | AnalysisError::Failed { analysis_type, .. } => *analysis_type,
        }
    }

    /// HTTP-equivalent status for the API layer
    pub fn status_code(&self) -> u16 {
        match self {
            AnalysisError::Failed { .. } => 500,
            _ => 422,
        }
    }

    /// Structured, trace-free error detail for rendering at the boundary
    pub fn detail(&self) -> Value {
        let analysis_type = self.analysis_type().as_str();
        match self {
            AnalysisError::MissingInput { field, .. } => json!({
                "error": "missing_input",
                "analysis_type": analysis_type,
                "field": field,
                "message": self.to_string(),
            }),
            AnalysisError::InsufficientContext {
                stage,
                missing,
                recommendations,
                ..
            } => json!({
                "error": "insufficient_context",
                "analysis_type": analysis_type,
                "stage": stage.to_string(),
                "missing_requirements": missing,
                "recommendations": recommendations,
            }),
            AnalysisError::InvalidWebsite { url, reason, .. } => json!({
                "error": "invalid_website",
                "analysis_type": analysis_type,
                "url": url,
                "reason": reason,
                "recommendations": ["Check that the website URL is correct, public and allows crawling"],
            }),
            AnalysisError::InvalidLlmOutput { message, .. } => json!({
                "error": "invalid_llm_output",
                "analysis_type": analysis_type,
                "message": message,
            }),
            AnalysisError::SchemaValidation { errors, .. } => json!({
                "error": "schema_validation_failed",
                "analysis_type": analysis_type,
                "validation_errors": errors,
            }),
            AnalysisError::Failed { message, .. } => json!({
                "error": "analysis_failed",
                "analysis_type": analysis_type,
                "message": message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_type_parsing() {
        assert_eq!("product-overview".parse::<AnalysisType>(), Ok(AnalysisType::ProductOverview));
        assert_eq!("persona".parse::<AnalysisType>(), Ok(AnalysisType::TargetPersona));
        assert_eq!("EMAIL".parse::<AnalysisType>(), Ok(AnalysisType::EmailGeneration));
        assert!("unknown".parse::<AnalysisType>().is_err());
    }

    #[test]
    fn test_stage_mapping() {
        assert_eq!(AnalysisType::ProductOverview.required_stage(), None);
        assert_eq!(
            AnalysisType::TargetPersona.required_stage(),
            Some(EndpointStage::TargetAccount)
        );
    }

    #[test]
    fn test_error_status_and_detail() {
        let err = AnalysisError::InsufficientContext {
            analysis_type: AnalysisType::TargetAccount,
            stage: EndpointStage::Company,
            missing: vec!["company_name".into()],
            recommendations: vec!["Provide the company name".into()],
        };
        assert_eq!(err.status_code(), 422);
        let detail = err.detail();
        assert_eq!(detail["analysis_type"], "target_account");
        assert_eq!(detail["stage"], "company");
        assert_eq!(detail["missing_requirements"][0], "company_name");

        let err = AnalysisError::Failed {
            analysis_type: AnalysisType::EmailGeneration,
            message: "All providers unavailable".into(),
        };
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.detail()["error"], "analysis_failed");
    }

    #[test]
    fn test_website_accessor_ignores_blank() {
        let request = AnalysisRequest::for_website("   ");
        assert!(request.website().is_none());
        let request = AnalysisRequest::for_website(" https://acme.test ");
        assert_eq!(request.website(), Some("https://acme.test"));
    }

    #[test]
    fn test_schema_generation() {
        let schema = serde_json::to_value(schemars::schema_for!(TargetAccountResponse)).unwrap();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|f| f == "firmographics"));
        assert!(!required.iter().any(|f| f == "buying_signals_rationale"));
    }
}
