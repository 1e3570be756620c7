// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration Types
//
// Defines the configuration manifest for the GTM generation engine:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Deployment environment (gates caching and TTL enforcement)
// - LLM provider list with failover priority
// - Circuit breaker tuning
// - Scraping provider, website cache and content thresholds
// - Logging settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::domain::circuit_breaker::CircuitBreakerConfig;

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "GtmEngineConfig";

/// Top-level engine configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GtmEngineConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: EngineConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigSpec {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub llm_providers: Vec<LLMProviderConfig>,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub scraping: ScrapingConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Website caching runs everywhere except production
    pub fn caching_enabled(&self) -> bool {
        !matches!(self, Environment::Production)
    }

    /// Development keeps cache entries until manually invalidated
    pub fn enforces_cache_ttl(&self) -> bool {
        !matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("Unknown environment: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Unique provider name (e.g., "openai-primary", "ollama-local")
    pub name: String,

    /// "openai", "openai-compatible", "anthropic" or "ollama"
    #[serde(rename = "type")]
    pub provider_type: String,

    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub model: String,

    /// Failover order, lower is tried first
    #[serde(default)]
    pub priority: u32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl LLMProviderConfig {
    /// Resolve `api_key`, following `env:VAR` indirection
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.api_key.as_deref().map(resolve_secret).transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    /// Base URL of the Firecrawl-compatible scraping service
    #[serde(default = "default_scraping_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_scraping_api_key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Agent name used for the reachability probe and robots rules
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_crawl_limit")]
    pub crawl_limit: u32,

    #[serde(default = "default_crawl_poll_interval")]
    pub crawl_poll_interval_ms: u64,

    #[serde(default = "default_crawl_max_wait")]
    pub crawl_max_wait_secs: u64,
}

impl ScrapingConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.api_key.as_deref().map(resolve_secret).transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub directory: PathBuf,

    /// Entry lifetime outside development
    #[serde(default = "default_cache_ttl_hours")]
    pub ttl_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Chunks shorter than this are filtered out of processed content
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,

    /// Processed text is truncated to this many characters
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_provider_timeout() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_scraping_endpoint() -> String {
    "https://api.firecrawl.dev".to_string()
}

fn default_scraping_api_key() -> Option<String> {
    Some("env:FIRECRAWL_API_KEY".to_string())
}

fn default_user_agent() -> String {
    "aegis-gtm".to_string()
}

fn default_scrape_timeout() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_crawl_limit() -> u32 {
    5
}

fn default_crawl_poll_interval() -> u64 {
    2000
}

fn default_crawl_max_wait() -> u64 {
    120
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache/website")
}

fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_min_content_length() -> usize {
    100
}

fn default_max_content_length() -> usize {
    50_000
}

fn default_chunk_size() -> usize {
    2_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_scraping_endpoint(),
            api_key: default_scraping_api_key(),
            user_agent: default_user_agent(),
            timeout_secs: default_scrape_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            crawl_limit: default_crawl_limit(),
            crawl_poll_interval_ms: default_crawl_poll_interval(),
            crawl_max_wait_secs: default_crawl_max_wait(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            ttl_hours: default_cache_ttl_hours(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_content_length: default_min_content_length(),
            max_content_length: default_max_content_length(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for EngineConfigSpec {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            llm_providers: Vec::new(),
            circuit_breaker: CircuitBreakerConfig::default(),
            scraping: ScrapingConfig::default(),
            cache: CacheConfig::default(),
            content: ContentConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EngineConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| "aegis-gtm".to_string()),
                version: None,
                labels: None,
            },
            spec: EngineConfigSpec::default(),
        }
    }
}

/// Resolve a secret value, following `env:VAR_NAME` indirection
pub fn resolve_secret(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var)
            .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var)),
        None => Ok(value.to_string()),
    }
}

impl EngineConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AEGIS_GTM_CONFIG_PATH environment variable
    /// 2. ./aegis-gtm.yaml (working directory)
    /// 3. ~/.aegis/gtm.yaml (user home)
    /// 4. /etc/aegis/gtm.yaml (system, Unix) or C:\ProgramData\Aegis\gtm.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("AEGIS_GTM_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./aegis-gtm.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".aegis").join("gtm.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/aegis/gtm.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Aegis\\gtm.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides. Invalid values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        let spec = &mut self.spec;

        if let Some(env) = env_parsed::<Environment>("AEGIS_GTM_ENV") {
            spec.environment = env;
        }
        if let Some(disable) = env_flag("AEGIS_GTM_CIRCUIT_BREAKER_DISABLE") {
            spec.circuit_breaker.disable = disable;
        }
        if let Some(threshold) = env_parsed("AEGIS_GTM_FAILURE_THRESHOLD") {
            spec.circuit_breaker.failure_threshold = threshold;
        }
        if let Some(timeout) = env_parsed("AEGIS_GTM_RECOVERY_TIMEOUT_SECS") {
            spec.circuit_breaker.recovery_timeout_secs = timeout;
        }
        if let Ok(dir) = std::env::var("AEGIS_GTM_CACHE_DIR") {
            if !dir.trim().is_empty() {
                tracing::info!("Environment override: AEGIS_GTM_CACHE_DIR={}", dir);
                spec.cache.directory = PathBuf::from(dir);
            }
        }
        if let Some(ttl) = env_parsed("AEGIS_GTM_CACHE_TTL_HOURS") {
            spec.cache.ttl_hours = ttl;
        }
        if let Some(min) = env_parsed("AEGIS_GTM_MIN_CONTENT_LENGTH") {
            spec.content.min_content_length = min;
        }
        if let Some(max) = env_parsed("AEGIS_GTM_MAX_CONTENT_LENGTH") {
            spec.content.max_content_length = max;
        }
        if let Some(limit) = env_parsed("AEGIS_GTM_CRAWL_LIMIT") {
            spec.scraping.crawl_limit = limit;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = HashSet::new();
        for provider in &self.spec.llm_providers {
            if provider.name.is_empty() {
                anyhow::bail!("LLM provider name cannot be empty");
            }
            if !seen.insert(provider.name.as_str()) {
                anyhow::bail!("Duplicate LLM provider name: {}", provider.name);
            }
            if provider.model.is_empty() {
                anyhow::bail!("LLM provider model cannot be empty for: {}", provider.name);
            }
            if provider.endpoint.is_empty() && provider.provider_type != "openai" {
                anyhow::bail!("LLM provider endpoint cannot be empty for: {}", provider.name);
            }
            match provider.provider_type.as_str() {
                "openai" | "openai-compatible" | "anthropic" | "ollama" => {}
                other => anyhow::bail!(
                    "Unsupported provider type '{}' for: {}",
                    other,
                    provider.name
                ),
            }
        }

        if self.spec.circuit_breaker.failure_threshold == 0 {
            anyhow::bail!("circuit_breaker.failure_threshold must be at least 1");
        }

        let content = &self.spec.content;
        if content.min_content_length > content.max_content_length {
            anyhow::bail!(
                "content.min_content_length ({}) exceeds content.max_content_length ({})",
                content.min_content_length,
                content.max_content_length
            );
        }
        if content.chunk_size == 0 {
            anyhow::bail!("content.chunk_size must be at least 1");
        }

        match self.spec.logging.format.as_str() {
            "compact" | "json" => {}
            other => anyhow::bail!("Invalid logging.format '{}'. Expected compact or json", other),
        }

        Ok(())
    }
}

fn env_parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => {
            tracing::info!("Environment override: {}={}", var, raw);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Invalid value for {}: '{}'. Ignoring.", var, raw);
            None
        }
    }
}

fn env_flag(var: &str) -> Option<bool> {
    let raw = std::env::var(var).ok()?;
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => {
            tracing::info!("Environment override: {}=true", var);
            Some(true)
        }
        "false" | "0" | "no" | "off" => {
            tracing::info!("Environment override: {}=false", var);
            Some(false)
        }
        _ => {
            tracing::warn!(
                "Invalid value for {}: '{}'. Expected true/false. Ignoring.",
                var,
                raw
            );
            None
        }
    }
}
