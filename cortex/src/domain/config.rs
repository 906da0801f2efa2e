// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

// Cortex Configuration Types
//
// Defines the configuration schema for a playbook cortex deployment:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - LLM provider configuration and model alias mapping
// - Role → alias selection for generation, reflection and curation
// - Embedding, retrieval, storage and curation settings
// - Observability settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::section::SectionPolicy;

pub const API_VERSION: &str = "playbook.dev/v1";
pub const KIND: &str = "CortexConfig";

/// Top-level Kubernetes-style cortex configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CortexConfigManifest {
    /// API version (must be "playbook.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CortexConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: CortexConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CortexConfigSpec {
    #[serde(default)]
    pub llm_providers: Vec<LLMProviderConfig>,

    #[serde(default)]
    pub llm_selection: LLMSelection,

    /// Which model alias each judgment role uses
    #[serde(default)]
    pub models: ModelRoles,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub playbook: PlaybookStoreConfig,

    #[serde(default)]
    pub reflection: ReflectionConfig,

    #[serde(default)]
    pub curation: CurationConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Unique provider name (e.g., "ollama-local", "openai")
    pub name: String,

    /// Provider type: "openai", "openai-compatible" or "ollama"
    #[serde(rename = "type")]
    pub provider_type: String,

    /// API endpoint URL
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Available models on this provider
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Alias referenced from `spec.models` (e.g., "default", "fast", "smart")
    pub alias: String,

    /// Actual model identifier for the provider API
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMSelection {
    /// Fallback provider if primary fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,

    /// Maximum attempts per call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries in milliseconds (doubled per attempt)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for LLMSelection {
    fn default() -> Self {
        Self {
            fallback_provider: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRoles {
    #[serde(default = "default_alias")]
    pub generator: String,
    #[serde(default = "default_alias")]
    pub reflector: String,
    #[serde(default = "default_alias")]
    pub curator: String,
}

impl Default for ModelRoles {
    fn default() -> Self {
        Self {
            generator: default_alias(),
            reflector: default_alias(),
            curator: default_alias(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible `/embeddings` endpoint
    Openai,
    /// Local feature hashing, no network
    #[default]
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(rename = "type", default)]
    pub provider_type: EmbeddingProviderType,

    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector length for the hashing provider
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider_type: EmbeddingProviderType::default(),
            endpoint: default_embedding_endpoint(),
            api_key: None,
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Weight of the dense score in the fused ranking, in [0, 1]
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            top_k: default_top_k(),
            min_confidence: default_min_confidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookStoreConfig {
    /// Directory holding one `<namespace>.json` per playbook
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PlaybookStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionConfig {
    /// Insight-extraction passes per trajectory
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurationConfig {
    #[serde(default)]
    pub section_policy: SectionPolicy,

    /// YAML file mapping namespace → section definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Root of `<role>/<namespace>.hbs` templates; built-ins are used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prometheus listener port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_alias() -> String {
    "default".to_string()
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_alpha() -> f64 {
    0.5
}

fn default_top_k() -> usize {
    10
}

fn default_min_confidence() -> f64 {
    0.3
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/playbooks")
}

fn default_max_iterations() -> u32 {
    1
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for CortexConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "playbook-cortex".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: CortexConfigSpec::default(),
        }
    }
}

/// Resolve a secret value, expanding the "env:VAR_NAME" form.
pub fn resolve_secret(value: &Option<String>) -> anyhow::Result<String> {
    match value {
        Some(v) => match v.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(v.clone()),
        },
        // Local providers run without auth
        None => Ok(String::new()),
    }
}

impl CortexConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. PLAYBOOK_CONFIG_PATH environment variable
    /// 2. ./playbook-config.yaml (working directory)
    /// 3. ~/.playbook/config.yaml (user home)
    /// 4. /etc/playbook/config.yaml (system, Unix) or C:\ProgramData\Playbook\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("PLAYBOOK_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./playbook-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".playbook").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/playbook/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Playbook\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing/invalid
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

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup (the process environment in production)
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("PLAYBOOK_DATA_DIR") {
            tracing::info!("Environment override: PLAYBOOK_DATA_DIR={}", val);
            self.spec.playbook.data_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("PLAYBOOK_SEARCH_ALPHA") {
            match val.parse::<f64>() {
                Ok(alpha) => {
                    tracing::info!("Environment override: PLAYBOOK_SEARCH_ALPHA={}", alpha);
                    self.spec.search.alpha = alpha;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for PLAYBOOK_SEARCH_ALPHA: '{}'. Expected a number. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("PLAYBOOK_MAX_ITERATIONS") {
            match val.parse::<u32>() {
                Ok(n) => {
                    tracing::info!("Environment override: PLAYBOOK_MAX_ITERATIONS={}", n);
                    self.spec.reflection.max_iterations = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for PLAYBOOK_MAX_ITERATIONS: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
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

        let search = &self.spec.search;
        if !(0.0..=1.0).contains(&search.alpha) {
            anyhow::bail!("spec.search.alpha must be within [0, 1], got {}", search.alpha);
        }
        if !(0.0..=1.0).contains(&search.min_confidence) {
            anyhow::bail!(
                "spec.search.min_confidence must be within [0, 1], got {}",
                search.min_confidence
            );
        }
        if search.top_k == 0 {
            anyhow::bail!("spec.search.top_k must be at least 1");
        }

        if self.spec.reflection.max_iterations == 0 {
            anyhow::bail!("spec.reflection.max_iterations must be at least 1");
        }

        if self.spec.embedding.dimensions == 0 {
            anyhow::bail!("spec.embedding.dimensions must be at least 1");
        }

        for provider in &self.spec.llm_providers {
            if provider.name.is_empty() {
                anyhow::bail!("LLM provider name cannot be empty");
            }

            if provider.endpoint.is_empty() {
                anyhow::bail!("LLM provider endpoint cannot be empty for: {}", provider.name);
            }

            if provider.models.is_empty() {
                anyhow::bail!("LLM provider must have at least one model: {}", provider.name);
            }

            for model in &provider.models {
                if model.alias.is_empty() {
                    anyhow::bail!("Model alias cannot be empty in provider: {}", provider.name);
                }

                if model.model.is_empty() {
                    anyhow::bail!("Model identifier cannot be empty for alias: {}", model.alias);
                }
            }
        }

        if let Some(fallback_provider) = &self.spec.llm_selection.fallback_provider {
            if !self.spec.llm_providers.iter().any(|p| &p.name == fallback_provider) {
                anyhow::bail!("Fallback provider '{}' not found in llm_providers", fallback_provider);
            }
        }

        // Role aliases only matter once any provider is configured
        if !self.spec.llm_providers.is_empty() {
            let roles = &self.spec.models;
            for (role, alias) in [
                ("generator", &roles.generator),
                ("reflector", &roles.reflector),
                ("curator", &roles.curator),
            ] {
                let known = self
                    .spec
                    .llm_providers
                    .iter()
                    .flat_map(|p| p.models.iter())
                    .any(|m| &m.alias == alias);
                if !known {
                    anyhow::bail!("spec.models.{} refers to unknown model alias '{}'", role, alias);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
apiVersion: playbook.dev/v1
kind: CortexConfig
metadata:
  name: test-cortex
spec:
  llm_providers:
    - name: ollama
      type: ollama
      endpoint: http://localhost:11434
      models:
        - alias: default
          model: llama3.2:latest
  search:
    alpha: 0.7
    top_k: 5
  curation:
    section_policy: reject_unknown
"#;

    #[test]
    fn test_default_manifest() {
        let manifest = CortexConfigManifest::default();
        assert_eq!(manifest.api_version, "playbook.dev/v1");
        assert_eq!(manifest.kind, "CortexConfig");
        assert!(!manifest.metadata.name.is_empty());
        assert!(manifest.spec.llm_providers.is_empty());
        assert_eq!(manifest.spec.search.alpha, 0.5);
        assert_eq!(manifest.spec.search.top_k, 10);
        assert_eq!(manifest.spec.search.min_confidence, 0.3);
        assert_eq!(manifest.spec.reflection.max_iterations, 1);
        assert_eq!(manifest.spec.embedding.provider_type, EmbeddingProviderType::Hashing);
    }

    #[test]
    fn test_parse_sample() {
        let manifest = CortexConfigManifest::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(manifest.metadata.name, "test-cortex");
        assert_eq!(manifest.spec.llm_providers.len(), 1);
        assert!(manifest.spec.llm_providers[0].enabled);
        assert_eq!(manifest.spec.search.alpha, 0.7);
        assert_eq!(manifest.spec.search.top_k, 5);
        // Unset fields keep their defaults
        assert_eq!(manifest.spec.search.min_confidence, 0.3);
        assert_eq!(manifest.spec.curation.section_policy, SectionPolicy::RejectUnknown);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let manifest = CortexConfigManifest::from_yaml_str(SAMPLE).unwrap();
        let yaml = serde_yaml::to_string(&manifest).unwrap();
        let parsed = CortexConfigManifest::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.llm_providers[0].models[0].model, "llama3.2:latest");
        assert_eq!(parsed.spec.search.alpha, 0.7);
    }

    #[test]
    fn test_validation() {
        let mut manifest = CortexConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "WrongKind".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.search.alpha = 1.5;
        assert!(manifest.validate().is_err());
        manifest.spec.search.alpha = 0.5;

        manifest.spec.search.min_confidence = -0.1;
        assert!(manifest.validate().is_err());
        manifest.spec.search.min_confidence = 0.3;

        // Provider without models
        manifest.spec.llm_providers.push(LLMProviderConfig {
            name: "invalid".to_string(),
            provider_type: "openai".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            enabled: true,
            models: vec![],
        });
        assert!(manifest.validate().is_err());

        // Provider whose alias does not cover the roles
        manifest.spec.llm_providers[0].models.push(ModelConfig {
            alias: "smart".to_string(),
            model: "gpt-4o".to_string(),
            context_window: None,
        });
        assert!(manifest.validate().is_err());

        manifest.spec.models.generator = "smart".to_string();
        manifest.spec.models.reflector = "smart".to_string();
        manifest.spec.models.curator = "smart".to_string();
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut manifest = CortexConfigManifest::default();
        manifest.apply_overrides_from(|key| match key {
            "PLAYBOOK_DATA_DIR" => Some("/tmp/pb".to_string()),
            "PLAYBOOK_SEARCH_ALPHA" => Some("0.25".to_string()),
            "PLAYBOOK_MAX_ITERATIONS" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(manifest.spec.playbook.data_dir, PathBuf::from("/tmp/pb"));
        assert_eq!(manifest.spec.search.alpha, 0.25);
        assert_eq!(manifest.spec.reflection.max_iterations, 1);
    }

    #[test]
    fn test_resolve_secret_literal() {
        assert_eq!(resolve_secret(&Some("sk-abc".to_string())).unwrap(), "sk-abc");
        assert_eq!(resolve_secret(&None).unwrap(), "");
        assert!(resolve_secret(&Some("env:PLAYBOOK_TEST_SURELY_UNSET_VAR".to_string())).is_err());
    }
}
