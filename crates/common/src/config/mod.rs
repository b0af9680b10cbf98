//! Configuration management for Skillgraph services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// DeepPath search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Evidence weighting configuration
    #[serde(default)]
    pub weighting: WeightingConfig,

    /// Trust fusion configuration
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Scoring oracle configuration
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Activity source configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Skill catalog searched for every developer
    #[serde(default = "default_skills")]
    pub skills: Vec<SkillDefinition>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

/// Relative weight of the three terminal reward signals
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RewardWeights {
    #[serde(default = "default_accuracy_weight")]
    pub accuracy: f64,
    #[serde(default = "default_efficiency_weight")]
    pub efficiency: f64,
    #[serde(default = "default_diversity_weight")]
    pub diversity: f64,
}

impl RewardWeights {
    /// Sum of the weights, the maximum reward a path can earn
    pub fn total(&self) -> f64 {
        self.accuracy + self.efficiency + self.diversity
    }
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            accuracy: default_accuracy_weight(),
            efficiency: default_efficiency_weight(),
            diversity: default_diversity_weight(),
        }
    }
}

/// Mix of the static prior signals for repository children
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PriorWeights {
    #[serde(default = "default_prior_stars")]
    pub stars: f64,
    #[serde(default = "default_prior_tag_match")]
    pub tag_match: f64,
}

impl Default for PriorWeights {
    fn default() -> Self {
        Self {
            stars: default_prior_stars(),
            tag_match: default_prior_tag_match(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Simulations per skill hypothesis
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Maximum hops in one path
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Exploration constant of the PUCT formula
    #[serde(default = "default_c_puct")]
    pub c_puct: f64,

    /// Heaviest out-edges considered per tree node
    #[serde(default = "default_max_children")]
    pub max_children: usize,

    /// Concurrent skill searches
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub reward: RewardWeights,

    #[serde(default)]
    pub prior: PriorWeights,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeightingConfig {
    /// Commit/skill edges below this TF-IDF score are not created
    #[serde(default = "default_min_skill_weight")]
    pub min_skill_weight: f64,

    /// Shortest token kept by the tokenizer
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,

    /// Stop words added to the built-in list
    #[serde(default)]
    pub extra_stop_words: Vec<String>,

    /// Treat repository topics and languages as candidate skills
    #[serde(default = "default_discover_skills")]
    pub discover_skills_from_topics: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FusionConfig {
    /// Prior probability of a skill without evidence
    #[serde(default = "default_base_rate")]
    pub base_rate: f64,

    /// Strength lost per extra hop when mapping a path to an opinion
    #[serde(default = "default_length_penalty")]
    pub length_penalty: f64,

    /// Trust in paths scored with the degraded default accuracy
    #[serde(default = "default_degraded_trust")]
    pub degraded_trust: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    /// Oracle provider: http, lexical, static
    #[serde(default = "default_oracle_provider")]
    pub provider: String,

    /// Endpoint for the http provider
    pub url: Option<String>,

    /// Bearer token for the http provider
    pub api_key: Option<String>,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_oracle_timeout")]
    pub timeout_ms: u64,

    /// Maximum retries of a failed http call
    #[serde(default = "default_oracle_retries")]
    pub max_retries: u32,

    /// Accuracy used when the oracle times out or fails
    #[serde(default = "default_neutral_accuracy")]
    pub neutral_accuracy: f64,

    /// Confidence returned by the static provider
    #[serde(default = "default_static_confidence")]
    pub static_confidence: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Activity source: github, snapshot
    #[serde(default = "default_source_provider")]
    pub provider: String,

    /// GitHub REST base URL
    #[serde(default = "default_github_api")]
    pub api_base: String,

    /// GitHub token (optional, raises rate limits)
    pub token: Option<String>,

    /// Most recently updated repositories fetched per developer
    #[serde(default = "default_max_repos")]
    pub max_repos: usize,

    /// Commits fetched per repository
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,

    /// Directory holding <login>.json snapshots
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,

    /// HTTP timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

/// A skill hypothesis with the canonical terms that evidence it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SkillDefinition {
    pub name: String,

    /// Canonical terms scored with TF-IDF (defaults to the name)
    #[serde(default)]
    pub terms: Vec<String>,

    /// Repository languages/topics that count as a tag match
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SkillDefinition {
    pub fn new(name: &str, terms: &[&str], tags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 100 }
fn default_iterations() -> usize { 64 }
fn default_max_depth() -> usize { 6 }
fn default_c_puct() -> f64 { 1.414 }
fn default_max_children() -> usize { 16 }
fn default_workers() -> usize { 4 }
fn default_accuracy_weight() -> f64 { 0.6 }
fn default_efficiency_weight() -> f64 { 0.2 }
fn default_diversity_weight() -> f64 { 0.2 }
fn default_prior_stars() -> f64 { 0.5 }
fn default_prior_tag_match() -> f64 { 0.5 }
fn default_min_skill_weight() -> f64 { 0.05 }
fn default_min_token_len() -> usize { 2 }
fn default_discover_skills() -> bool { false }
fn default_base_rate() -> f64 { 0.5 }
fn default_length_penalty() -> f64 { 0.05 }
fn default_degraded_trust() -> f64 { 0.5 }
fn default_oracle_provider() -> String { "lexical".to_string() }
fn default_oracle_timeout() -> u64 { 5000 }
fn default_oracle_retries() -> u32 { 2 }
fn default_neutral_accuracy() -> f64 { 0.5 }
fn default_static_confidence() -> f64 { 0.8 }
fn default_source_provider() -> String { "github".to_string() }
fn default_github_api() -> String { "https://api.github.com".to_string() }
fn default_max_repos() -> usize { 30 }
fn default_max_commits() -> usize { 100 }
fn default_snapshot_dir() -> String { "snapshots".to_string() }
fn default_source_timeout() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "skillgraph".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

/// Built-in skill catalog
pub fn default_skills() -> Vec<SkillDefinition> {
    vec![
        SkillDefinition::new("python", &["python", "pip", "pytest"], &["python", "jupyter notebook"]),
        SkillDefinition::new("rust", &["rust", "cargo", "tokio"], &["rust"]),
        SkillDefinition::new("typescript", &["typescript", "tsconfig"], &["typescript"]),
        SkillDefinition::new("transformers", &["transformers", "huggingface"], &["transformers", "nlp"]),
        SkillDefinition::new("pytorch", &["torch", "pytorch"], &["pytorch", "deep-learning"]),
        SkillDefinition::new("tensorflow", &["tensorflow", "keras"], &["tensorflow"]),
        SkillDefinition::new("machine learning", &["sklearn", "scikit", "machine learning"], &["machine-learning"]),
        SkillDefinition::new("react", &["react", "jsx", "usestate"], &["react"]),
        SkillDefinition::new("fastapi", &["fastapi", "pydantic"], &["fastapi"]),
        SkillDefinition::new("docker", &["docker", "dockerfile"], &["docker"]),
        SkillDefinition::new("kubernetes", &["kubernetes", "kubectl", "helm"], &["kubernetes", "k8s"]),
        SkillDefinition::new("postgresql", &["postgres", "postgresql"], &["postgresql", "database"]),
        SkillDefinition::new("graphql", &["graphql"], &["graphql"]),
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            weighting: WeightingConfig::default(),
            fusion: FusionConfig::default(),
            oracle: OracleConfig::default(),
            source: SourceConfig::default(),
            skills: default_skills(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            max_depth: default_max_depth(),
            c_puct: default_c_puct(),
            max_children: default_max_children(),
            workers: default_workers(),
            reward: RewardWeights::default(),
            prior: PriorWeights::default(),
        }
    }
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            min_skill_weight: default_min_skill_weight(),
            min_token_len: default_min_token_len(),
            extra_stop_words: Vec::new(),
            discover_skills_from_topics: default_discover_skills(),
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            base_rate: default_base_rate(),
            length_penalty: default_length_penalty(),
            degraded_trust: default_degraded_trust(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_oracle_provider(),
            url: None,
            api_key: None,
            timeout_ms: default_oracle_timeout(),
            max_retries: default_oracle_retries(),
            neutral_accuracy: default_neutral_accuracy(),
            static_confidence: default_static_confidence(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: default_source_provider(),
            api_base: default_github_api(),
            token: None,
            max_repos: default_max_repos(),
            max_commits: default_max_commits(),
            snapshot_dir: default_snapshot_dir(),
            timeout_secs: default_source_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__SEARCH__ITERATIONS=128
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reward = &self.search.reward;
        if [reward.accuracy, reward.efficiency, reward.diversity]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
            || reward.total() <= 0.0
        {
            return Err(ConfigError::Message(
                "search.reward weights must be non-negative with a positive sum".to_string(),
            ));
        }
        if self.search.max_depth == 0 || self.search.workers == 0 {
            return Err(ConfigError::Message(
                "search.max_depth and search.workers must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("fusion.base_rate", self.fusion.base_rate),
            ("fusion.degraded_trust", self.fusion.degraded_trust),
            ("oracle.neutral_accuracy", self.oracle.neutral_accuracy),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Message(format!("{} must lie in [0, 1]", name)));
            }
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the oracle call timeout as Duration
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.search.max_depth, 6);
        assert!((config.search.reward.total() - 1.0).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_catalog_has_transformers() {
        let skills = default_skills();
        assert!(skills.iter().any(|s| s.name == "transformers"));
    }

    #[test]
    fn test_rejects_negative_reward_weight() {
        let mut config = AppConfig::default();
        config.search.reward.diversity = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_base_rate() {
        let mut config = AppConfig::default();
        config.fusion.base_rate = 1.5;
        assert!(config.validate().is_err());
    }
}
