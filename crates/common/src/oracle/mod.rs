//! Scoring oracle abstraction
//!
//! The oracle judges how well a path's evidence supports a skill and
//! returns a confidence in [0, 1]. Providers:
//! - HTTP (remote model behind a JSON endpoint)
//! - Lexical (deterministic, offline term overlap)
//! - Static (fixed value for tests and dry runs)

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::graph::NodeKind;
use crate::text::Tokenizer;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One hop of an evidence path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceHop {
    /// Rendered node identity
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    /// Supporting text (commit message and patch excerpt, repository description)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// Ordered evidence for one developer -> skill path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathEvidence {
    pub hops: Vec<EvidenceHop>,
    /// Canonical terms of the skill under test
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skill_terms: Vec<String>,
}

impl PathEvidence {
    /// All hop text except the skill hop itself
    fn text(&self) -> String {
        let mut text = String::new();
        for hop in self.hops.iter().filter(|h| h.kind != NodeKind::Skill) {
            text.push_str(&hop.label);
            text.push('\n');
            if let Some(excerpt) = &hop.excerpt {
                text.push_str(excerpt);
                text.push('\n');
            }
        }
        text
    }
}

/// Trait for path scoring
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Confidence in [0, 1] that `path` supports `skill`
    async fn score(&self, path: &PathEvidence, skill: &str) -> Result<f64>;

    /// Provider name
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    skill: &'a str,
    path: &'a [EvidenceHop],
}

#[derive(Deserialize)]
struct ScoreResponse {
    confidence: f64,
}

/// Remote oracle reached over HTTP
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl HttpOracle {
    /// Create a new HTTP oracle
    pub fn new(
        url: String,
        api_key: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create oracle HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url,
            api_key,
            max_retries,
        })
    }

    async fn make_request(&self, path: &PathEvidence, skill: &str) -> Result<f64> {
        let body = ScoreRequest {
            skill,
            path: &path.hops,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::OracleUnavailable {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::OracleUnavailable {
                message: format!("Oracle error {}: {}", status, body),
            });
        }

        let result: ScoreResponse = response.json().await.map_err(|e| AppError::InvalidFormat {
            message: format!("Failed to parse oracle response: {}", e),
        })?;

        if !result.confidence.is_finite() {
            return Err(AppError::InvalidFormat {
                message: "Oracle confidence is not a number".to_string(),
            });
        }

        Ok(result.confidence.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl ScoringOracle for HttpOracle {
    async fn score(&self, path: &PathEvidence, skill: &str) -> Result<f64> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(None)
            .build();
        let attempts = AtomicU32::new(0);

        retry(policy, || {
            let attempts = &attempts;
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                match self.make_request(path, skill).await {
                    Ok(confidence) => Ok(confidence),
                    // Malformed answers will not improve on retry
                    Err(e @ AppError::InvalidFormat { .. }) => Err(backoff::Error::permanent(e)),
                    Err(e) if attempt >= self.max_retries => Err(backoff::Error::permanent(e)),
                    Err(e) => {
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = self.max_retries,
                            error = %e,
                            "Oracle request failed, retrying"
                        );
                        Err(backoff::Error::transient(e))
                    }
                }
            }
        })
        .await
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Offline oracle: share of the skill's terms found in the path evidence.
///
/// Evidence and terms go through the same tokenizer as evidence weighting,
/// so a term matches whole tokens only. A multi-token term needs all of
/// its tokens; terms that normalise to nothing are not counted.
#[derive(Default)]
pub struct LexicalOracle {
    tokenizer: Tokenizer,
}

impl LexicalOracle {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }
}

#[async_trait]
impl ScoringOracle for LexicalOracle {
    async fn score(&self, path: &PathEvidence, skill: &str) -> Result<f64> {
        let present = self.tokenizer.token_set(&path.text());
        let fallback = [skill.to_string()];
        let terms: &[String] = if path.skill_terms.is_empty() {
            &fallback
        } else {
            &path.skill_terms
        };

        let term_tokens: Vec<Vec<String>> = terms
            .iter()
            .map(|t| self.tokenizer.tokenize(t))
            .filter(|tokens| !tokens.is_empty())
            .collect();
        if term_tokens.is_empty() {
            return Ok(0.0);
        }

        let matched = term_tokens
            .iter()
            .filter(|tokens| tokens.iter().all(|t| present.contains(t)))
            .count();
        Ok(matched as f64 / term_tokens.len() as f64)
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

/// Oracle returning a fixed confidence
pub struct StaticOracle {
    confidence: f64,
}

impl StaticOracle {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl ScoringOracle for StaticOracle {
    async fn score(&self, _path: &PathEvidence, _skill: &str) -> Result<f64> {
        Ok(self.confidence)
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Create an oracle based on configuration
pub fn create_oracle(app: &AppConfig) -> Result<Arc<dyn ScoringOracle>> {
    let config = &app.oracle;
    let lexical = || Arc::new(LexicalOracle::new(Tokenizer::from_config(&app.weighting)));
    match config.provider.as_str() {
        "http" => {
            let url = config.url.clone().ok_or_else(|| AppError::Configuration {
                message: "oracle.url is required for the http provider".to_string(),
            })?;
            Ok(Arc::new(HttpOracle::new(
                url,
                config.api_key.clone(),
                Duration::from_millis(config.timeout_ms),
                config.max_retries,
            )?))
        }
        "lexical" => Ok(lexical()),
        "static" => Ok(Arc::new(StaticOracle::new(config.static_confidence))),
        other => {
            tracing::warn!(provider = other, "Unknown oracle provider, using lexical");
            Ok(lexical())
        }
    }
}
