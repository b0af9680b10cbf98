//! DeepPath search
//!
//! PUCT-guided Monte Carlo Tree Search over the frozen HIN. One search
//! runs per skill hypothesis, rooted at the developer node, and returns
//! the distinct paths that reached the skill together with their rewards.

mod prior;
mod reward;
mod search;
mod tree;

pub use prior::{child_priors, MIN_PRIOR};
pub use search::DeepPathSearch;
pub use tree::puct;

use serde::{Deserialize, Serialize};
use skillgraph_common::config::{AppConfig, PriorWeights, RewardWeights};
use skillgraph_common::graph::{Node, NodeId};
use std::collections::BTreeSet;
use std::time::Duration;

/// Search parameters shared by every run of one inference
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Simulations per skill
    pub iterations: usize,

    /// Maximum path length in hops
    pub max_depth: usize,

    /// Exploration constant
    pub c_puct: f64,

    /// Widest sibling set considered at one node
    pub max_children: usize,

    pub reward: RewardWeights,
    pub prior: PriorWeights,

    /// Accuracy assumed when the oracle fails
    pub neutral_accuracy: f64,

    /// Bound on one oracle call
    pub oracle_timeout: Duration,
}

impl SearchParams {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            iterations: config.search.iterations,
            max_depth: config.search.max_depth,
            c_puct: config.search.c_puct,
            max_children: config.search.max_children,
            reward: config.search.reward,
            prior: config.search.prior,
            neutral_accuracy: config.oracle.neutral_accuracy,
            oracle_timeout: config.oracle_timeout(),
        }
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// The skill a search tries to reach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillHypothesis {
    pub id: NodeId,
    pub name: String,
    /// Lowercased canonical terms
    pub terms: Vec<String>,
    /// Lowercased repository tags that indicate the skill
    pub tags: Vec<String>,
}

impl SkillHypothesis {
    pub fn new(name: &str, terms: &[&str], tags: &[&str]) -> Self {
        Self {
            id: NodeId::skill(name),
            name: name.to_string(),
            terms: terms.iter().map(|t| t.to_lowercase()).collect(),
            tags: tags.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// Hypothesis for a skill node already in the graph
    pub fn from_node(node: &Node) -> Self {
        let (terms, tags) = match node.skill() {
            Some(attrs) if !attrs.terms.is_empty() => (attrs.terms.clone(), attrs.tags.clone()),
            Some(attrs) => (vec![node.id.key.clone()], attrs.tags.clone()),
            None => (vec![node.id.key.clone()], Vec::new()),
        };
        Self {
            id: node.id.clone(),
            name: node.id.key.clone(),
            terms: terms.iter().map(|t| t.to_lowercase()).collect(),
            tags: tags.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// Whether a repository tag (language or topic) indicates this skill
    pub fn matches_tag(&self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        !tag.is_empty() && self.labels().contains(&tag)
    }

    fn labels(&self) -> BTreeSet<String> {
        std::iter::once(&self.name)
            .chain(&self.terms)
            .chain(&self.tags)
            .map(|t| normalize_tag(t))
            .collect()
    }
}

/// `Machine-Learning`, `machine_learning` and `machine learning` compare equal
fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
}

/// A completed developer -> skill path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertisePath {
    /// Graph identities, developer first, skill last
    pub nodes: Vec<NodeId>,
    pub hops: usize,
    pub reward: f64,
    pub accuracy: f64,
    pub efficiency: f64,
    pub diversity: f64,
    /// Accuracy fell back to the neutral value
    pub degraded: bool,
    pub visits: u32,
}

/// Outcome of one skill search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSearch {
    pub skill: String,
    /// Ordered by reward desc, then identity
    pub paths: Vec<ExpertisePath>,
    /// Simulations actually run
    pub iterations: usize,
}

impl SkillSearch {
    pub fn empty(skill: impl Into<String>) -> Self {
        Self {
            skill: skill.into(),
            paths: Vec::new(),
            iterations: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn degraded_paths(&self) -> usize {
        self.paths.iter().filter(|p| p.degraded).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_matching_normalizes_separators() {
        let skill = SkillHypothesis::new("machine learning", &["sklearn"], &["machine-learning"]);
        assert!(skill.matches_tag("Machine_Learning"));
        assert!(skill.matches_tag("sklearn"));
        assert!(!skill.matches_tag("learning"));
        assert!(!skill.matches_tag(""));
    }

    #[test]
    fn test_params_follow_config() {
        let mut config = AppConfig::default();
        config.search.iterations = 7;
        config.oracle.timeout_ms = 250;
        let params = SearchParams::from_config(&config);
        assert_eq!(params.iterations, 7);
        assert_eq!(params.oracle_timeout, Duration::from_millis(250));
    }
}
