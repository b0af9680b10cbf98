//! Trust fusion
//!
//! Maps completed expertise paths to Subjective Logic opinions and fuses
//! them per skill with Yager's rule.

mod opinion;
mod yager;

pub use opinion::{Opinion, TOLERANCE};
pub use yager::{combine, fuse};

use crate::deeppath::ExpertisePath;
use serde::{Deserialize, Serialize};
use skillgraph_common::config::FusionConfig;

/// Discount for long paths: `1 / (1 + penalty · (hops − 1))`
pub fn length_discount(hops: usize, length_penalty: f64) -> f64 {
    let extra_hops = hops.saturating_sub(1) as f64;
    1.0 / (1.0 + length_penalty.max(0.0) * extra_hops)
}

/// Opinion contributed by one completed path.
///
/// Belief is the reward, brought back into [0, 1] by `reward_total` and
/// discounted by length. Only an oracle accuracy below one half counts
/// against the skill; everything else stays uncertain. Degraded paths
/// are further discounted by the configured trust in the fallback.
pub fn path_opinion(path: &ExpertisePath, reward_total: f64, config: &FusionConfig) -> Opinion {
    let discount = length_discount(path.hops, config.length_penalty);
    let normalized = if reward_total > 0.0 {
        (path.reward / reward_total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let belief = discount * normalized;
    let contradiction = (1.0 - 2.0 * path.accuracy.clamp(0.0, 1.0)).max(0.0);
    let disbelief = (discount * contradiction).min(1.0 - belief);
    let uncertainty = 1.0 - belief - disbelief;
    let opinion = Opinion::clamped(belief, disbelief, uncertainty, config.base_rate);

    if path.degraded {
        let trust = Opinion::clamped(
            config.degraded_trust,
            0.0,
            1.0 - config.degraded_trust,
            config.base_rate,
        );
        opinion.discount(&trust)
    } else {
        opinion
    }
}

/// Fused trust metrics of one skill
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillMetrics {
    pub belief: f64,
    pub disbelief: f64,
    pub uncertainty: f64,
    pub base_rate: f64,
    pub plausibility: f64,
    pub path_count: usize,
}

impl SkillMetrics {
    pub fn from_opinion(opinion: &Opinion, path_count: usize) -> Self {
        Self {
            belief: opinion.belief,
            disbelief: opinion.disbelief,
            uncertainty: opinion.uncertainty,
            base_rate: opinion.base_rate,
            plausibility: opinion.plausibility(),
            path_count,
        }
    }
}

/// Fuse every path of one skill into its metrics
pub fn skill_metrics(paths: &[ExpertisePath], reward_total: f64, config: &FusionConfig) -> SkillMetrics {
    let opinions: Vec<Opinion> = paths
        .iter()
        .map(|p| path_opinion(p, reward_total, config))
        .collect();
    let fused = fuse(&opinions, config.base_rate);
    SkillMetrics::from_opinion(&fused, paths.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillgraph_common::graph::NodeId;

    fn path(hops: usize, accuracy: f64, reward: f64, degraded: bool) -> ExpertisePath {
        ExpertisePath {
            nodes: vec![NodeId::developer("dev"), NodeId::skill("rust")],
            hops,
            reward,
            accuracy,
            efficiency: 1.0 / (hops * hops) as f64,
            diversity: 1.0,
            degraded,
            visits: 1,
        }
    }

    fn config() -> FusionConfig {
        FusionConfig {
            base_rate: 0.5,
            length_penalty: 0.25,
            degraded_trust: 0.5,
        }
    }

    #[test]
    fn test_length_discount() {
        assert_eq!(length_discount(1, 0.25), 1.0);
        assert!(length_discount(3, 0.25) < length_discount(2, 0.25));
        assert!((length_discount(3, 0.25) - 1.0 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_supporting_path_has_no_disbelief() {
        let o = path_opinion(&path(3, 0.9, 0.75, false), 1.0, &config());
        assert!((o.belief + o.disbelief + o.uncertainty - 1.0).abs() < TOLERANCE);
        assert!((o.belief - 0.5).abs() < 1e-12);
        assert_eq!(o.disbelief, 0.0);
        assert!((o.uncertainty - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_low_accuracy_turns_into_disbelief() {
        let o = path_opinion(&path(1, 0.2, 0.2, false), 1.0, &config());
        assert!((o.belief - 0.2).abs() < 1e-12);
        assert!((o.disbelief - 0.6).abs() < 1e-12);
        assert!((o.uncertainty - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_agreeing_paths_strengthen_belief() {
        let paths: Vec<ExpertisePath> = (0..10).map(|_| path(3, 0.9, 0.6, false)).collect();
        let one = skill_metrics(&paths[..1], 1.0, &config());
        let many = skill_metrics(&paths, 1.0, &config());
        assert!(many.belief > one.belief);
        assert!(many.uncertainty < one.uncertainty);
        assert_eq!(many.path_count, 10);
    }

    #[test]
    fn test_degraded_path_is_discounted() {
        let clean = path_opinion(&path(3, 0.5, 0.5, false), 1.0, &config());
        let degraded = path_opinion(&path(3, 0.5, 0.5, true), 1.0, &config());
        assert!(degraded.belief < clean.belief);
        assert!(degraded.uncertainty > clean.uncertainty);
    }

    #[test]
    fn test_no_paths_is_vacuous() {
        let metrics = skill_metrics(&[], 1.0, &config());
        assert_eq!(metrics.belief, 0.0);
        assert_eq!(metrics.uncertainty, 1.0);
        assert_eq!(metrics.plausibility, 0.5);
        assert_eq!(metrics.path_count, 0);
    }
}
