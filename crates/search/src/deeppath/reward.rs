//! Terminal reward signals

use skillgraph_common::config::RewardWeights;

/// Shorter paths are cheaper evidence: `1 / hops²`
pub fn efficiency(hops: usize) -> f64 {
    if hops == 0 {
        return 0.0;
    }
    let h = hops as f64;
    1.0 / (h * h)
}

/// Bonus for a repository not already backing earlier paths: `1 / (1 + k)`
pub fn diversity(earlier_paths_through_repo: usize) -> f64 {
    1.0 / (1.0 + earlier_paths_through_repo as f64)
}

/// Weighted terminal reward
pub fn combine(weights: &RewardWeights, accuracy: f64, efficiency: f64, diversity: f64) -> f64 {
    weights.accuracy * accuracy + weights.efficiency * efficiency + weights.diversity * diversity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_efficiency_is_monotone() {
        assert_eq!(efficiency(1), 1.0);
        assert_eq!(efficiency(3), 1.0 / 9.0);
        assert!(efficiency(4) < efficiency(3));
        assert_eq!(efficiency(0), 0.0);
    }

    #[test]
    fn test_diversity_decays() {
        assert_eq!(diversity(0), 1.0);
        assert_eq!(diversity(1), 0.5);
        assert_eq!(diversity(3), 0.25);
    }

    #[test]
    fn test_weighted_reward() {
        let weights = RewardWeights {
            accuracy: 0.6,
            efficiency: 0.2,
            diversity: 0.2,
        };
        let reward = combine(&weights, 1.0, 1.0 / 9.0, 1.0);
        assert!((reward - (0.6 + 0.2 / 9.0 + 0.2)).abs() < 1e-12);
    }
}
