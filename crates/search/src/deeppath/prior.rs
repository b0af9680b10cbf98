//! Static PUCT priors
//!
//! Computed once, when a tree node is expanded, from the graph attributes
//! of its children. Priors of one sibling set sum to 1.

use super::SkillHypothesis;
use skillgraph_common::config::PriorWeights;
use skillgraph_common::graph::{Edge, Node, NodeKind};

/// Floor applied before normalisation so that no admissible child is
/// starved (a zero-star repository without tags still gets explored)
pub const MIN_PRIOR: f64 = 0.01;

/// Priors for one sibling set, in the order of `children`
pub fn child_priors(
    children: &[(&Edge, &Node)],
    skill: &SkillHypothesis,
    weights: &PriorWeights,
) -> Vec<f64> {
    if children.is_empty() {
        return Vec::new();
    }

    let max_stars = children
        .iter()
        .filter_map(|(_, node)| node.repository())
        .filter_map(|repo| repo.stars)
        .max()
        .unwrap_or(0);
    let star_norm = (1.0 + max_stars as f64).ln();

    let max_weight = children
        .iter()
        .filter(|(_, node)| node.kind() != NodeKind::Repository && node.id != skill.id)
        .map(|(edge, _)| edge.weight)
        .fold(0.0_f64, f64::max);

    let raw: Vec<f64> = children
        .iter()
        .map(|(edge, node)| {
            if node.id == skill.id {
                return 1.0;
            }
            match node.repository() {
                Some(repo) => {
                    let stars = if star_norm > 0.0 {
                        (1.0 + repo.stars.unwrap_or(0) as f64).ln() / star_norm
                    } else {
                        0.0
                    };
                    let tag_match = if repo.tags().any(|tag| skill.matches_tag(&tag)) {
                        1.0
                    } else {
                        0.0
                    };
                    weights.stars * stars + weights.tag_match * tag_match
                }
                None if max_weight > 0.0 => edge.weight / max_weight,
                None => 0.0,
            }
        })
        .map(|p: f64| p.max(MIN_PRIOR))
        .collect();

    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|p| p / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillgraph_common::graph::{EdgeKind, GraphStore, NodeAttrs, NodeId, RepositoryAttrs};

    fn repo_graph() -> GraphStore {
        let mut graph = GraphStore::new();
        let dev = NodeId::developer("dev");
        graph.add_node(dev.clone(), NodeAttrs::empty(NodeKind::Developer)).unwrap();
        let repos = [
            ("acme/ml", 100, vec!["Python", "transformers"]),
            ("acme/web", 100, vec!["TypeScript"]),
            ("acme/toy", 0, vec![]),
        ];
        for (name, stars, tags) in repos {
            let id = NodeId::repository(name);
            graph
                .add_node(
                    id.clone(),
                    NodeAttrs::Repository(RepositoryAttrs {
                        stars: Some(stars),
                        topics: tags.into_iter().map(String::from).collect(),
                        ..Default::default()
                    }),
                )
                .unwrap();
            graph.add_edge(&dev, &id, EdgeKind::Contributes, 1.0, None).unwrap();
        }
        graph
    }

    #[test]
    fn test_repository_priors() {
        let graph = repo_graph();
        let skill = SkillHypothesis::new("transformers", &["transformers"], &["huggingface"]);
        let children: Vec<_> = graph.neighbors(&NodeId::developer("dev"), None).collect();
        let priors = child_priors(&children, &skill, &PriorWeights::default());

        assert_eq!(priors.len(), 3);
        assert!((priors.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let by_key: Vec<(&str, f64)> = children
            .iter()
            .zip(&priors)
            .map(|((_, node), p)| (node.id.key.as_str(), *p))
            .collect();
        let prior_of = |key: &str| by_key.iter().find(|(k, _)| *k == key).unwrap().1;
        assert!(prior_of("acme/ml") > prior_of("acme/web"));
        assert!(prior_of("acme/web") > prior_of("acme/toy"));
        assert!(prior_of("acme/toy") > 0.0);
    }

    #[test]
    fn test_all_zero_signals_are_uniform() {
        let graph = repo_graph();
        let skill = SkillHypothesis::new("cobol", &["cobol"], &[]);
        let children: Vec<_> = graph
            .neighbors(&NodeId::developer("dev"), None)
            .filter(|(_, node)| node.id.key == "acme/toy")
            .collect();
        let priors = child_priors(&children, &skill, &PriorWeights::default());
        assert_eq!(priors, vec![1.0]);
    }
}
