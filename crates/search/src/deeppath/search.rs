//! Per-skill MCTS driver

use super::prior::child_priors;
use super::reward;
use super::tree::{PathOutcome, SearchTree};
use super::{ExpertisePath, SearchParams, SkillHypothesis, SkillSearch};
use skillgraph_common::errors::{AppError, Result};
use skillgraph_common::graph::{FrozenGraph, GraphStore, NodeAttrs, NodeId, NodeIndex, NodeKind};
use skillgraph_common::metrics;
use skillgraph_common::oracle::{EvidenceHop, PathEvidence, ScoringOracle};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// MCTS over one frozen graph
#[derive(Clone)]
pub struct DeepPathSearch {
    graph: FrozenGraph,
    oracle: Arc<dyn ScoringOracle>,
    params: Arc<SearchParams>,
}

/// Bookkeeping for one run
#[derive(Default)]
struct RunState {
    /// Completed leaves with their prefixes, in completion order
    completed: Vec<(usize, Vec<NodeIndex>)>,
    /// Completed paths per repository
    through_repo: HashMap<NodeIndex, usize>,
}

impl DeepPathSearch {
    pub fn new(graph: FrozenGraph, oracle: Arc<dyn ScoringOracle>, params: Arc<SearchParams>) -> Self {
        Self {
            graph,
            oracle,
            params,
        }
    }

    /// Search for paths from `root` to the hypothesis' skill node.
    ///
    /// A root that cannot reach the skill within `max_depth` hops yields
    /// an empty result. The
    /// cancellation token is checked before every simulation.
    #[instrument(skip(self, root, skill, cancel), fields(skill = %skill.name, root = %root))]
    pub async fn run(
        &self,
        root: &NodeId,
        skill: &SkillHypothesis,
        cancel: &CancellationToken,
    ) -> Result<SkillSearch> {
        let graph = self.graph.as_ref();
        let root_idx = graph
            .index_of(root)
            .ok_or_else(|| AppError::inconsistency(root.to_string(), "search root is not in the graph"))?;
        let target = graph
            .index_of(&skill.id)
            .ok_or_else(|| AppError::inconsistency(skill.id.to_string(), "skill hypothesis has no node"))?;

        let distances = distances_to(graph, target);
        let reachable = distances
            .get(&root_idx)
            .is_some_and(|&d| d <= self.params.max_depth);
        if !reachable {
            debug!("Skill unreachable from root, no evidence");
            metrics::record_search(&skill.name, 0, 0);
            return Ok(SkillSearch::empty(skill.name.clone()));
        }

        let mut tree = SearchTree::new(root_idx);
        let mut state = RunState::default();

        for _ in 0..self.params.iterations {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let trail = self.descend(&mut tree, skill, target, &distances);
            let leaf = trail.last().copied().unwrap_or(SearchTree::ROOT);
            let value = if tree.get(leaf).node == target {
                self.evaluate(&mut tree, &trail, skill, &mut state, cancel).await?
            } else {
                0.0
            };
            tree.backup(&trail, value);
        }

        let mut paths: Vec<ExpertisePath> = state
            .completed
            .iter()
            .filter_map(|(leaf, prefix)| {
                let node = tree.get(*leaf);
                let outcome = node.outcome?;
                let nodes = prefix
                    .iter()
                    .copied()
                    .filter_map(|idx| graph.node_at(idx).map(|n| n.id.clone()))
                    .collect();
                Some(ExpertisePath {
                    nodes,
                    hops: node.depth,
                    reward: outcome.reward,
                    accuracy: outcome.accuracy,
                    efficiency: outcome.efficiency,
                    diversity: outcome.diversity,
                    degraded: outcome.degraded,
                    visits: node.visits,
                })
            })
            .collect();
        paths.sort_by(|a, b| b.reward.total_cmp(&a.reward).then_with(|| a.nodes.cmp(&b.nodes)));

        debug!(
            tree_size = tree.len(),
            paths = paths.len(),
            "Search finished"
        );
        metrics::record_search(&skill.name, self.params.iterations, paths.len());

        Ok(SkillSearch {
            skill: skill.name.clone(),
            paths,
            iterations: self.params.iterations,
        })
    }

    /// Walk from the root to a terminal node, expanding on the way.
    ///
    /// Returns the trail of tree node ids, root first.
    fn descend(
        &self,
        tree: &mut SearchTree,
        skill: &SkillHypothesis,
        target: NodeIndex,
        distances: &HashMap<NodeIndex, usize>,
    ) -> Vec<usize> {
        let graph = self.graph.as_ref();
        let mut trail = vec![SearchTree::ROOT];
        let mut current = SearchTree::ROOT;

        loop {
            let node = tree.get(current);
            if node.node == target || node.depth >= self.params.max_depth {
                return trail;
            }

            if node.children.is_none() {
                let on_path = tree.prefix(&trail);
                let children = self.admissible(node.node, node.depth, &on_path, skill, target, distances);
                tree.expand(current, children);
            }

            match tree.select(current, graph, self.params.c_puct) {
                Some(next) => {
                    trail.push(next);
                    current = next;
                }
                // dead end
                None => return trail,
            }
        }
    }

    /// Children of `from` worth expanding: unvisited, able to reach the
    /// target in the hops left, capped at `max_children` heaviest edges.
    fn admissible(
        &self,
        from: NodeIndex,
        depth: usize,
        on_path: &[NodeIndex],
        skill: &SkillHypothesis,
        target: NodeIndex,
        distances: &HashMap<NodeIndex, usize>,
    ) -> Vec<(NodeIndex, f64, f64)> {
        let graph = self.graph.as_ref();
        let hops_left = self.params.max_depth.saturating_sub(depth + 1);

        let candidates: Vec<_> = graph
            .neighbors_of(from, None)
            .filter(|(edge, node)| {
                !on_path.contains(&edge.target)
                    && (node.kind() != NodeKind::Skill || edge.target == target)
                    && distances.get(&edge.target).is_some_and(|&d| d <= hops_left)
            })
            .collect();

        let mut chosen: Vec<_> = candidates.iter().take(self.params.max_children).copied().collect();
        if let Some(hit) = candidates
            .iter()
            .skip(self.params.max_children)
            .find(|(edge, _)| edge.target == target)
        {
            chosen.pop();
            chosen.push(*hit);
        }

        let priors = child_priors(&chosen, skill, &self.params.prior);
        chosen
            .iter()
            .zip(priors)
            .map(|((edge, _), prior)| (edge.target, edge.weight, prior))
            .collect()
    }

    /// Reward of a completed path, consulting the oracle on first reach
    async fn evaluate(
        &self,
        tree: &mut SearchTree,
        trail: &[usize],
        skill: &SkillHypothesis,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<f64> {
        let leaf = trail.last().copied().unwrap_or(SearchTree::ROOT);
        if let Some(outcome) = tree.get(leaf).outcome {
            return Ok(outcome.reward);
        }

        let graph = self.graph.as_ref();
        let path = tree.prefix(trail);
        let evidence = evidence_for(graph, &path, skill);
        let (accuracy, degraded) = self.consult_oracle(&evidence, skill, cancel).await?;

        let repository = path
            .iter()
            .copied()
            .find(|&idx| graph.node_at(idx).map(|n| n.kind()) == Some(NodeKind::Repository));
        let earlier = repository
            .and_then(|r| state.through_repo.get(&r).copied())
            .unwrap_or(0);

        let hops = tree.get(leaf).depth;
        let efficiency = reward::efficiency(hops);
        let diversity = reward::diversity(earlier);
        let total = reward::combine(&self.params.reward, accuracy, efficiency, diversity);

        if let Some(r) = repository {
            *state.through_repo.entry(r).or_insert(0) += 1;
        }
        tree.get_mut(leaf).outcome = Some(PathOutcome {
            reward: total,
            accuracy,
            efficiency,
            diversity,
            degraded,
        });
        state.completed.push((leaf, path));

        Ok(total)
    }

    /// Bounded oracle call. Failures and timeouts fall back to the
    /// neutral accuracy and mark the path degraded.
    async fn consult_oracle(
        &self,
        evidence: &PathEvidence,
        skill: &SkillHypothesis,
        cancel: &CancellationToken,
    ) -> Result<(f64, bool)> {
        let started = Instant::now();
        let call = tokio::time::timeout(
            self.params.oracle_timeout,
            self.oracle.score(evidence, &skill.name),
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            outcome = call => outcome,
        };

        let neutral = self.params.neutral_accuracy;
        let (accuracy, degraded, label) = match outcome {
            Ok(Ok(confidence)) if confidence.is_finite() => (confidence.clamp(0.0, 1.0), false, "ok"),
            Ok(Ok(confidence)) => {
                warn!(confidence, "Oracle returned a non-finite confidence, using neutral accuracy");
                (neutral, true, "invalid")
            }
            Ok(Err(e)) => {
                warn!(error = %e, oracle = self.oracle.name(), "Oracle failed, using neutral accuracy");
                (neutral, true, "error")
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.params.oracle_timeout.as_millis() as u64,
                    oracle = self.oracle.name(),
                    "Oracle timed out, using neutral accuracy"
                );
                (neutral, true, "timeout")
            }
        };

        metrics::record_oracle(started.elapsed().as_secs_f64(), self.oracle.name(), label);
        Ok((accuracy, degraded))
    }
}

/// Hop count from every node that can reach `target` (reverse BFS)
fn distances_to(graph: &GraphStore, target: NodeIndex) -> HashMap<NodeIndex, usize> {
    let mut reverse: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
    for edge in graph.edges() {
        reverse.entry(edge.target).or_default().push(edge.source);
    }

    let mut distances = HashMap::from([(target, 0)]);
    let mut queue = VecDeque::from([target]);
    while let Some(current) = queue.pop_front() {
        let next = distances[&current] + 1;
        for &source in reverse.get(&current).map(Vec::as_slice).unwrap_or(&[]) {
            if !distances.contains_key(&source) {
                distances.insert(source, next);
                queue.push_back(source);
            }
        }
    }
    distances
}

/// Oracle payload for a path of graph nodes
fn evidence_for(graph: &GraphStore, path: &[NodeIndex], skill: &SkillHypothesis) -> PathEvidence {
    let hops = path
        .iter()
        .filter_map(|&idx| graph.node_at(idx))
        .map(|node| EvidenceHop {
            id: node.id.to_string(),
            kind: node.kind(),
            label: node.label(),
            excerpt: match &node.attrs {
                NodeAttrs::Commit(c) => c.excerpt.clone(),
                NodeAttrs::Repository(r) => r.description.clone(),
                NodeAttrs::Developer(d) => d.bio.clone(),
                NodeAttrs::Skill(_) => None,
            },
        })
        .collect();

    PathEvidence {
        hops,
        skill_terms: skill.terms.clone(),
    }
}
