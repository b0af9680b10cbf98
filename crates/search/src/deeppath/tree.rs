//! Search tree arena
//!
//! Each slot stands for exactly one path prefix starting at the developer.
//! Slots are only reached downward through `children`; a walker keeps the
//! trail of slot ids it descended, which is all backup needs. Children are
//! created together on first expansion and never removed.

use skillgraph_common::graph::{GraphStore, NodeIndex};

/// Oracle verdict cached on a completed-path leaf
#[derive(Debug, Clone, Copy)]
pub struct PathOutcome {
    pub reward: f64,
    pub accuracy: f64,
    pub efficiency: f64,
    pub diversity: f64,
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct SearchNode {
    /// Graph node at the end of this prefix
    pub node: NodeIndex,
    /// Hops from the developer
    pub depth: usize,
    pub visits: u32,
    pub value_sum: f64,
    pub prior: f64,
    /// Weight of the graph edge leading here
    pub edge_weight: f64,
    /// `None` until expanded
    pub children: Option<Vec<usize>>,
    pub outcome: Option<PathOutcome>,
}

impl SearchNode {
    /// Mean backed-up reward
    pub fn q(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / self.visits as f64
        }
    }
}

/// PUCT score: `Q + c · P · sqrt(ΣN) / (1 + N)`
pub fn puct(q: f64, prior: f64, sibling_visits: u32, visits: u32, c_puct: f64) -> f64 {
    q + c_puct * prior * (sibling_visits as f64).sqrt() / (1.0 + visits as f64)
}

#[derive(Debug)]
pub struct SearchTree {
    nodes: Vec<SearchNode>,
}

impl SearchTree {
    pub const ROOT: usize = 0;

    pub fn new(root: NodeIndex) -> Self {
        Self {
            nodes: vec![SearchNode {
                node: root,
                depth: 0,
                visits: 0,
                value_sum: 0.0,
                prior: 1.0,
                edge_weight: 0.0,
                children: None,
                outcome: None,
            }],
        }
    }

    pub fn get(&self, id: usize) -> &SearchNode {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut SearchNode {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Graph nodes along a trail of slot ids, root first
    pub fn prefix(&self, trail: &[usize]) -> Vec<NodeIndex> {
        trail.iter().map(|&id| self.nodes[id].node).collect()
    }

    /// Attach children `(graph node, edge weight, prior)` to `id`
    pub fn expand(&mut self, id: usize, children: Vec<(NodeIndex, f64, f64)>) {
        let depth = self.nodes[id].depth + 1;
        let mut ids = Vec::with_capacity(children.len());
        for (node, edge_weight, prior) in children {
            ids.push(self.nodes.len());
            self.nodes.push(SearchNode {
                node,
                depth,
                visits: 0,
                value_sum: 0.0,
                prior,
                edge_weight,
                children: None,
                outcome: None,
            });
        }
        self.nodes[id].children = Some(ids);
    }

    /// Child with the highest PUCT score.
    ///
    /// Ties go to the heavier edge, then to the lower node identity.
    pub fn select(&self, id: usize, graph: &GraphStore, c_puct: f64) -> Option<usize> {
        let children = self.nodes[id].children.as_deref()?;
        let sibling_visits: u32 = children.iter().map(|&c| self.nodes[c].visits).sum();

        let score = |c: usize| {
            let child = &self.nodes[c];
            puct(child.q(), child.prior, sibling_visits, child.visits, c_puct)
        };

        children.iter().copied().max_by(|&a, &b| {
            let (na, nb) = (&self.nodes[a], &self.nodes[b]);
            score(a)
                .total_cmp(&score(b))
                .then_with(|| na.edge_weight.total_cmp(&nb.edge_weight))
                .then_with(|| {
                    // lower identity wins, so compare reversed
                    let ia = graph.node_at(na.node).map(|n| &n.id);
                    let ib = graph.node_at(nb.node).map(|n| &n.id);
                    ib.cmp(&ia)
                })
        })
    }

    /// Add one reward to every node of a simulation trail
    pub fn backup(&mut self, trail: &[usize], reward: f64) {
        for &id in trail {
            let node = &mut self.nodes[id];
            node.visits += 1;
            node.value_sum += reward;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillgraph_common::graph::{EdgeKind, NodeAttrs, NodeId, NodeKind};

    fn graph() -> GraphStore {
        let mut graph = GraphStore::new();
        graph
            .add_node(NodeId::developer("dev"), NodeAttrs::empty(NodeKind::Developer))
            .unwrap();
        for repo in ["acme/a", "acme/b"] {
            graph
                .add_node(NodeId::repository(repo), NodeAttrs::empty(NodeKind::Repository))
                .unwrap();
            graph
                .add_edge(&NodeId::developer("dev"), &NodeId::repository(repo), EdgeKind::Contributes, 1.0, None)
                .unwrap();
        }
        graph
    }

    fn idx(graph: &GraphStore, repo: &str) -> NodeIndex {
        graph.index_of(&NodeId::repository(repo)).unwrap()
    }

    #[test]
    fn test_puct_formula() {
        assert_eq!(puct(0.5, 0.3, 0, 0, 1.0), 0.5);
        let score = puct(0.5, 0.5, 16, 3, 2.0);
        assert!((score - (0.5 + 2.0 * 0.5 * 4.0 / 4.0)).abs() < 1e-12);
    }

    #[test]
    fn test_tie_breaks_on_weight_then_identity() {
        let graph = graph();
        let root = graph.index_of(&NodeId::developer("dev")).unwrap();

        let mut tree = SearchTree::new(root);
        tree.expand(
            SearchTree::ROOT,
            vec![(idx(&graph, "acme/b"), 1.0, 0.5), (idx(&graph, "acme/a"), 1.0, 0.5)],
        );
        let chosen = tree.select(SearchTree::ROOT, &graph, 1.0).unwrap();
        assert_eq!(tree.get(chosen).node, idx(&graph, "acme/a"));

        let mut tree = SearchTree::new(root);
        tree.expand(
            SearchTree::ROOT,
            vec![(idx(&graph, "acme/a"), 1.0, 0.5), (idx(&graph, "acme/b"), 2.0, 0.5)],
        );
        let chosen = tree.select(SearchTree::ROOT, &graph, 1.0).unwrap();
        assert_eq!(tree.get(chosen).node, idx(&graph, "acme/b"));
    }

    #[test]
    fn test_backup_updates_running_mean() {
        let graph = graph();
        let root = graph.index_of(&NodeId::developer("dev")).unwrap();
        let mut tree = SearchTree::new(root);
        tree.expand(SearchTree::ROOT, vec![(idx(&graph, "acme/a"), 1.0, 1.0)]);

        tree.backup(&[0, 1], 1.0);
        tree.backup(&[0, 1], 0.0);
        assert_eq!(tree.get(1).visits, 2);
        assert!((tree.get(1).q() - 0.5).abs() < 1e-12);
        assert_eq!(tree.prefix(&[0, 1]), vec![root, idx(&graph, "acme/a")]);
    }

    #[test]
    fn test_each_slot_is_one_prefix() {
        let graph = graph();
        let root = graph.index_of(&NodeId::developer("dev")).unwrap();
        let (a, b) = (idx(&graph, "acme/a"), idx(&graph, "acme/b"));
        let mut tree = SearchTree::new(root);
        tree.expand(SearchTree::ROOT, vec![(a, 1.0, 0.5), (b, 1.0, 0.5)]);
        // the same graph node under two different prefixes gets two slots
        tree.expand(1, vec![(b, 1.0, 1.0)]);
        tree.expand(2, vec![(a, 1.0, 1.0)]);

        assert_eq!(tree.len(), 5);
        assert_eq!(tree.get(1).children.as_deref(), Some(&[3][..]));
        assert_eq!(tree.get(2).children.as_deref(), Some(&[4][..]));
        assert_eq!(tree.prefix(&[0, 1, 3]), vec![root, a, b]);
        assert_eq!(tree.prefix(&[0, 2, 4]), vec![root, b, a]);
        assert_eq!(tree.get(4).depth, 2);
    }

    #[test]
    fn test_visited_child_loses_exploration_bonus() {
        let graph = graph();
        let root = graph.index_of(&NodeId::developer("dev")).unwrap();
        let mut tree = SearchTree::new(root);
        tree.expand(
            SearchTree::ROOT,
            vec![(idx(&graph, "acme/a"), 1.0, 0.5), (idx(&graph, "acme/b"), 1.0, 0.5)],
        );
        // a was tried once and earned nothing
        tree.backup(&[0, 1], 0.0);
        let chosen = tree.select(SearchTree::ROOT, &graph, 1.0).unwrap();
        assert_eq!(tree.get(chosen).node, idx(&graph, "acme/b"));
    }
}
