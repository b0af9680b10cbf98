//! In-memory HIN store
//!
//! Owns all nodes and edges of one developer's graph. Nodes are addressed
//! by identity and never duplicated; edges are unique per
//! (source, target, kind) and kept in descending-weight order per source.

use super::types::{Edge, EdgeKind, Node, NodeAttrs, NodeId, NodeIndex, NodeKind};
use crate::errors::{AppError, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Typed, weighted graph container
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    /// Node arena
    nodes: Vec<Node>,

    /// Identity -> arena index
    index: HashMap<NodeId, NodeIndex>,

    /// Edge arena
    edges: Vec<Edge>,

    /// (source, target, kind) -> edge arena index
    edge_index: HashMap<(NodeIndex, NodeIndex, EdgeKind), usize>,

    /// Outgoing edge ids per node, sorted by weight desc then target identity
    outgoing: Vec<Vec<usize>>,
}

/// Read-only graph shared by concurrent searches
pub type FrozenGraph = Arc<GraphStore>;

impl GraphStore {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node or merge attributes into the existing one.
    ///
    /// Fails with `GraphInconsistency` when the attributes belong to a
    /// different node kind than the identity.
    pub fn add_node(&mut self, id: NodeId, attrs: NodeAttrs) -> Result<NodeIndex> {
        if attrs.kind() != id.kind {
            return Err(AppError::inconsistency(
                id.to_string(),
                format!("{} attributes supplied for a {} node", attrs.kind(), id.kind),
            ));
        }

        if let Some(&existing) = self.index.get(&id) {
            let node = &mut self.nodes[existing.index()];
            if !node.attrs.merge(attrs) {
                return Err(AppError::inconsistency(
                    id.to_string(),
                    "conflicting attribute kind on existing node",
                ));
            }
            return Ok(existing);
        }

        let idx = NodeIndex(self.nodes.len() as u32);
        self.index.insert(id.clone(), idx);
        self.nodes.push(Node { id, attrs });
        self.outgoing.push(Vec::new());
        Ok(idx)
    }

    /// Add evidence to an edge.
    ///
    /// Weights accumulate for identical (src, dst, kind); a provenance
    /// already recorded on the edge is not counted twice. Returns the
    /// resulting edge weight.
    pub fn add_edge(
        &mut self,
        src: &NodeId,
        dst: &NodeId,
        kind: EdgeKind,
        weight: f64,
        provenance: Option<&str>,
    ) -> Result<f64> {
        let (s, t) = self.check_edge(src, dst, kind, weight)?;

        let edge_id = match self.edge_index.get(&(s, t, kind)) {
            Some(&edge_id) => {
                let edge = &mut self.edges[edge_id];
                let fresh = match provenance {
                    Some(p) => edge.provenance.insert(p.to_string()),
                    None => true,
                };
                if fresh {
                    edge.weight += weight;
                }
                edge_id
            }
            None => self.insert_edge(s, t, kind, weight, provenance),
        };

        self.resort(s);
        Ok(self.edges[edge_id].weight)
    }

    /// Structural write: the latest weight replaces the previous one.
    pub fn upsert_edge(
        &mut self,
        src: &NodeId,
        dst: &NodeId,
        kind: EdgeKind,
        weight: f64,
        provenance: Option<&str>,
    ) -> Result<f64> {
        let (s, t) = self.check_edge(src, dst, kind, weight)?;

        match self.edge_index.get(&(s, t, kind)) {
            Some(&edge_id) => {
                let edge = &mut self.edges[edge_id];
                edge.weight = weight;
                if let Some(p) = provenance {
                    edge.provenance.insert(p.to_string());
                }
            }
            None => {
                self.insert_edge(s, t, kind, weight, provenance);
            }
        }

        self.resort(s);
        Ok(weight)
    }

    fn check_edge(
        &self,
        src: &NodeId,
        dst: &NodeId,
        kind: EdgeKind,
        weight: f64,
    ) -> Result<(NodeIndex, NodeIndex)> {
        let (from_kind, to_kind) = kind.endpoints();
        if src.kind != from_kind || dst.kind != to_kind {
            return Err(AppError::inconsistency(
                src.to_string(),
                format!(
                    "{} edge cannot connect {} to {}",
                    kind.as_str(),
                    src.kind,
                    dst.kind
                ),
            ));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(AppError::inconsistency(
                src.to_string(),
                format!("invalid weight {} on {} edge to {}", weight, kind.as_str(), dst),
            ));
        }

        let s = self
            .index_of(src)
            .ok_or_else(|| AppError::inconsistency(src.to_string(), "edge source is not in the graph"))?;
        let t = self
            .index_of(dst)
            .ok_or_else(|| AppError::inconsistency(dst.to_string(), "edge target is not in the graph"))?;
        Ok((s, t))
    }

    fn insert_edge(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        kind: EdgeKind,
        weight: f64,
        provenance: Option<&str>,
    ) -> usize {
        let edge_id = self.edges.len();
        let mut edge = Edge {
            source,
            target,
            kind,
            weight,
            provenance: Default::default(),
        };
        if let Some(p) = provenance {
            edge.provenance.insert(p.to_string());
        }
        self.edges.push(edge);
        self.edge_index.insert((source, target, kind), edge_id);
        self.outgoing[source.index()].push(edge_id);
        edge_id
    }

    /// Restore the descending-weight order of one adjacency list
    fn resort(&mut self, source: NodeIndex) {
        let edges = &self.edges;
        let nodes = &self.nodes;
        self.outgoing[source.index()].sort_by(|&a, &b| {
            let (ea, eb) = (&edges[a], &edges[b]);
            eb.weight
                .partial_cmp(&ea.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| nodes[ea.target.index()].id.cmp(&nodes[eb.target.index()].id))
                .then_with(|| ea.kind.cmp(&eb.kind))
        });
    }

    /// Outgoing (edge, node) pairs of a node, heaviest first.
    ///
    /// Unknown identities yield an empty sequence.
    pub fn neighbors<'a>(
        &'a self,
        id: &NodeId,
        filter: Option<EdgeKind>,
    ) -> impl Iterator<Item = (&'a Edge, &'a Node)> + 'a {
        let slots: &[usize] = match self.index_of(id) {
            Some(idx) => &self.outgoing[idx.index()],
            None => &[],
        };
        self.iter_slots(slots, filter)
    }

    /// Same as [`neighbors`](Self::neighbors), addressed by arena index
    pub fn neighbors_of(
        &self,
        idx: NodeIndex,
        filter: Option<EdgeKind>,
    ) -> impl Iterator<Item = (&Edge, &Node)> + '_ {
        let slots: &[usize] = self
            .outgoing
            .get(idx.index())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        self.iter_slots(slots, filter)
    }

    fn iter_slots<'a>(
        &'a self,
        slots: &'a [usize],
        filter: Option<EdgeKind>,
    ) -> impl Iterator<Item = (&'a Edge, &'a Node)> + 'a {
        slots
            .iter()
            .map(move |&edge_id| &self.edges[edge_id])
            .filter(move |edge| filter.map_or(true, |k| edge.kind == k))
            .map(move |edge| (edge, &self.nodes[edge.target.index()]))
    }

    /// Look up a node index by identity
    pub fn index_of(&self, id: &NodeId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Get a node by identity
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.nodes[idx.index()])
    }

    /// Get a node by arena index
    pub fn node_at(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx.index())
    }

    /// Get the edge for (src, dst, kind)
    pub fn edge(&self, src: &NodeId, dst: &NodeId, kind: EdgeKind) -> Option<&Edge> {
        let s = self.index_of(src)?;
        let t = self.index_of(dst)?;
        self.edge_index
            .get(&(s, t, kind))
            .map(|&edge_id| &self.edges[edge_id])
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Nodes of one kind, sorted by identity
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.iter().filter(|n| n.kind() == kind).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// All edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get edge count
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of outgoing edges
    pub fn out_degree(&self, id: &NodeId) -> usize {
        self.index_of(id)
            .map(|idx| self.outgoing[idx.index()].len())
            .unwrap_or(0)
    }

    /// Hand the graph over for read-only concurrent use
    pub fn freeze(self) -> FrozenGraph {
        Arc::new(self)
    }
}
