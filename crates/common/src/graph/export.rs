//! Node/link projection of the graph for visualization clients

use super::store::GraphStore;
use super::types::NodeKind;
use serde::{Deserialize, Serialize};

/// Exported node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    /// Rendered identity, e.g. `repo:acme/api`
    pub id: String,
    /// Type tag: `dev`, `repo`, `commit` or `skill`
    pub group: String,
    pub label: String,
    /// Display size
    pub val: u32,
}

/// Exported link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub weight: f64,
}

/// Read-only node/link list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub links: Vec<ExportLink>,
}

impl GraphExport {
    /// Skill node keys present in the export
    pub fn skill_keys(&self) -> Vec<&str> {
        let prefix = format!("{}:", NodeKind::Skill.prefix());
        self.nodes
            .iter()
            .filter(|n| n.group == NodeKind::Skill.prefix())
            .filter_map(|n| n.id.strip_prefix(prefix.as_str()))
            .collect()
    }
}

fn display_size(kind: NodeKind) -> u32 {
    match kind {
        NodeKind::Developer => 40,
        NodeKind::Repository => 10,
        NodeKind::Commit => 5,
        NodeKind::Skill => 15,
    }
}

impl GraphStore {
    /// Project the whole graph
    pub fn export(&self) -> GraphExport {
        self.export_filtered(|_| true)
    }

    /// Project the graph, keeping only skill nodes accepted by `keep_skill`
    /// (and the links pointing at them).
    pub fn export_filtered<F>(&self, keep_skill: F) -> GraphExport
    where
        F: Fn(&str) -> bool,
    {
        let keep = |kind: NodeKind, key: &str| kind != NodeKind::Skill || keep_skill(key);

        let nodes = self
            .nodes()
            .filter(|n| keep(n.kind(), &n.id.key))
            .map(|n| ExportNode {
                id: n.id.to_string(),
                group: n.kind().prefix().to_string(),
                label: n.label(),
                val: display_size(n.kind()),
            })
            .collect();

        let links = self
            .edges()
            .filter_map(|e| {
                let source = self.node_at(e.source)?;
                let target = self.node_at(e.target)?;
                if !keep(target.kind(), &target.id.key) {
                    return None;
                }
                Some(ExportLink {
                    source: source.id.to_string(),
                    target: target.id.to_string(),
                    kind: e.kind.as_str().to_string(),
                    weight: e.weight,
                })
            })
            .collect();

        GraphExport { nodes, links }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeKind, NodeAttrs, NodeId};

    fn graph() -> GraphStore {
        let mut g = GraphStore::new();
        g.add_node(NodeId::developer("dev"), NodeAttrs::empty(NodeKind::Developer)).unwrap();
        g.add_node(NodeId::repository("acme/a"), NodeAttrs::empty(NodeKind::Repository)).unwrap();
        g.add_node(NodeId::commit("c1"), NodeAttrs::empty(NodeKind::Commit)).unwrap();
        g.add_node(NodeId::skill("rust"), NodeAttrs::empty(NodeKind::Skill)).unwrap();
        g.add_node(NodeId::skill("go"), NodeAttrs::empty(NodeKind::Skill)).unwrap();
        g.upsert_edge(&NodeId::developer("dev"), &NodeId::repository("acme/a"), EdgeKind::Contributes, 1.0, None).unwrap();
        g.upsert_edge(&NodeId::repository("acme/a"), &NodeId::commit("c1"), EdgeKind::Contains, 0.5, None).unwrap();
        g.add_edge(&NodeId::commit("c1"), &NodeId::skill("rust"), EdgeKind::Mentions, 0.9, Some("c1")).unwrap();
        g.add_edge(&NodeId::commit("c1"), &NodeId::skill("go"), EdgeKind::Mentions, 0.2, Some("c1")).unwrap();
        g
    }

    #[test]
    fn test_export_groups_and_sizes() {
        let export = graph().export();
        assert_eq!(export.nodes.len(), 5);
        assert_eq!(export.links.len(), 4);

        let dev = export.nodes.iter().find(|n| n.id == "dev:dev").unwrap();
        assert_eq!(dev.group, "dev");
        assert_eq!(dev.val, 40);

        let json = serde_json::to_value(&export.links[0]).unwrap();
        assert_eq!(json["type"], "contributes");
    }

    #[test]
    fn test_filtered_export_drops_skill_and_links() {
        let export = graph().export_filtered(|skill| skill == "rust");
        assert_eq!(export.skill_keys(), vec!["rust"]);
        assert!(export.links.iter().all(|l| l.target != "skill:go"));
        assert_eq!(export.links.len(), 3);
    }
}
