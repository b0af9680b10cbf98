//! Node and edge types of the heterogeneous information network

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Node type in the HIN
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Developer,
    Repository,
    Commit,
    Skill,
}

impl NodeKind {
    /// Prefix used in rendered identities
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::Developer => "dev",
            NodeKind::Repository => "repo",
            NodeKind::Commit => "commit",
            NodeKind::Skill => "skill",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Developer => "developer",
            NodeKind::Repository => "repository",
            NodeKind::Commit => "commit",
            NodeKind::Skill => "skill",
        };
        f.write_str(name)
    }
}

/// Node identity: (type, key)
///
/// Ordering is by kind, then key, which gives the deterministic
/// tie-break used throughout search.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub kind: NodeKind,
    pub key: String,
}

impl NodeId {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn developer(login: &str) -> Self {
        Self::new(NodeKind::Developer, login)
    }

    pub fn repository(full_name: &str) -> Self {
        Self::new(NodeKind::Repository, full_name)
    }

    pub fn commit(sha: &str) -> Self {
        Self::new(NodeKind::Commit, sha)
    }

    pub fn skill(name: &str) -> Self {
        Self::new(NodeKind::Skill, name)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.key)
    }
}

/// Dense index of a node inside one graph store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(pub(crate) u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeveloperAttrs {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub public_repos: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryAttrs {
    /// Primary language
    pub language: Option<String>,
    /// All languages reported for the repository
    pub languages: Vec<String>,
    pub topics: Vec<String>,
    pub stars: Option<u64>,
    pub description: Option<String>,
}

impl RepositoryAttrs {
    /// Language and topic tags, lowercased
    pub fn tags(&self) -> impl Iterator<Item = String> + '_ {
        self.language
            .iter()
            .chain(self.languages.iter())
            .chain(self.topics.iter())
            .map(|t| t.to_lowercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitAttrs {
    pub message: Option<String>,
    pub date: Option<String>,
    /// Short excerpt of the added lines, used as oracle context
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillAttrs {
    pub display_name: Option<String>,
    pub terms: Vec<String>,
    pub tags: Vec<String>,
}

/// Type-specific node attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeAttrs {
    Developer(DeveloperAttrs),
    Repository(RepositoryAttrs),
    Commit(CommitAttrs),
    Skill(SkillAttrs),
}

impl NodeAttrs {
    /// Empty attributes for a node kind
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Developer => NodeAttrs::Developer(DeveloperAttrs::default()),
            NodeKind::Repository => NodeAttrs::Repository(RepositoryAttrs::default()),
            NodeKind::Commit => NodeAttrs::Commit(CommitAttrs::default()),
            NodeKind::Skill => NodeAttrs::Skill(SkillAttrs::default()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeAttrs::Developer(_) => NodeKind::Developer,
            NodeAttrs::Repository(_) => NodeKind::Repository,
            NodeAttrs::Commit(_) => NodeKind::Commit,
            NodeAttrs::Skill(_) => NodeKind::Skill,
        }
    }

    /// Overwrite the fields provided by `other`, keep the rest.
    ///
    /// Returns false when `other` describes a different node kind.
    pub(crate) fn merge(&mut self, other: NodeAttrs) -> bool {
        match (self, other) {
            (NodeAttrs::Developer(a), NodeAttrs::Developer(b)) => {
                overwrite(&mut a.name, b.name);
                overwrite(&mut a.bio, b.bio);
                overwrite(&mut a.public_repos, b.public_repos);
            }
            (NodeAttrs::Repository(a), NodeAttrs::Repository(b)) => {
                overwrite(&mut a.language, b.language);
                overwrite_list(&mut a.languages, b.languages);
                overwrite_list(&mut a.topics, b.topics);
                overwrite(&mut a.stars, b.stars);
                overwrite(&mut a.description, b.description);
            }
            (NodeAttrs::Commit(a), NodeAttrs::Commit(b)) => {
                overwrite(&mut a.message, b.message);
                overwrite(&mut a.date, b.date);
                overwrite(&mut a.excerpt, b.excerpt);
            }
            (NodeAttrs::Skill(a), NodeAttrs::Skill(b)) => {
                overwrite(&mut a.display_name, b.display_name);
                overwrite_list(&mut a.terms, b.terms);
                overwrite_list(&mut a.tags, b.tags);
            }
            _ => return false,
        }
        true
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn overwrite_list<T>(slot: &mut Vec<T>, value: Vec<T>) {
    if !value.is_empty() {
        *slot = value;
    }
}

/// A node owned by the graph store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub attrs: NodeAttrs,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.id.kind
    }

    pub fn repository(&self) -> Option<&RepositoryAttrs> {
        match &self.attrs {
            NodeAttrs::Repository(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn commit(&self) -> Option<&CommitAttrs> {
        match &self.attrs {
            NodeAttrs::Commit(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn skill(&self) -> Option<&SkillAttrs> {
        match &self.attrs {
            NodeAttrs::Skill(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> String {
        match &self.attrs {
            NodeAttrs::Developer(a) => a.name.clone().unwrap_or_else(|| self.id.key.clone()),
            NodeAttrs::Repository(_) => self.id.key.clone(),
            NodeAttrs::Commit(a) => match a.message.as_deref().and_then(|m| m.lines().next()) {
                Some(line) if !line.trim().is_empty() => truncate(line.trim(), 72),
                _ => self.id.key.chars().take(7).collect(),
            },
            NodeAttrs::Skill(a) => a
                .display_name
                .clone()
                .unwrap_or_else(|| self.id.key.clone()),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

/// Edge type in the HIN
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// developer -> repository
    Contributes,
    /// repository -> commit
    Contains,
    /// commit -> skill
    Mentions,
}

impl EdgeKind {
    /// Endpoint kinds this edge type connects
    pub fn endpoints(&self) -> (NodeKind, NodeKind) {
        match self {
            EdgeKind::Contributes => (NodeKind::Developer, NodeKind::Repository),
            EdgeKind::Contains => (NodeKind::Repository, NodeKind::Commit),
            EdgeKind::Mentions => (NodeKind::Commit, NodeKind::Skill),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contributes => "contributes",
            EdgeKind::Contains => "contains",
            EdgeKind::Mentions => "mentions",
        }
    }
}

/// Directed weighted edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub kind: EdgeKind,
    /// Non-negative weight
    pub weight: f64,
    /// Documents/commits that contributed to the weight
    pub provenance: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rendering() {
        assert_eq!(NodeId::developer("octocat").to_string(), "dev:octocat");
        assert_eq!(NodeId::repository("acme/api").to_string(), "repo:acme/api");
        assert_eq!(NodeId::skill("rust").to_string(), "skill:rust");
    }

    #[test]
    fn test_identity_ordering_is_kind_then_key() {
        let mut ids = vec![
            NodeId::skill("a"),
            NodeId::repository("z/z"),
            NodeId::repository("a/a"),
        ];
        ids.sort();
        assert_eq!(ids[0], NodeId::repository("a/a"));
        assert_eq!(ids[2], NodeId::skill("a"));
    }

    #[test]
    fn test_merge_overwrites_provided_fields_only() {
        let mut attrs = NodeAttrs::Repository(RepositoryAttrs {
            language: Some("Python".into()),
            stars: Some(3),
            description: Some("old".into()),
            ..Default::default()
        });
        let merged = attrs.merge(NodeAttrs::Repository(RepositoryAttrs {
            stars: Some(10),
            ..Default::default()
        }));
        assert!(merged);
        let repo = match attrs {
            NodeAttrs::Repository(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(repo.stars, Some(10));
        assert_eq!(repo.language.as_deref(), Some("Python"));
        assert_eq!(repo.description.as_deref(), Some("old"));
    }

    #[test]
    fn test_merge_rejects_other_kind() {
        let mut attrs = NodeAttrs::empty(NodeKind::Commit);
        assert!(!attrs.merge(NodeAttrs::empty(NodeKind::Skill)));
    }

    #[test]
    fn test_commit_label_uses_first_message_line() {
        let node = Node {
            id: NodeId::commit("0123456789abcdef"),
            attrs: NodeAttrs::Commit(CommitAttrs {
                message: Some("Add attention layer\n\nLong body".into()),
                ..Default::default()
            }),
        };
        assert_eq!(node.label(), "Add attention layer");

        let bare = Node {
            id: NodeId::commit("0123456789abcdef"),
            attrs: NodeAttrs::empty(NodeKind::Commit),
        };
        assert_eq!(bare.label(), "0123456");
    }
}
