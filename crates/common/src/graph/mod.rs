//! Heterogeneous information network (HIN) storage
//!
//! Typed nodes (developer, repository, commit, skill) connected by typed,
//! weighted edges. Built once per inference run, then frozen and shared
//! read-only across search workers.

mod export;
mod store;
mod types;

pub use export::{ExportLink, ExportNode, GraphExport};
pub use store::{FrozenGraph, GraphStore};
pub use types::{
    CommitAttrs, DeveloperAttrs, Edge, EdgeKind, Node, NodeAttrs, NodeId, NodeIndex, NodeKind,
    RepositoryAttrs, SkillAttrs,
};
