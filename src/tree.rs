//! Arena-backed topic tree.
//!
//! The source tree is a nested JSON object (`{"id", "kind", "title",
//! "children": [...] , ...}`). It is flattened into a `Vec<TopicNode>` where
//! children and parents are [`NodeId`] indices. Pruning only rewrites the
//! `children` lists; detached nodes stay in the arena but are unreachable
//! from the root, so every traversal starts at [`TopicTree::root`].

use crate::types::{NodeId, NodeKind, TopicNode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsafe root id {0:?}: ids are used as path segments")]
    UnsafeRootId(String),
    #[error("Duplicate node id: {0}")]
    DuplicateId(String),
}

/// Node as it appears in the serialized source tree.
#[derive(Debug, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub children: Vec<RawNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct TopicTree {
    nodes: Vec<TopicNode>,
    root: NodeId,
}

impl TopicTree {
    pub fn load(path: &Path) -> Result<Self, TreeError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let raw: RawNode = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Flatten a nested source tree into the arena (pre-order).
    pub fn from_raw(raw: RawNode) -> Result<Self, TreeError> {
        if !is_safe_id(&raw.id) {
            return Err(TreeError::UnsafeRootId(raw.id));
        }
        let mut nodes = Vec::new();
        let mut seen = HashSet::new();
        let root = push_raw(&mut nodes, &mut seen, raw)?;
        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &TopicNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TopicNode {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Total nodes in the arena, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node reachable from the root by its string id.
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.walk().into_iter().find(|&n| self.node(n).id == id)
    }

    /// Nodes reachable from the root, in pre-order (curriculum order).
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Ancestor chain from the root down to (excluding) `id`.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain.reverse();
        chain
    }
}

fn push_raw(
    nodes: &mut Vec<TopicNode>,
    seen: &mut HashSet<String>,
    raw: RawNode,
) -> Result<NodeId, TreeError> {
    if !raw.id.is_empty() && !seen.insert(raw.id.clone()) {
        return Err(TreeError::DuplicateId(raw.id));
    }

    let index = NodeId(nodes.len());
    let mut node = TopicNode::new(raw.id, NodeKind::parse(&raw.kind));
    node.title = raw.title;
    node.description = raw.description.unwrap_or_default();
    node.extra = raw.extra;
    nodes.push(node);

    let mut children = Vec::with_capacity(raw.children.len());
    for child in raw.children {
        children.push(push_raw(nodes, seen, child)?);
    }
    nodes[index.0].children = children;
    Ok(index)
}

/// Join a relative output path and a segment with `/`.
pub fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}/{segment}")
    }
}

/// Whether an id can be used directly as a filesystem path segment.
///
/// Allowed: ASCII alphanumerics, `-`, `_` and `.`, not starting with `.`.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
