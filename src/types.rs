//! Shared types used across all pipeline passes.
//!
//! A [`TopicNode`] lives inside a [`TopicTree`](crate::tree::TopicTree) arena
//! and refers to its relatives by [`NodeId`]. The annotate pass fills in the
//! derived fields, the process pass fills in [`Content`] availability and
//! artifact URLs, and the render pass reads everything.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node represents. Anything the source tree calls something else is
/// kept as [`NodeKind::Other`] so it can be logged and treated as unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Topic,
    Video,
    Exercise,
    Other(String),
}

impl NodeKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "Topic" => NodeKind::Topic,
            "Video" => NodeKind::Video,
            "Exercise" => NodeKind::Exercise,
            other => NodeKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Topic => "Topic",
            NodeKind::Video => "Video",
            NodeKind::Exercise => "Exercise",
            NodeKind::Other(s) => s,
        }
    }
}

/// Media metadata for a Video (or Exercise) node.
///
/// Loaded from the content cache keyed by node id. The materializer owns
/// `available` and the three `*_url` fields; everything the cache carries
/// beyond the known keys is preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Content {
    /// Container format of the stored media (`mp4`, or `webm` once transcoded).
    pub format: String,
    /// Identifier of the media on the remote host and in the content root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_id: Option<String>,
    /// Relative path of the exported media file (rewritten after transcoding).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Content {
    /// Stem used for the media files in the content root and on the remote host.
    pub fn source_stem<'a>(&'a self, node_id: &'a str) -> &'a str {
        self.youtube_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(node_id)
    }
}

/// One entry in the content hierarchy.
#[derive(Debug, Clone)]
pub struct TopicNode {
    pub id: String,
    pub kind: NodeKind,
    pub title: String,
    pub description: String,
    /// Ordered children; rewritten in place by the annotate and prune steps.
    pub children: Vec<NodeId>,
    /// Enclosing node. An index into the arena, never an owning reference.
    pub parent: Option<NodeId>,
    pub depth: usize,
    /// Page filename, `<id>.html`.
    pub url: String,
    /// Output subdirectory for this node's artifacts.
    pub path: String,
    pub content: Option<Content>,
    /// Opaque exercise metadata from the exercise cache.
    pub exercise: Option<Value>,
    /// Remaining fields from the source tree.
    pub extra: Map<String, Value>,
}

impl TopicNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            title: String::new(),
            description: String::new(),
            children: Vec::new(),
            parent: None,
            depth: 0,
            url: String::new(),
            path: String::new(),
            content: None,
            exercise: None,
            extra: Map::new(),
        }
    }

    pub fn is_topic(&self) -> bool {
        self.kind == NodeKind::Topic
    }

    pub fn is_video(&self) -> bool {
        self.kind == NodeKind::Video
    }

    /// Whether the node has a materialized, playable artifact.
    pub fn is_available(&self) -> bool {
        self.content.as_ref().is_some_and(|c| c.available)
    }
}
