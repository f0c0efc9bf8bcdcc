//! Tree annotation.
//!
//! Pass 1 of the export. Walks the raw tree once, depth-first, and for each
//! node:
//!
//! - recurses into the children in source order, then keeps only Topic and
//!   Video children (exercises are annotated but dropped from the shape)
//! - attaches the per-kind payload: exercise metadata for exercises, content
//!   metadata for everything else that is not a topic
//! - translates `title` and `description` through the language catalog
//! - sets `url`, `parent`, `depth` and `path`
//! - strips fields nothing downstream reads
//!
//! Annotation never fails. Missing cache entries degrade to empty data and a
//! log line; children whose id cannot be used as a path segment are dropped.

use crate::i18n::Catalog;
use crate::source::{ContentCache, ExerciseCache};
use crate::tree::{TopicTree, is_safe_id, join_path};
use crate::types::{Content, NodeId, NodeKind};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

/// Source-tree fields that are dropped during annotation.
pub const TRANSIENT_FIELDS: &[&str] = &["child_data", "keywords", "hide", "contains"];

/// Lookups the annotator needs, all scoped to one export language.
pub struct AnnotateContext<'a> {
    pub catalog: &'a Catalog,
    pub content: &'a ContentCache,
    pub exercises: &'a ExerciseCache,
}

/// Counts collected during annotation, for the end-of-run report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotateReport {
    pub nodes: usize,
    pub topics: usize,
    pub videos: usize,
    pub exercises: usize,
    pub missing_content: usize,
    pub dropped_exercises: usize,
    pub dropped_unsupported: usize,
    pub dropped_unsafe: usize,
}

pub fn annotate(tree: &mut TopicTree, ctx: &AnnotateContext) -> AnnotateReport {
    let mut report = AnnotateReport::default();
    let root = tree.root();
    annotate_node(tree, root, 0, None, "", ctx, &mut report);
    debug!("Annotated {} nodes", report.nodes);
    report
}

fn annotate_node(
    tree: &mut TopicTree,
    id: NodeId,
    depth: usize,
    parent: Option<NodeId>,
    parent_path: &str,
    ctx: &AnnotateContext,
    report: &mut AnnotateReport,
) {
    let kind = tree.node(id).kind.clone();
    let path = match kind {
        NodeKind::Topic => join_path(parent_path, &tree.node(id).id),
        _ => parent_path.to_string(),
    };

    let children = tree.children(id).to_vec();
    let mut retained = Vec::with_capacity(children.len());
    for child in children {
        let child_id = &tree.node(child).id;
        if !is_safe_id(child_id) {
            error!("Dropping node with unsafe id {:?}", child_id);
            report.dropped_unsafe += 1;
            continue;
        }

        annotate_node(tree, child, depth + 1, Some(id), &path, ctx, report);

        match &tree.node(child).kind {
            NodeKind::Topic | NodeKind::Video => retained.push(child),
            NodeKind::Exercise => report.dropped_exercises += 1,
            NodeKind::Other(other) => {
                warn!("Unsupported kind {:?} for {}", other, tree.node(child).id);
                report.dropped_unsupported += 1;
            }
        }
    }

    let node = tree.node_mut(id);
    node.children = retained;

    match kind {
        NodeKind::Exercise => {
            node.exercise = Some(
                ctx.exercises
                    .get(&node.id)
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new())),
            );
            report.exercises += 1;
        }
        NodeKind::Topic => report.topics += 1,
        _ => {
            node.exercise = None;
            node.content = Some(match ctx.content.get(&node.id) {
                Some(content) => content.clone(),
                None => {
                    error!("No content for {}", node.id);
                    report.missing_content += 1;
                    Content::default()
                }
            });
            if kind == NodeKind::Video {
                report.videos += 1;
            }
        }
    }

    node.title = ctx.catalog.translate(&node.title);
    node.description = ctx.catalog.translate(&node.description);
    node.url = format!("{}.html", node.id);
    node.parent = parent;
    node.depth = depth;
    node.path = path;
    for field in TRANSIENT_FIELDS {
        node.extra.remove(*field);
    }
    report.nodes += 1;
}
