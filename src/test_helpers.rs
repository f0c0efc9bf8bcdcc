//! Shared test utilities for the export pipeline tests.
//!
//! Builds annotated trees from inline JSON or the bundled fixture data, and
//! provides lookups and shape assertions over [`TopicTree`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut tree = annotated_tree(r#"{"id": "a", "kind": "Topic", "children": [
//!     {"id": "b", "kind": "Video"}
//! ]}"#, &[("b", "mp4")]);
//!
//! assert_eq!(child_ids(&tree, "a"), vec!["b"]);
//! assert_tree_shape(&tree, &[("a", &["b"])]);
//! ```

use std::collections::HashMap;

use crate::annotate::{AnnotateContext, AnnotateReport, annotate};
use crate::i18n::Catalog;
use crate::source::{ContentCache, ContentSource, ExerciseCache};
use crate::tree::TopicTree;
use crate::types::{Content, TopicNode};

// =========================================================================
// Tree setup
// =========================================================================

pub fn content(format: &str, youtube_id: Option<&str>) -> Content {
    Content {
        format: format.to_string(),
        youtube_id: youtube_id.map(String::from),
        ..Default::default()
    }
}

/// Parse `json` and annotate it with a content cache of `(id, format)` pairs.
pub fn annotated_tree(json: &str, formats: &[(&str, &str)]) -> TopicTree {
    annotated_tree_with(json, |cache| {
        for (id, format) in formats {
            cache.insert(id.to_string(), content(format, None));
        }
    })
}

/// Parse `json` and annotate it with a content cache filled by `fill`.
pub fn annotated_tree_with(json: &str, fill: impl FnOnce(&mut ContentCache)) -> TopicTree {
    let mut tree = TopicTree::from_json(json).unwrap();
    let mut cache = ContentCache::new();
    fill(&mut cache);
    let catalog = Catalog::empty("en");
    let exercises = ExerciseCache::new();
    annotate(
        &mut tree,
        &AnnotateContext {
            catalog: &catalog,
            content: &cache,
            exercises: &exercises,
        },
    );
    tree
}

/// The bundled `data/` fixtures, loaded and annotated in English.
pub fn fixture_tree() -> (TopicTree, AnnotateReport) {
    let data = ContentSource::Bundled.load("en").unwrap();
    let mut tree = data.tree;
    let catalog = Catalog::from_messages("en", HashMap::new());
    let report = annotate(
        &mut tree,
        &AnnotateContext {
            catalog: &catalog,
            content: &data.content,
            exercises: &data.exercises,
        },
    );
    (tree, report)
}

// =========================================================================
// Lookups (panic with a clear message on miss)
// =========================================================================

/// Find a node reachable from the root by id. Panics if not found.
pub fn find_node<'a>(tree: &'a TopicTree, id: &str) -> &'a TopicNode {
    match tree.find(id) {
        Some(n) => tree.node(n),
        None => {
            let ids = reachable_ids(tree);
            panic!("node '{id}' not reachable. Available: {ids:?}")
        }
    }
}

/// All reachable ids in pre-order.
pub fn reachable_ids(tree: &TopicTree) -> Vec<&str> {
    tree.walk()
        .into_iter()
        .map(|n| tree.node(n).id.as_str())
        .collect()
}

/// Child ids of a reachable node, in order. Panics if the node is not found.
pub fn child_ids<'a>(tree: &'a TopicTree, id: &str) -> Vec<&'a str> {
    let node = find_node(tree, id);
    node.children
        .iter()
        .map(|&c| tree.node(c).id.as_str())
        .collect()
}

/// Assert the children of each listed node.
///
/// Each entry is `(id, children)`. Use `&[]` for a node expected to have none.
pub fn assert_tree_shape(tree: &TopicTree, expected: &[(&str, &[&str])]) {
    for (id, children) in expected {
        assert_eq!(
            child_ids(tree, id),
            children.to_vec(),
            "children of '{id}' mismatch"
        );
    }
}
