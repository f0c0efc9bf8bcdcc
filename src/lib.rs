//! # Topic ZIM
//!
//! Exports an educational topic tree (topics, videos, exercises) into a
//! static, offline-browsable site and packages it as a ZIM archive with
//! `zimwriterfs`.
//!
//! # Architecture: Two Passes Over One Tree
//!
//! The topic tree is loaded once into an arena and mutated in place:
//!
//! ```text
//! 1. Annotate  raw tree  →  titles, urls, paths, parent links   (no I/O)
//! 2. Process   annotated →  media in tmp_dir, pruned tree       (ffmpeg, HTTP)
//! 3. Render    pruned    →  one page per node + welcome/about   (Maud)
//! 4. Package   tmp_dir   →  archive.zim                          (zimwriterfs)
//! ```
//!
//! Pass 2 is a single post-order walk: a node's children are processed and
//! pruned before the node itself decides whether it survives, so a topic
//! whose videos are all missing disappears together with its empty parents.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | `TopicNode`, `NodeId`, `NodeKind`, `Content` |
//! | [`tree`] | Arena-backed topic tree with index parent links and id validation |
//! | [`source`] | Loads the tree and metadata maps from the live data dir or fixtures |
//! | [`i18n`] | Translation catalog for titles and descriptions |
//! | [`annotate`] | Pass 1: metadata, derived fields, dropped node kinds |
//! | [`media`] | ffmpeg-backed transcode, thumbnail and subtitle operations |
//! | [`fetch`] | Retrying HTTP download of missing videos and thumbnails |
//! | [`process`] | Pass 2: media materialization and availability pruning |
//! | [`render`] | HTML pages and static assets |
//! | [`package`] | `zimwriterfs` resolution and invocation |
//! | [`export`] | Orchestrates a full run |
//! | [`config`] | Layered `topic-zim.toml` loading and validation |
//! | [`output`] | CLI report formatting |
//!
//! # Node Paths
//!
//! Node ids are used directly as path segments. Ids are restricted to ASCII
//! alphanumerics, `-`, `_` and `.` (not leading); nodes with other ids are
//! dropped during annotation. A topic's path is its parent's path plus its
//! own id, and a leaf's artifacts live in its topic's directory as
//! `<path>/<id>.<ext>`.

pub mod annotate;
pub mod config;
pub mod export;
pub mod fetch;
pub mod i18n;
pub mod media;
pub mod output;
pub mod package;
pub mod process;
pub mod render;
pub mod source;
pub mod tree;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
