//! CLI output formatting for check and export runs.
//!
//! # Tree Display
//!
//! Every node is shown by its title and positional index among its siblings,
//! with the produced artifacts as indented context lines. Exercises never
//! appear: annotation takes them out of the tree.
//!
//! ```text
//! Khan Academy
//!     001 Math
//!         001 Arithmetic
//!             001 Basic addition [Video]
//!                 Video: khan/math/arithmetic/addition-basics.mp4
//!                 Thumbnail: khan/math/arithmetic/addition-basics.png
//!             002 Subtraction intro [Video]
//! ```
//!
//! # Summary
//!
//! ```text
//! Annotated 9 nodes: 4 topics, 3 videos, 1 exercise
//! Dropped 1 node: 1 exercise, 0 unsupported, 0 unsafe id
//! Videos: 1 found, 2 missing (1 linked, 0 copied, 0 reused, 0 transcoded, 0 fetched)
//! Pruned 2 topics, 2 videos
//! Rendered 6 pages, 2 assets
//! Archive: /tmp/khan.zim
//! Took 0 hours, 1 minutes, 5 seconds
//! ```
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::annotate::AnnotateReport;
use crate::export::ExportSummary;
use crate::tree::TopicTree;
use crate::types::{NodeId, NodeKind, TopicNode};
use std::time::Duration;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `n thing` / `n things`.
fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn title_of(node: &TopicNode) -> &str {
    if node.title.is_empty() {
        &node.id
    } else {
        &node.title
    }
}

/// Header line for a non-root node. Topics carry no kind tag.
fn node_line(node: &TopicNode, position: usize) -> String {
    match node.kind {
        NodeKind::Topic => format!("{} {}", format_index(position), title_of(node)),
        _ => format!(
            "{} {} [{}]",
            format_index(position),
            title_of(node),
            node.kind.as_str()
        ),
    }
}

fn artifact_lines(node: &TopicNode, depth: usize, lines: &mut Vec<String>) {
    let Some(content) = &node.content else {
        return;
    };
    let pad = indent(depth + 1);
    for (label, url) in [
        ("Video", &content.video_url),
        ("Thumbnail", &content.thumbnail_url),
        ("Subtitles", &content.subtitle_url),
    ] {
        if let Some(url) = url {
            lines.push(format!("{pad}{label}: {url}"));
        }
    }
}

fn tree_lines(tree: &TopicTree, id: NodeId, depth: usize, lines: &mut Vec<String>) {
    for (i, &child) in tree.children(id).iter().enumerate() {
        let node = tree.node(child);
        lines.push(format!("{}{}", indent(depth + 1), node_line(node, i + 1)));
        artifact_lines(node, depth + 1, lines);
        tree_lines(tree, child, depth + 1, lines);
    }
}

/// The reachable tree, one line per node plus artifact context lines.
pub fn format_tree(tree: &TopicTree) -> Vec<String> {
    let root = tree.root();
    let mut lines = vec![title_of(tree.node(root)).to_string()];
    tree_lines(tree, root, 0, &mut lines);
    lines
}

pub fn format_annotate_report(report: &AnnotateReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Annotated {}: {}, {}, {}",
        plural(report.nodes, "node"),
        plural(report.topics, "topic"),
        plural(report.videos, "video"),
        plural(report.exercises, "exercise"),
    )];
    if report.missing_content > 0 {
        lines.push(format!("Missing content metadata: {}", report.missing_content));
    }
    let dropped = report.dropped_exercises + report.dropped_unsupported + report.dropped_unsafe;
    if dropped > 0 {
        lines.push(format!(
            "Dropped {}: {}, {} unsupported, {} unsafe id",
            plural(dropped, "node"),
            plural(report.dropped_exercises, "exercise"),
            report.dropped_unsupported,
            report.dropped_unsafe,
        ));
    }
    lines
}

/// Format a duration as `H hours, M minutes, S seconds`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!(
        "{} hours, {} minutes, {} seconds",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

pub fn format_summary(summary: &ExportSummary) -> Vec<String> {
    let p = &summary.process;
    let mut lines = format_annotate_report(&summary.annotate);
    lines.push(format!(
        "Videos: {} found, {} missing ({} linked, {} copied, {} reused, {} transcoded, {} fetched)",
        p.videos_found, p.videos_missing, p.linked, p.copied, p.reused, p.transcoded, p.fetched
    ));
    if p.fetch_failures > 0 {
        lines.push(format!("Fetch failures: {}", p.fetch_failures));
    }
    lines.push(format!(
        "Thumbnails: {} ({} generated), subtitles: {} ({} failed)",
        p.thumbnails, p.thumbnails_generated, p.subtitles, p.subtitle_failures
    ));
    lines.push(format!(
        "Pruned {}, {}",
        plural(p.topics_pruned, "topic"),
        plural(p.videos_pruned, "video")
    ));
    lines.push(format!(
        "Rendered {}, {}",
        plural(summary.render.pages, "page"),
        plural(summary.render.assets, "asset")
    ));
    lines.push(format!("Output: {}", summary.output_dir.display()));
    if let Some(archive) = &summary.archive {
        lines.push(format!("Archive: {}", archive.display()));
    }
    lines.push(format!("Took {}", format_duration(summary.duration)));
    lines
}

pub fn print_check_output(tree: &TopicTree, report: &AnnotateReport) {
    for line in format_tree(tree) {
        println!("{}", line);
    }
    println!();
    for line in format_annotate_report(report) {
        println!("{}", line);
    }
}

pub fn print_export_output(summary: &ExportSummary) {
    for line in format_tree(&summary.tree) {
        println!("{}", line);
    }
    println!();
    for line in format_summary(summary) {
        println!("{}", line);
    }
}
