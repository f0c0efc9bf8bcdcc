//! Media materialization and availability pruning.
//!
//! Pass 2 of the export. One post-order walk over the annotated tree that,
//! for every node:
//!
//! 1. recurses into the children, then keeps only the survivors: a Topic
//!    child needs at least one surviving child of its own, a Video child needs
//!    `available == true`, anything else is kept
//! 2. for a Video, resolves its media, fetches it if missing and requested,
//!    then links (or transcodes) it into the export directory together with
//!    its thumbnail and subtitles
//! 3. for an Exercise, marks it unavailable
//!
//! ## Output Structure
//!
//! ```text
//! <output_dir>/
//! └── khan/math/arithmetic/          # node `path`
//!     ├── addition-basics.mp4        # hard link (or .webm when transcoding)
//!     ├── addition-basics.png        # linked or extracted thumbnail
//!     └── addition-basics.vtt        # converted subtitles
//! ```
//!
//! Per-node problems (missing media, failed thumbnail or subtitle, exhausted
//! fetch) degrade the node and are logged. A failed transcode aborts the
//! walk, and so does the cancel flag, checked before every node and inside
//! fetches.
//!
//! Re-running over the same output directory is cheap: existing outputs are
//! never re-linked or re-encoded, and present sources are never re-fetched.

use crate::fetch::{FetchError, FetchOutcome, RemoteFetcher};
use crate::media::paths::TRANSCODED_FORMAT;
use crate::media::{
    LinkOutcome, MediaPaths, MediaRoots, MediaTools, ToolError, convert_subtitles, link_or_copy,
    output_path, source_format, synthesize_thumbnail, transcode_to_webm,
};
use crate::tree::TopicTree;
use crate::types::{NodeId, NodeKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transcoding {id} failed: {source}")]
    Transcode {
        id: String,
        #[source]
        source: ToolError,
    },
    #[error("Interrupted at {0}")]
    Interrupted(String),
}

/// Configuration for the materialize + prune walk
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub roots: MediaRoots,
    /// Export directory; node paths are relative to it.
    pub output_dir: PathBuf,
    /// Fetch videos missing from the content root.
    pub download: bool,
    /// Re-encode videos to WebM instead of linking them.
    pub transcode_webm: bool,
    /// Raised by the Ctrl-C handler.
    pub cancel: Arc<AtomicBool>,
}

/// Counters collected during the walk, returned to the caller for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub videos_found: usize,
    pub videos_missing: usize,
    pub linked: usize,
    pub copied: usize,
    /// Outputs already present from an earlier run.
    pub reused: usize,
    pub transcoded: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub thumbnails: usize,
    pub thumbnails_generated: usize,
    pub subtitles: usize,
    pub subtitle_failures: usize,
    pub topics_pruned: usize,
    pub videos_pruned: usize,
}

pub fn process(
    tree: &mut TopicTree,
    config: &ProcessConfig,
    tools: &impl MediaTools,
    fetcher: &impl RemoteFetcher,
) -> Result<ProcessStats, ProcessError> {
    let mut walk = Walk {
        config,
        tools,
        fetcher,
        stats: ProcessStats::default(),
    };
    walk.node(tree, tree.root())?;
    Ok(walk.stats)
}

struct Walk<'a, T, F> {
    config: &'a ProcessConfig,
    tools: &'a T,
    fetcher: &'a F,
    stats: ProcessStats,
}

impl<T: MediaTools, F: RemoteFetcher> Walk<'_, T, F> {
    fn node(&mut self, tree: &mut TopicTree, id: NodeId) -> Result<(), ProcessError> {
        if self.config.cancel.load(Ordering::SeqCst) {
            return Err(ProcessError::Interrupted(tree.node(id).id.clone()));
        }
        let children = tree.children(id).to_vec();
        let mut retained = Vec::with_capacity(children.len());

        for child in children {
            self.node(tree, child)?;
            if self.survives(tree, child) {
                retained.push(child);
            }
        }
        tree.node_mut(id).children = retained;

        match tree.node(id).kind {
            NodeKind::Topic => {}
            NodeKind::Video => self.materialize(tree, id)?,
            _ => {
                if let Some(content) = tree.node_mut(id).content.as_mut() {
                    content.available = false;
                }
            }
        }
        Ok(())
    }

    fn survives(&mut self, tree: &TopicTree, id: NodeId) -> bool {
        let node = tree.node(id);
        match node.kind {
            NodeKind::Topic if node.children.is_empty() => {
                debug!("Pruning empty topic {}", node.id);
                self.stats.topics_pruned += 1;
                false
            }
            NodeKind::Video if !node.is_available() => {
                debug!("Pruning unavailable video {}", node.id);
                self.stats.videos_pruned += 1;
                false
            }
            _ => true,
        }
    }

    fn materialize(&mut self, tree: &mut TopicTree, id: NodeId) -> Result<(), ProcessError> {
        let node = tree.node(id);
        let node_id = node.id.clone();
        let mut content = node.content.clone().unwrap_or_default();
        content.available = false;
        content.video_url = None;
        content.thumbnail_url = None;
        content.subtitle_url = None;
        content.format = source_format(&content).to_string();
        let paths = MediaPaths::resolve(&self.config.roots, &node_id, &node.path, &content);

        if self.config.download && !paths.video_src.exists() {
            self.fetch(&node_id, content.source_stem(&node_id), &content.format, &paths)?;
        }

        if !paths.video_src.exists() {
            self.stats.videos_missing += 1;
            if self.config.download {
                error!("File not found: {}", paths.video_src.display());
            } else {
                warn!("File not found: {}", paths.video_src.display());
            }
            tree.node_mut(id).content = Some(content);
            return Ok(());
        }

        let video_rel = if self.config.transcode_webm {
            let out = self.output(&paths.transcoded_rel);
            if out.exists() {
                self.stats.reused += 1;
            } else {
                info!("Transcoding {} to WebM", node_id);
                transcode_to_webm(self.tools, &paths.video_src, &out).map_err(|source| {
                    ProcessError::Transcode {
                        id: node_id.clone(),
                        source,
                    }
                })?;
                self.stats.transcoded += 1;
            }
            content.format = TRANSCODED_FORMAT.to_string();
            paths.transcoded_rel.clone()
        } else {
            let outcome = link_or_copy(&paths.video_src, &self.output(&paths.video_rel))?;
            self.count_link(outcome);
            paths.video_rel.clone()
        };

        content.path = Some(video_rel.clone());
        content.video_url = Some(video_rel);
        content.available = true;
        self.stats.videos_found += 1;
        info!("Videos found: {}", self.stats.videos_found);

        content.thumbnail_url = self.thumbnail(&node_id, &paths)?;
        content.subtitle_url = self.subtitles(&node_id, &paths);

        tree.node_mut(id).content = Some(content);
        Ok(())
    }

    fn fetch(
        &mut self,
        node_id: &str,
        remote_id: &str,
        format: &str,
        paths: &MediaPaths,
    ) -> Result<(), ProcessError> {
        info!(
            "Video file being downloaded to: {}",
            paths.video_src.display()
        );
        match self
            .fetcher
            .fetch(remote_id, format, &self.config.roots.content_root)
        {
            Ok(FetchOutcome::Fetched) => self.stats.fetched += 1,
            Ok(FetchOutcome::NotFound) => debug!("Remote has no video for {}", node_id),
            Err(FetchError::Interrupted) => {
                return Err(ProcessError::Interrupted(node_id.to_string()));
            }
            Err(e) => {
                error!("Download failed for {}: {}", node_id, e);
                self.stats.fetch_failures += 1;
            }
        }
        Ok(())
    }

    fn thumbnail(
        &mut self,
        node_id: &str,
        paths: &MediaPaths,
    ) -> Result<Option<String>, ProcessError> {
        if !paths.thumbnail_src.exists() {
            match synthesize_thumbnail(self.tools, &paths.video_src, &paths.thumbnail_src) {
                Ok(()) => self.stats.thumbnails_generated += 1,
                Err(e) => warn!("No thumbnail for {}: {}", node_id, e),
            }
        }
        if !paths.thumbnail_src.exists() {
            return Ok(None);
        }
        let outcome = link_or_copy(&paths.thumbnail_src, &self.output(&paths.thumbnail_rel))?;
        self.count_link(outcome);
        self.stats.thumbnails += 1;
        Ok(Some(paths.thumbnail_rel.clone()))
    }

    fn subtitles(&mut self, node_id: &str, paths: &MediaPaths) -> Option<String> {
        if !paths.subtitle_src.exists() {
            return None;
        }
        let out = self.output(&paths.subtitle_rel);
        if out.exists() {
            self.stats.reused += 1;
        } else if let Err(e) = convert_subtitles(self.tools, &paths.subtitle_src, &out) {
            warn!("Subtitle conversion failed for {}: {}", node_id, e);
            self.stats.subtitle_failures += 1;
            return None;
        }
        self.stats.subtitles += 1;
        Some(paths.subtitle_rel.clone())
    }

    fn output(&self, rel: &str) -> PathBuf {
        output_path(&self.config.output_dir, rel)
    }

    fn count_link(&mut self, outcome: LinkOutcome) {
        match outcome {
            LinkOutcome::Linked => self.stats.linked += 1,
            LinkOutcome::Copied => self.stats.copied += 1,
            LinkOutcome::AlreadyPresent => self.stats.reused += 1,
        }
    }
}

/// Media roots and output directory for an export into `output_dir`.
pub fn process_config(
    content_root: &Path,
    subtitles_dir: &Path,
    language: &str,
    output_dir: &Path,
) -> ProcessConfig {
    ProcessConfig {
        roots: MediaRoots {
            content_root: content_root.to_path_buf(),
            subtitles_dir: subtitles_dir.to_path_buf(),
            language: language.to_string(),
        },
        output_dir: output_dir.to_path_buf(),
        download: false,
        transcode_webm: false,
        cancel: Arc::new(AtomicBool::new(false)),
    }
}
