//! Export orchestration.
//!
//! ```text
//! prepare   tmp_dir              (empty, or cleared with --clear)
//! load      topics + metadata    (live data dir or bundled fixtures)
//! annotate  pass 1               (titles, paths, dropped kinds)
//! process   pass 2               (media into tmp_dir, pruning)
//! render    surviving tree       (pages, welcome, about, static/)
//! package   tmp_dir → .zim       (zimwriterfs)
//! ```
//!
//! [`build_site`] runs everything up to rendering against any
//! [`MediaTools`]/[`RemoteFetcher`] pair; [`export`] wires in ffmpeg, HTTP
//! and the packager.

use crate::annotate::{AnnotateContext, AnnotateReport, annotate};
use crate::config::{ConfigError, ExportConfig};
use crate::fetch::{FetchError, HttpFetcher, RemoteFetcher};
use crate::i18n::{Catalog, I18nError};
use crate::media::{FfmpegTools, MediaTools};
use crate::package::{self, PackageError, PackageOptions};
use crate::process::{self, ProcessConfig, ProcessError, ProcessStats};
use crate::render::{self, FAVICON_PATH, RenderConfig, RenderError, RenderStats, WELCOME_PAGE};
use crate::source::{ContentSource, SourceError};
use crate::tree::TopicTree;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Destination {} is not empty; pass --clear to remove its contents", .0.display())]
    DestinationNotEmpty(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Translation catalog error: {0}")]
    I18n(#[from] I18nError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Interrupted before packaging")]
    Interrupted,
}

/// Everything produced by one export run.
#[derive(Debug)]
pub struct ExportSummary {
    /// The pruned tree as rendered.
    pub tree: TopicTree,
    pub output_dir: PathBuf,
    pub annotate: AnnotateReport,
    pub process: ProcessStats,
    pub render: RenderStats,
    /// Set once the packager has written the archive.
    pub archive: Option<PathBuf>,
    pub duration: Duration,
}

/// Data source for a run: the fixtures (a configured directory, else the
/// built-in copy), or the live data dir.
pub fn content_source(config: &ExportConfig, fixtures: bool) -> ContentSource {
    if fixtures {
        match &config.content.fixture_dir {
            Some(dir) => ContentSource::Fixture { dir: dir.clone() },
            None => ContentSource::Bundled,
        }
    } else {
        ContentSource::Live {
            data_dir: config.content.data_dir.clone(),
        }
    }
}

/// Make sure `dir` exists and is empty.
///
/// A non-empty directory is an error unless `clear` is set, in which case
/// its contents are removed first.
pub fn prepare_output_dir(dir: &Path, clear: bool) -> Result<(), ExportError> {
    if dir.is_dir() && fs::read_dir(dir)?.next().is_some() {
        if !clear {
            return Err(ExportError::DestinationNotEmpty(dir.to_path_buf()));
        }
        info!("Clearing {}", dir.display());
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// An annotated tree together with the catalog it was translated with.
struct Annotated {
    tree: TopicTree,
    report: AnnotateReport,
    catalog: Catalog,
}

fn load_and_annotate(config: &ExportConfig, fixtures: bool) -> Result<Annotated, ExportError> {
    let source = content_source(config, fixtures);
    let data = source.load(&config.language)?;
    let catalog = Catalog::load(&config.content.locale_dir, &config.language)?;

    let mut tree = data.tree;
    let report = annotate(
        &mut tree,
        &AnnotateContext {
            catalog: &catalog,
            content: &data.content,
            exercises: &data.exercises,
        },
    );
    Ok(Annotated {
        tree,
        report,
        catalog,
    })
}

/// Load and annotate without writing anything.
pub fn check(
    config: &ExportConfig,
    fixtures: bool,
) -> Result<(TopicTree, AnnotateReport), ExportError> {
    let annotated = load_and_annotate(config, fixtures)?;
    Ok((annotated.tree, annotated.report))
}

/// Prepare the export directory, then annotate, process and render into it.
///
/// Raising `cancel` stops the run before the next node or page.
pub fn build_site(
    config: &ExportConfig,
    fixtures: bool,
    tools: &impl MediaTools,
    fetcher: &impl RemoteFetcher,
    cancel: &Arc<AtomicBool>,
) -> Result<ExportSummary, ExportError> {
    let started = Instant::now();
    let output_dir = config.export_dir()?;
    info!("Exporting language {} into {}", config.language, output_dir.display());
    prepare_output_dir(&output_dir, config.clear)?;

    let Annotated {
        mut tree,
        report: annotate_report,
        catalog,
    } = load_and_annotate(config, fixtures)?;
    info!(
        "Annotated {} nodes ({} topics, {} videos, {} exercises)",
        annotate_report.nodes, annotate_report.topics, annotate_report.videos, annotate_report.exercises
    );

    let process_config = ProcessConfig {
        download: config.download,
        transcode_webm: config.transcode_webm,
        cancel: Arc::clone(cancel),
        ..process::process_config(
            &config.content.root,
            &config.content.subtitles_dir,
            &config.language,
            &output_dir,
        )
    };
    let process_stats = process::process(&mut tree, &process_config, tools, fetcher)?;
    if tree.children(tree.root()).is_empty() {
        warn!("No content survived; the archive will only hold the welcome and about pages");
    }

    let render_stats = render::render(
        &tree,
        &catalog,
        &RenderConfig {
            output_dir: output_dir.clone(),
            language: config.language.clone(),
            title: config.title.clone(),
            description: config.description.clone(),
            assets_dir: config.content.assets_dir.clone(),
            cancel: Arc::clone(cancel),
        },
    )?;
    info!("Rendered {} pages", render_stats.pages);

    Ok(ExportSummary {
        tree,
        output_dir,
        annotate: annotate_report,
        process: process_stats,
        render: render_stats,
        archive: None,
        duration: started.elapsed(),
    })
}

pub fn package_options(config: &ExportConfig, source_dir: &Path, zim_path: &Path) -> PackageOptions {
    PackageOptions {
        welcome: WELCOME_PAGE.to_string(),
        favicon: FAVICON_PATH.to_string(),
        language: package::iso639_3(&config.language),
        title: config.title.clone(),
        description: config.description.clone(),
        long_description: config.long_description.clone(),
        creator: config.creator.clone(),
        publisher: config.publisher.clone(),
        source_dir: source_dir.to_path_buf(),
        zim_path: zim_path.to_path_buf(),
    }
}

/// Full export into the archive at `zim_path`.
///
/// The packager is resolved before any work starts, so a missing
/// `zimwriterfs` fails fast.
pub fn export(
    config: &ExportConfig,
    zim_path: &Path,
    fixtures: bool,
    cancel: Arc<AtomicBool>,
) -> Result<ExportSummary, ExportError> {
    let started = Instant::now();
    let packager = package::resolve_packager(config.zimwriterfs.as_deref())?;
    info!("Using packager {}", packager.display());

    let tools = FfmpegTools::new(&config.tools.ffmpeg, config.tool_timeout());
    let fetcher = HttpFetcher::new(
        &config.remote.host,
        config.retry_policy(),
        config.read_timeout(),
        Arc::clone(&cancel),
    )?;

    let mut summary = build_site(config, fixtures, &tools, &fetcher, &cancel)?;
    if cancel.load(Ordering::SeqCst) {
        return Err(ExportError::Interrupted);
    }

    let zim_path = std::path::absolute(zim_path)?;
    package::package(
        &packager,
        &package_options(config, &summary.output_dir, &zim_path),
        config.tool_timeout(),
    )?;
    info!("Archive written to {}", zim_path.display());

    summary.archive = Some(zim_path);
    summary.duration = started.elapsed();
    Ok(summary)
}
