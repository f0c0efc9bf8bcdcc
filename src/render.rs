//! HTML page rendering.
//!
//! Pass 3 of the export. Walks the pruned tree and writes one page per
//! reachable node, plus the welcome and about pages and the static assets.
//!
//! ## Output Structure
//!
//! ```text
//! <output_dir>/
//! ├── welcome.html               # Entry page: top-level topics
//! ├── about.html                 # Rendered from static/about.md
//! ├── khan.html                  # One page per node, `<id>.html`
//! ├── addition-basics.html
//! ├── static/
//! │   ├── style.css
//! │   ├── favicon.png
//! │   └── ...                    # Copied from the configured assets dir
//! └── khan/...                   # Media written by the process pass
//! ```
//!
//! Templates reference assets under `/static/`; every page is rewritten to
//! use `static/` so the archive works without a server root.

use crate::i18n::Catalog;
use crate::media::mime_type;
use crate::tree::TopicTree;
use crate::types::{NodeId, NodeKind, TopicNode};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Cannot read assets: {0}")]
    Assets(#[from] walkdir::Error),
    #[error("Interrupted after {0} pages")]
    Interrupted(usize),
}

const CSS: &str = include_str!("../static/style.css");
const FAVICON: &[u8] = include_bytes!("../static/favicon.png");
const ABOUT_MD: &str = include_str!("../static/about.md");

pub const WELCOME_PAGE: &str = "welcome.html";
pub const ABOUT_PAGE: &str = "about.html";
pub const STATIC_DIR: &str = "static";
pub const FAVICON_PATH: &str = "static/favicon.png";

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub output_dir: PathBuf,
    pub language: String,
    /// Archive title shown on the welcome page.
    pub title: String,
    pub description: String,
    /// Extra static files copied into `static/`.
    pub assets_dir: Option<PathBuf>,
    /// Checked before each page.
    pub cancel: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub pages: usize,
    pub assets: usize,
}

pub fn render(
    tree: &TopicTree,
    catalog: &Catalog,
    config: &RenderConfig,
) -> Result<RenderStats, RenderError> {
    fs::create_dir_all(&config.output_dir)?;
    let mut stats = RenderStats::default();

    for id in tree.walk() {
        if config.cancel.load(Ordering::SeqCst) {
            return Err(RenderError::Interrupted(stats.pages));
        }
        let node = tree.node(id);
        let ancestors = tree.ancestors(id);
        let page = render_node(tree, id, &ancestors, catalog, config);
        write_page(&config.output_dir.join(&node.url), page)?;
        stats.pages += 1;
    }
    tracing::info!("Rendered {} node pages", stats.pages);

    write_page(
        &config.output_dir.join(WELCOME_PAGE),
        render_welcome(tree, catalog, config),
    )?;
    write_page(
        &config.output_dir.join(ABOUT_PAGE),
        render_about(ABOUT_MD, catalog, config),
    )?;
    stats.pages += 2;

    stats.assets = write_static_assets(&config.output_dir, config.assets_dir.as_deref())?;
    Ok(stats)
}

fn write_page(path: &Path, page: Markup) -> io::Result<()> {
    fs::write(path, relativize_static(&page.into_string()))
}

/// Rewrite absolute `/static/` references to relative ones.
pub fn relativize_static(html: &str) -> String {
    html.replace("\"/static/", "\"static/")
        .replace("'/static/", "'static/")
        .replace("url(/static/", "url(static/")
}

/// Write the bundled stylesheet and favicon, then copy `assets_dir` over them.
///
/// Returns the number of files written.
pub fn write_static_assets(output_dir: &Path, assets_dir: Option<&Path>) -> Result<usize, RenderError> {
    let static_dir = output_dir.join(STATIC_DIR);
    fs::create_dir_all(&static_dir)?;
    fs::write(static_dir.join("style.css"), CSS)?;
    fs::write(static_dir.join("favicon.png"), FAVICON)?;
    let mut written = 2;

    let Some(assets) = assets_dir else {
        return Ok(written);
    };
    if !assets.is_dir() {
        tracing::warn!("Assets directory not found: {}", assets.display());
        return Ok(written);
    }
    for entry in WalkDir::new(assets) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(assets)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let target = static_dir.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            written += 1;
        }
    }
    Ok(written)
}

// ============================================================================
// HTML Components
// ============================================================================

fn base_document(title: &str, language: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(language) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href="/static/style.css";
                link rel="icon" type="image/png" href="/static/favicon.png";
            }
            body {
                (content)
            }
        }
    }
}

fn site_header(breadcrumb: Markup, catalog: &Catalog) -> Markup {
    html! {
        header.site-header {
            nav.breadcrumb {
                (breadcrumb)
            }
            nav.site-nav {
                a href=(WELCOME_PAGE) { (catalog.translate("Home")) }
                a href=(ABOUT_PAGE) { (catalog.translate("About")) }
            }
        }
    }
}

/// Breadcrumb from the root down to the current page.
pub fn render_breadcrumb(tree: &TopicTree, ancestors: &[NodeId], current: &TopicNode) -> Markup {
    html! {
        @for &id in ancestors {
            @let node = tree.node(id);
            a href=(node.url) { (display_title(node)) }
            " › "
        }
        span.current { (display_title(current)) }
    }
}

fn display_title(node: &TopicNode) -> &str {
    if node.title.is_empty() {
        &node.id
    } else {
        &node.title
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Page for one node, given its ancestor chain (root first).
pub fn render_node(
    tree: &TopicTree,
    id: NodeId,
    ancestors: &[NodeId],
    catalog: &Catalog,
    config: &RenderConfig,
) -> Markup {
    let node = tree.node(id);
    let body = match node.kind {
        NodeKind::Video => render_video(node, config),
        _ => render_topic(tree, node),
    };
    let content = html! {
        (site_header(render_breadcrumb(tree, ancestors, node), catalog))
        (body)
    };
    base_document(display_title(node), &config.language, content)
}

fn render_topic(tree: &TopicTree, node: &TopicNode) -> Markup {
    let (videos, topics): (Vec<&TopicNode>, Vec<&TopicNode>) = node
        .children
        .iter()
        .map(|&c| tree.node(c))
        .partition(|c| c.is_video());

    html! {
        main.topic-page {
            h1 { (display_title(node)) }
            @if !node.description.is_empty() {
                p.description { (node.description) }
            }
            @if !topics.is_empty() {
                ul.topic-list {
                    @for child in &topics {
                        li {
                            a href=(child.url) { (display_title(child)) }
                            @if !child.description.is_empty() {
                                p.description { (child.description) }
                            }
                        }
                    }
                }
            }
            @if !videos.is_empty() {
                div.video-grid {
                    @for video in &videos {
                        a.video-card href=(video.url) {
                            @if let Some(thumb) = video.content.as_ref().and_then(|c| c.thumbnail_url.as_ref()) {
                                img src=(thumb) alt=(display_title(video)) loading="lazy";
                            }
                            span.video-title { (display_title(video)) }
                        }
                    }
                }
            }
        }
    }
}

fn render_video(node: &TopicNode, config: &RenderConfig) -> Markup {
    let content = node.content.as_ref();
    let video_url = content.and_then(|c| c.video_url.as_deref());
    let poster = content.and_then(|c| c.thumbnail_url.as_deref());
    let subtitle = content.and_then(|c| c.subtitle_url.as_deref());
    let ext = video_url
        .and_then(|u| u.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .unwrap_or_default();

    html! {
        main.video-page {
            h1 { (display_title(node)) }
            @if let Some(src) = video_url {
                div.player {
                    video controls preload="metadata" poster=[poster] {
                        source src=(src) type=(mime_type(ext));
                        @if let Some(track) = subtitle {
                            track kind="subtitles" src=(track) srclang=(config.language) label=(config.language) default;
                        }
                    }
                }
            }
            @if !node.description.is_empty() {
                p.description { (node.description) }
            }
        }
    }
}

/// Entry page listing the root's surviving topics.
pub fn render_welcome(tree: &TopicTree, catalog: &Catalog, config: &RenderConfig) -> Markup {
    let root = tree.node(tree.root());
    let breadcrumb = html! { span.current { (config.title) } };

    let content = html! {
        (site_header(breadcrumb, catalog))
        main.welcome-page {
            h1 { (config.title) }
            @if !config.description.is_empty() {
                p.description { (config.description) }
            }
            ul.topic-list {
                @for &id in &root.children {
                    @let child = tree.node(id);
                    li {
                        a href=(child.url) { (display_title(child)) }
                        @if !child.is_topic() {
                            span.kind { (child.kind.as_str()) }
                        }
                    }
                }
            }
            p { a href=(root.url) { (display_title(root)) } }
        }
    };
    base_document(&config.title, &config.language, content)
}

pub fn render_about(markdown: &str, catalog: &Catalog, config: &RenderConfig) -> Markup {
    let parser = Parser::new(markdown);
    let mut body_html = String::new();
    md_html::push_html(&mut body_html, parser);

    let title = catalog.translate("About");
    let breadcrumb = html! {
        a href=(WELCOME_PAGE) { (config.title) }
        " › "
        span.current { (title) }
    };

    let content = html! {
        (site_header(breadcrumb, catalog))
        main.about-page {
            article.about-content {
                (PreEscaped(body_html))
            }
        }
    };
    base_document(&title, &config.language, content)
}
