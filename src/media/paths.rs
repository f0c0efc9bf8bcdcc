//! Pure path calculations for media artifacts.
//!
//! Sources live flat in the content root, named by the content's source
//! identifier. Outputs live under the node's `path`, named by node id:
//!
//! ```text
//! content_root/<stem>.mp4              out/<path>/<id>.mp4  (or .webm)
//! content_root/<stem>.png       ->     out/<path>/<id>.png
//! subtitles/<lang>/<stem>.srt          out/<path>/<id>.vtt
//! ```

use crate::tree::join_path;
use crate::types::Content;
use std::path::{Path, PathBuf};

pub const PRIMARY_FORMAT: &str = "mp4";
pub const TRANSCODED_FORMAT: &str = "webm";
pub const THUMBNAIL_EXT: &str = "png";
pub const SUBTITLE_SOURCE_EXT: &str = "srt";
pub const SUBTITLE_EXT: &str = "vtt";

/// Format of the source file for stored content.
///
/// A previous transcoding run rewrites the stored format to the derived one;
/// the source on disk is still in the primary format.
pub fn source_format(content: &Content) -> &str {
    match content.format.as_str() {
        "" | TRANSCODED_FORMAT => PRIMARY_FORMAT,
        other => other,
    }
}

/// Directories media is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRoots {
    pub content_root: PathBuf,
    pub subtitles_dir: PathBuf,
    pub language: String,
}

/// Resolved source and output locations for one video node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPaths {
    pub video_src: PathBuf,
    pub thumbnail_src: PathBuf,
    pub subtitle_src: PathBuf,
    /// Output paths relative to the export root; these become node URLs.
    pub video_rel: String,
    pub transcoded_rel: String,
    pub thumbnail_rel: String,
    pub subtitle_rel: String,
}

impl MediaPaths {
    pub fn resolve(roots: &MediaRoots, node_id: &str, node_path: &str, content: &Content) -> Self {
        let stem = content.source_stem(node_id);
        let format = source_format(content);
        let out = |ext: &str| join_path(node_path, &format!("{node_id}.{ext}"));

        Self {
            video_src: roots.content_root.join(format!("{stem}.{format}")),
            thumbnail_src: roots.content_root.join(format!("{stem}.{THUMBNAIL_EXT}")),
            subtitle_src: roots
                .subtitles_dir
                .join(&roots.language)
                .join(format!("{stem}.{SUBTITLE_SOURCE_EXT}")),
            video_rel: out(format),
            transcoded_rel: out(TRANSCODED_FORMAT),
            thumbnail_rel: out(THUMBNAIL_EXT),
            subtitle_rel: out(SUBTITLE_EXT),
        }
    }
}

/// Absolute location of a relative output path under `out_dir`.
pub fn output_path(out_dir: &Path, rel: &str) -> PathBuf {
    rel.split('/').fold(out_dir.to_path_buf(), |p, seg| p.join(seg))
}

/// Sibling a tool writes into before the result is renamed to `output`.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(".part");
    output.with_file_name(name)
}

/// Log-file prefix ffmpeg uses to carry stats from pass 1 to pass 2.
pub fn passlog_prefix(output: &Path) -> PathBuf {
    let mut name = output
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    name.push(".passlog");
    output.with_file_name(name)
}

pub fn mime_type(ext: &str) -> &'static str {
    match ext {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogv" => "video/ogg",
        "vtt" => "text/vtt",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> MediaRoots {
        MediaRoots {
            content_root: PathBuf::from("/content"),
            subtitles_dir: PathBuf::from("/subs"),
            language: "es".to_string(),
        }
    }

    fn mp4(youtube_id: Option<&str>) -> Content {
        Content {
            format: "mp4".into(),
            youtube_id: youtube_id.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn sources_use_youtube_id_outputs_use_node_id() {
        let paths = MediaPaths::resolve(&roots(), "intro", "khan/math", &mp4(Some("yt1")));

        assert_eq!(paths.video_src, PathBuf::from("/content/yt1.mp4"));
        assert_eq!(paths.thumbnail_src, PathBuf::from("/content/yt1.png"));
        assert_eq!(paths.subtitle_src, PathBuf::from("/subs/es/yt1.srt"));
        assert_eq!(paths.video_rel, "khan/math/intro.mp4");
        assert_eq!(paths.transcoded_rel, "khan/math/intro.webm");
        assert_eq!(paths.thumbnail_rel, "khan/math/intro.png");
        assert_eq!(paths.subtitle_rel, "khan/math/intro.vtt");
    }

    #[test]
    fn node_id_is_stem_without_youtube_id() {
        let paths = MediaPaths::resolve(&roots(), "b", "a", &mp4(None));
        assert_eq!(paths.video_src, PathBuf::from("/content/b.mp4"));
        assert_eq!(paths.video_rel, "a/b.mp4");
    }

    #[test]
    fn transcoded_format_normalizes_to_primary() {
        let content = Content {
            format: "webm".into(),
            ..Default::default()
        };
        assert_eq!(source_format(&content), "mp4");

        let paths = MediaPaths::resolve(&roots(), "b", "a", &content);
        assert_eq!(paths.video_src, PathBuf::from("/content/b.mp4"));
    }

    #[test]
    fn empty_format_is_primary() {
        assert_eq!(source_format(&Content::default()), "mp4");
    }

    #[test]
    fn other_formats_are_kept() {
        let content = Content {
            format: "ogv".into(),
            ..Default::default()
        };
        assert_eq!(source_format(&content), "ogv");
    }

    #[test]
    fn output_path_splits_segments() {
        assert_eq!(
            output_path(Path::new("/out"), "a/b/c.mp4"),
            Path::new("/out").join("a").join("b").join("c.mp4")
        );
    }

    #[test]
    fn passlog_sits_next_to_output() {
        assert_eq!(
            passlog_prefix(Path::new("/out/a/b.webm")),
            PathBuf::from("/out/a/b.passlog")
        );
    }

    #[test]
    fn partial_keeps_full_name() {
        assert_eq!(
            partial_path(Path::new("/out/a/b.webm")),
            PathBuf::from("/out/a/b.webm.part")
        );
        assert_eq!(
            passlog_prefix(&partial_path(Path::new("/out/a/b.webm"))),
            PathBuf::from("/out/a/b.webm.passlog")
        );
    }

    #[test]
    fn mime_types() {
        assert_eq!(mime_type("webm"), "video/webm");
        assert_eq!(mime_type("vtt"), "text/vtt");
        assert_eq!(mime_type("xyz"), "application/octet-stream");
    }
}
