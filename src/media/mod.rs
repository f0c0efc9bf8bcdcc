//! Video, thumbnail and subtitle handling through external tools.
//!
//! | Operation | Tool invocation |
//! |---|---|
//! | **Transcode** | two-pass `ffmpeg` libvpx/libvorbis encode to WebM |
//! | **Thumbnail** | `ffmpeg` single-frame PNG to stdout |
//! | **Subtitles** | `ffmpeg` SRT to WebVTT |
//!
//! The module is split into:
//! - **Paths**: pure source/output path calculations (unit testable)
//! - **Command**: subprocess runner with a timeout
//! - **Tools**: [`MediaTools`] trait + [`FfmpegTools`]
//! - **Operations**: high-level functions combining paths + tools + filesystem

pub(crate) mod command;
pub mod operations;
pub mod paths;
pub mod tools;

pub use operations::{
    LinkOutcome, convert_subtitles, link_or_copy, synthesize_thumbnail, transcode_to_webm,
};
pub use paths::{MediaPaths, MediaRoots, mime_type, output_path, source_format};
pub use tools::{FfmpegTools, MediaTools, ToolError, TranscodePass};
