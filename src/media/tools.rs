//! External media tool trait and the ffmpeg implementation.
//!
//! The [`MediaTools`] trait defines the three operations the exporter shells
//! out for: one pass of a two-pass WebM encode, still-frame extraction, and
//! subtitle conversion. [`FfmpegTools`] runs them through a single `ffmpeg`
//! binary; tests substitute a recording mock.

use super::command::{self, CommandOutput};
use super::paths::passlog_prefix;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tool not found: {0}")]
    NotFound(String),
    #[error("{tool} exited with status {code:?}: {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
    #[error("Unusable tool output: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodePass {
    /// Analysis pass: video only, output discarded.
    First,
    /// Final pass: video and audio written to the output file.
    Second,
}

pub trait MediaTools {
    /// Run one pass of a two-pass WebM encode of `source` into `output`.
    fn transcode_pass(
        &self,
        pass: TranscodePass,
        source: &Path,
        output: &Path,
    ) -> Result<(), ToolError>;

    /// Encode one still frame of `video` as PNG and return the bytes.
    fn extract_still(&self, video: &Path) -> Result<Vec<u8>, ToolError>;

    /// Convert a subtitle file into the format implied by `output`'s extension.
    fn convert_subtitle(&self, source: &Path, output: &Path) -> Result<(), ToolError>;
}

const TOOL_NAME: &str = "ffmpeg";

/// Offset into the video the thumbnail still is taken from.
const STILL_OFFSET: &str = "5";

#[derive(Debug, Clone)]
pub struct FfmpegTools {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegTools {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn run(&self, args: Vec<OsString>) -> Result<CommandOutput, ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"]);
        cmd.args(args);
        command::run(cmd, TOOL_NAME, self.timeout)?.check(TOOL_NAME)
    }
}

impl MediaTools for FfmpegTools {
    fn transcode_pass(
        &self,
        pass: TranscodePass,
        source: &Path,
        output: &Path,
    ) -> Result<(), ToolError> {
        self.run(transcode_args(pass, source, output)).map(|_| ())
    }

    fn extract_still(&self, video: &Path) -> Result<Vec<u8>, ToolError> {
        self.run(still_args(video)).map(|out| out.stdout)
    }

    fn convert_subtitle(&self, source: &Path, output: &Path) -> Result<(), ToolError> {
        self.run(subtitle_args(source, output)).map(|_| ())
    }
}

fn null_sink() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}

/// Arguments for one pass of the libvpx/libvorbis WebM encode.
pub fn transcode_args(pass: TranscodePass, source: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-i".into(),
        source.into(),
        "-c:v".into(),
        "libvpx".into(),
        "-b:v".into(),
        "500k".into(),
        "-qmin".into(),
        "10".into(),
        "-qmax".into(),
        "42".into(),
        "-passlogfile".into(),
        passlog_prefix(output).into(),
    ];
    match pass {
        TranscodePass::First => {
            args.extend(["-pass", "1", "-an", "-f", "webm", null_sink()].map(OsString::from));
        }
        TranscodePass::Second => {
            args.extend(
                ["-pass", "2", "-c:a", "libvorbis", "-b:a", "128k", "-f", "webm"]
                    .map(OsString::from),
            );
            args.push(output.into());
        }
    }
    args
}

pub fn still_args(video: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-ss".into(), STILL_OFFSET.into(), "-i".into()];
    args.push(video.into());
    args.extend(["-frames:v", "1", "-f", "image2pipe", "-c:v", "png", "-"].map(OsString::from));
    args
}

pub fn subtitle_args(source: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        source.into(),
        "-f".into(),
        "webvtt".into(),
        output.into(),
    ]
}
