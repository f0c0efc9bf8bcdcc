//! High-level media operations.
//!
//! These combine path calculations with tool execution and the filesystem
//! work around it: output directories, intermediate files and existence
//! checks.
//!
//! Tools write into a `.part` sibling of the output, renamed into place only
//! after the tool succeeds. An output that exists is therefore complete,
//! which is what lets later runs reuse it.

use super::paths::{partial_path, passlog_prefix};
use super::tools::{MediaTools, ToolError, TranscodePass};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, ToolError>;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// How a file reached its output location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    /// Source and destination are on different filesystems.
    Copied,
    AlreadyPresent,
}

/// Hard-link `src` to `dest`, creating parent directories.
///
/// An existing `dest` is left untouched. Falls back to a copy only when the
/// two paths are on different devices.
pub fn link_or_copy(src: &Path, dest: &Path) -> io::Result<LinkOutcome> {
    if dest.exists() {
        return Ok(LinkOutcome::AlreadyPresent);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::hard_link(src, dest) {
        Ok(()) => Ok(LinkOutcome::Linked),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(src, dest)?;
            Ok(LinkOutcome::Copied)
        }
        Err(e) => Err(e),
    }
}

/// Two-pass WebM encode of `source` into `output`.
///
/// Pass-log files and the partial encode are removed whether or not the
/// encode succeeds.
pub fn transcode_to_webm(tools: &impl MediaTools, source: &Path, output: &Path) -> Result<()> {
    let partial = begin_partial(output)?;

    let result = tools
        .transcode_pass(TranscodePass::First, source, &partial)
        .and_then(|()| tools.transcode_pass(TranscodePass::Second, source, &partial));
    remove_passlogs(&partial);

    finish_partial(result, &partial, output, "transcode")
}

/// Create `output`'s directory and clear any partial left by an earlier run.
fn begin_partial(output: &Path) -> Result<PathBuf> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(output);
    if partial.exists() {
        fs::remove_file(&partial)?;
    }
    Ok(partial)
}

/// Rename `partial` to `output` if the tool succeeded, otherwise delete it.
fn finish_partial(result: Result<()>, partial: &Path, output: &Path, what: &str) -> Result<()> {
    if let Err(e) = result {
        let _ = fs::remove_file(partial);
        return Err(e);
    }
    if !partial.exists() {
        return Err(ToolError::InvalidOutput(format!(
            "{what} produced no file at {}",
            output.display()
        )));
    }
    fs::rename(partial, output)?;
    Ok(())
}

fn remove_passlogs(output: &Path) {
    let prefix = passlog_prefix(output);
    let (Some(dir), Some(name)) = (prefix.parent(), prefix.file_name()) else {
        return;
    };
    let name = name.to_string_lossy();
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(name.as_ref()) {
            let _ = fs::remove_file(entry.path());
        }
    }
}

/// Extract a still from `video` and store it as the thumbnail at `dest`.
pub fn synthesize_thumbnail(tools: &impl MediaTools, video: &Path, dest: &Path) -> Result<()> {
    let bytes = tools.extract_still(video)?;
    if !bytes.starts_with(PNG_SIGNATURE) {
        return Err(ToolError::InvalidOutput(format!(
            "still from {} is not a PNG ({} bytes)",
            video.display(),
            bytes.len()
        )));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, bytes)?;
    Ok(())
}

/// Convert a subtitle file to WebVTT at `output`.
pub fn convert_subtitles(tools: &impl MediaTools, source: &Path, output: &Path) -> Result<()> {
    let partial = begin_partial(output)?;
    let result = tools.convert_subtitle(source, &partial);
    finish_partial(result, &partial, output, "subtitle conversion")
}
