//! Archive packaging with `zimwriterfs`.
//!
//! The packager is called once, after rendering, on the whole export
//! directory. A non-zero exit fails the export.

use crate::media::ToolError;
use crate::media::command;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

pub const PACKAGER: &str = "zimwriterfs";

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("zimwriterfs not found on PATH; install it or set `zimwriterfs` in the config")]
    NotFound,
    #[error("Invalid zimwriterfs path: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("Packaging failed: {0}")]
    Failed(#[from] ToolError),
}

/// Archive metadata and locations passed to the packager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOptions {
    /// Entry page, relative to `source_dir`.
    pub welcome: String,
    /// Favicon, relative to `source_dir`.
    pub favicon: String,
    /// Three-letter language code.
    pub language: String,
    pub title: String,
    pub description: String,
    pub long_description: String,
    pub creator: String,
    pub publisher: String,
    pub source_dir: PathBuf,
    pub zim_path: PathBuf,
}

/// Use the configured packager, or find it on `PATH`.
pub fn resolve_packager(configured: Option<&Path>) -> Result<PathBuf, PackageError> {
    match configured {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(PackageError::InvalidPath(path.to_path_buf())),
        None => env::var_os("PATH")
            .and_then(|paths| find_in_path(PACKAGER, &paths))
            .ok_or(PackageError::NotFound),
    }
}

/// First `name` found in a `PATH`-style list of directories.
pub fn find_in_path(name: &str, paths: &OsStr) -> Option<PathBuf> {
    env::split_paths(paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension(env::consts::EXE_EXTENSION);
        (!env::consts::EXE_EXTENSION.is_empty() && exe.is_file()).then_some(exe)
    })
}

/// Map a two-letter language code to the three-letter code archives carry.
///
/// Region suffixes (`pt-BR`, `pt_BR`) are dropped. Unknown codes pass through.
pub fn iso639_3(language: &str) -> String {
    let base = language
        .split(['-', '_'])
        .next()
        .unwrap_or(language)
        .to_ascii_lowercase();
    let code = match base.as_str() {
        "ar" => "ara",
        "bg" => "bul",
        "bn" => "ben",
        "da" => "dan",
        "de" => "deu",
        "el" => "ell",
        "en" => "eng",
        "es" => "spa",
        "fa" => "fas",
        "fr" => "fra",
        "he" => "heb",
        "hi" => "hin",
        "id" => "ind",
        "it" => "ita",
        "ja" => "jpn",
        "ko" => "kor",
        "nl" => "nld",
        "pl" => "pol",
        "pt" => "por",
        "ru" => "rus",
        "sw" => "swa",
        "ta" => "tam",
        "tr" => "tur",
        "uk" => "ukr",
        "ur" => "urd",
        "vi" => "vie",
        "xh" => "xho",
        "zh" => "zho",
        "zu" => "zul",
        _ => return language.to_string(),
    };
    code.to_string()
}

pub fn packager_args(options: &PackageOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        format!("--welcome={}", options.welcome).into(),
        format!("--favicon={}", options.favicon).into(),
        format!("--language={}", options.language).into(),
        format!("--title={}", options.title).into(),
        format!("--description={}", options.description).into(),
    ];
    if !options.long_description.is_empty() {
        args.push(format!("--longDescription={}", options.long_description).into());
    }
    args.push(format!("--creator={}", options.creator).into());
    args.push(format!("--publisher={}", options.publisher).into());
    args.push(options.source_dir.clone().into());
    args.push(options.zim_path.clone().into());
    args
}

/// Run the packager to completion.
pub fn package(binary: &Path, options: &PackageOptions, timeout: Duration) -> Result<(), PackageError> {
    if let Some(parent) = options.zim_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(ToolError::from)?;
    }
    let mut cmd = Command::new(binary);
    cmd.args(packager_args(options));
    tracing::info!("Packaging {} into {}", options.source_dir.display(), options.zim_path.display());
    command::run(cmd, PACKAGER, timeout)?.check(PACKAGER)?;
    Ok(())
}
