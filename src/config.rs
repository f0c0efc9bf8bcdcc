//! Export configuration.
//!
//! Handles loading, validating, and merging the export config file. Values
//! are layered: stock defaults, then an optional TOML file, then command-line
//! flags (applied by the caller on the resolved [`ExportConfig`]).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! language = "en"             # Language of titles, subtitles and metadata
//! # tmp_dir = "/tmp/export"   # Export directory (default: <temp>/topic-zim_<language>)
//! clear = false               # Empty a non-empty export directory first
//! download = false            # Fetch videos missing from the content root
//! transcode_webm = false      # Re-encode videos to WebM instead of linking
//! # zimwriterfs = "/usr/bin/zimwriterfs"  # Default: search PATH
//! publisher = "Learning Equality"
//! creator = "Khan Academy"
//! title = "Khan Academy"
//! description = "Videos from Khan Academy"
//! long_description = ""
//!
//! [content]
//! root = "content"            # Source videos and thumbnails
//! data_dir = "data"           # topics.json and <language>/ metadata
//! # fixture_dir = "data"      # Test data used with --test (default: built in)
//! subtitles_dir = "subtitles" # <subtitles_dir>/<language>/<id>.srt
//! locale_dir = "locale"       # <locale_dir>/<language>.json
//! # assets_dir = "assets"     # Extra files copied into static/
//!
//! [remote]
//! host = "learningequality.org"
//! attempts = 5
//! retry_delay_secs = 2
//! read_timeout_secs = 30
//!
//! [tools]
//! ffmpeg = "ffmpeg"
//! timeout_secs = 3600
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::fetch::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "topic-zim.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Cannot serialize defaults: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Export configuration.
///
/// All fields have defaults. A config file needs only the values it wants to
/// override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub language: String,
    /// Directory the archive tree is assembled in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmp_dir: Option<PathBuf>,
    pub clear: bool,
    pub download: bool,
    pub transcode_webm: bool,
    /// Packager binary; searched on `PATH` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zimwriterfs: Option<PathBuf>,
    pub publisher: String,
    pub creator: String,
    pub title: String,
    pub description: String,
    pub long_description: String,
    pub content: ContentConfig,
    pub remote: RemoteConfig,
    pub tools: ToolsConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            tmp_dir: None,
            clear: false,
            download: false,
            transcode_webm: false,
            zimwriterfs: None,
            publisher: "Learning Equality".to_string(),
            creator: "Khan Academy".to_string(),
            title: "Khan Academy".to_string(),
            description: "Videos from Khan Academy".to_string(),
            long_description: String::new(),
            content: ContentConfig::default(),
            remote: RemoteConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl ExportConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.language.trim().is_empty() {
            return Err(ConfigError::Validation("language must not be empty".into()));
        }
        if self.remote.attempts == 0 {
            return Err(ConfigError::Validation(
                "remote.attempts must be at least 1".into(),
            ));
        }
        if self.remote.host.trim().is_empty() {
            return Err(ConfigError::Validation("remote.host must not be empty".into()));
        }
        if self.remote.read_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "remote.read_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "tools.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Export directory: the configured one, or `<temp>/topic-zim_<language>`.
    /// Always absolute.
    pub fn export_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = match &self.tmp_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join(format!("topic-zim_{}", self.language)),
        };
        Ok(std::path::absolute(dir)?)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.remote.attempts,
            delay: Duration::from_secs(self.remote.retry_delay_secs),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.read_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.timeout_secs)
    }
}

/// Where source data and media live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    /// Source videos and thumbnails, named `<source id>.<ext>`.
    pub root: PathBuf,
    /// Live topic tree and per-language metadata.
    pub data_dir: PathBuf,
    /// Test data for `--test`; the copy compiled into the binary when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_dir: Option<PathBuf>,
    pub subtitles_dir: PathBuf,
    pub locale_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_dir: Option<PathBuf>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("content"),
            data_dir: PathBuf::from("data"),
            fixture_dir: None,
            subtitles_dir: PathBuf::from("subtitles"),
            locale_dir: PathBuf::from("locale"),
            assets_dir: None,
        }
    }
}

/// Remote host missing videos are fetched from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub host: String,
    /// Total download attempts per video.
    pub attempts: u32,
    pub retry_delay_secs: u64,
    /// Longest wait for a single read before the transfer counts as stalled.
    pub read_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            host: "learningequality.org".to_string(),
            attempts: policy.attempts,
            retry_delay_secs: policy.delay.as_secs(),
            read_timeout_secs: 30,
        }
    }
}

/// External media tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub ffmpeg: PathBuf,
    /// Upper bound for any single tool invocation.
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            timeout_secs: 3600,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ExportConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ExportConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ExportConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the export config.
///
/// An explicitly requested file must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<ExportConfig, ConfigError> {
    let overlay = match path {
        Some(path) => Some(
            load_raw_config(path)?.ok_or_else(|| ConfigError::NotFound(path.to_path_buf()))?,
        ),
        None => load_raw_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# topic-zim configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# Language of titles, descriptions, subtitles and archive metadata.
language = "en"

# Directory the archive tree is assembled in.
# Default: <system temp dir>/topic-zim_<language>
# tmp_dir = "/var/tmp/topic-zim"

# Remove a non-empty export directory instead of refusing to run.
clear = false

# Fetch videos missing from the content root from the remote host.
download = false

# Re-encode every video to WebM (two-pass VP8/Vorbis) instead of linking it.
transcode_webm = false

# Path to the zimwriterfs binary. Default: search PATH.
# zimwriterfs = "/usr/local/bin/zimwriterfs"

# Archive metadata.
publisher = "Learning Equality"
creator = "Khan Academy"
title = "Khan Academy"
description = "Videos from Khan Academy"
long_description = ""

# ---------------------------------------------------------------------------
# Source data
# ---------------------------------------------------------------------------
[content]
# Source videos and thumbnails, named <source id>.mp4 / <source id>.png.
root = "content"

# topics.json plus <language>/content.json and <language>/exercises.json.
data_dir = "data"

# Test data used with --test. Default: the copy compiled into the binary.
# fixture_dir = "data"

# Subtitles, as <subtitles_dir>/<language>/<source id>.srt.
subtitles_dir = "subtitles"

# Translation catalogs, as <locale_dir>/<language>.json.
locale_dir = "locale"

# Extra files copied into the archive's static/ directory.
# assets_dir = "assets"

# ---------------------------------------------------------------------------
# Remote host for --download
# ---------------------------------------------------------------------------
[remote]
host = "learningequality.org"

# Download attempts per video, and the pause between them.
attempts = 5
retry_delay_secs = 2

# A download that sends nothing for this long is abandoned and retried.
read_timeout_secs = 30

# ---------------------------------------------------------------------------
# External tools
# ---------------------------------------------------------------------------
[tools]
ffmpeg = "ffmpeg"

# Any single tool run longer than this is killed.
timeout_secs = 3600
"##
}
