//! Content-cache collaborator.
//!
//! Supplies the three inputs of an export: the serialized topic tree, the
//! content-metadata map and the exercise-metadata map, both keyed by node id.
//!
//! ## Layouts
//!
//! ```text
//! live data_dir/                 fixture dir/
//! ├── topics.json                ├── test_topics.json
//! └── <language>/                ├── test_content.json
//!     ├── content.json           └── test_exercise.json
//!     └── exercises.json
//! ```
//!
//! The fixture files under `data/` are also compiled in as
//! [`ContentSource::Bundled`], so `--test` needs nothing on disk.
//!
//! Missing metadata maps are not fatal: the export proceeds with an empty map
//! and the annotate pass logs every node it cannot find.

use crate::tree::{TopicTree, TreeError};
use crate::types::Content;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUNDLED_TOPICS: &str = include_str!("../data/test_topics.json");
const BUNDLED_CONTENT: &str = include_str!("../data/test_content.json");
const BUNDLED_EXERCISES: &str = include_str!("../data/test_exercise.json");

pub type ContentCache = HashMap<String, Content>;
pub type ExerciseCache = HashMap<String, Value>;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Topic tree not found: {}", .0.display())]
    TreeNotFound(PathBuf),
    #[error("Failed to load topic tree {}: {source}", .path.display())]
    Tree {
        path: PathBuf,
        #[source]
        source: TreeError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid metadata file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the topic data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// The platform's own data directory.
    Live { data_dir: PathBuf },
    /// A fixture directory in the bundled layout.
    Fixture { dir: PathBuf },
    /// The fixtures compiled into the binary.
    Bundled,
}

/// Everything an export needs from the content platform.
#[derive(Debug)]
pub struct SourceData {
    pub tree: TopicTree,
    pub content: ContentCache,
    pub exercises: ExerciseCache,
}

impl ContentSource {
    /// On-disk topic tree, `None` for the compiled-in fixtures.
    pub fn tree_path(&self) -> Option<PathBuf> {
        match self {
            ContentSource::Live { data_dir } => Some(data_dir.join("topics.json")),
            ContentSource::Fixture { dir } => Some(dir.join("test_topics.json")),
            ContentSource::Bundled => None,
        }
    }

    pub fn content_path(&self, language: &str) -> Option<PathBuf> {
        match self {
            ContentSource::Live { data_dir } => Some(data_dir.join(language).join("content.json")),
            ContentSource::Fixture { dir } => Some(dir.join("test_content.json")),
            ContentSource::Bundled => None,
        }
    }

    pub fn exercise_path(&self, language: &str) -> Option<PathBuf> {
        match self {
            ContentSource::Live { data_dir } => Some(data_dir.join(language).join("exercises.json")),
            ContentSource::Fixture { dir } => Some(dir.join("test_exercise.json")),
            ContentSource::Bundled => None,
        }
    }

    pub fn load(&self, language: &str) -> Result<SourceData, SourceError> {
        let (Some(tree_path), Some(content_path), Some(exercise_path)) = (
            self.tree_path(),
            self.content_path(language),
            self.exercise_path(language),
        ) else {
            return load_bundled();
        };

        if !tree_path.exists() {
            return Err(SourceError::TreeNotFound(tree_path));
        }
        let tree = TopicTree::load(&tree_path).map_err(|source| SourceError::Tree {
            path: tree_path.clone(),
            source,
        })?;
        tracing::debug!("Loaded {} nodes from {}", tree.len(), tree_path.display());

        let content: ContentCache = load_map(&content_path)?;
        let exercises: ExerciseCache = load_map(&exercise_path)?;
        tracing::info!(
            "Metadata for language {}: {} content entries, {} exercises",
            language,
            content.len(),
            exercises.len()
        );

        Ok(SourceData {
            tree,
            content,
            exercises,
        })
    }
}

fn load_bundled() -> Result<SourceData, SourceError> {
    let tree = TopicTree::from_json(BUNDLED_TOPICS).map_err(|source| SourceError::Tree {
        path: PathBuf::from("test_topics.json"),
        source,
    })?;
    tracing::debug!("Loaded {} nodes from the built-in fixtures", tree.len());
    Ok(SourceData {
        tree,
        content: parse_map(BUNDLED_CONTENT, Path::new("test_content.json"))?,
        exercises: parse_map(BUNDLED_EXERCISES, Path::new("test_exercise.json"))?,
    })
}

fn load_map<T: DeserializeOwned>(path: &Path) -> Result<HashMap<String, T>, SourceError> {
    if !path.exists() {
        tracing::warn!("Metadata file missing, using empty map: {}", path.display());
        return Ok(HashMap::new());
    }
    let json = fs::read_to_string(path)?;
    parse_map(&json, path)
}

fn parse_map<T: DeserializeOwned>(json: &str, path: &Path) -> Result<HashMap<String, T>, SourceError> {
    serde_json::from_str(json).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_live(dir: &Path) {
        fs::write(
            dir.join("topics.json"),
            r#"{"id": "root", "kind": "Topic", "children": [{"id": "v1", "kind": "Video"}]}"#,
        )
        .unwrap();
        fs::create_dir_all(dir.join("en")).unwrap();
        fs::write(
            dir.join("en/content.json"),
            r#"{"v1": {"format": "mp4", "youtube_id": "v1"}}"#,
        )
        .unwrap();
    }

    #[test]
    fn live_source_reads_language_maps() {
        let tmp = TempDir::new().unwrap();
        write_live(tmp.path());

        let source = ContentSource::Live {
            data_dir: tmp.path().to_path_buf(),
        };
        let data = source.load("en").unwrap();

        assert_eq!(data.tree.len(), 2);
        assert_eq!(data.content["v1"].format, "mp4");
        assert!(data.exercises.is_empty());
    }

    #[test]
    fn missing_tree_is_error() {
        let tmp = TempDir::new().unwrap();
        let source = ContentSource::Live {
            data_dir: tmp.path().to_path_buf(),
        };
        assert!(matches!(source.load("en"), Err(SourceError::TreeNotFound(_))));
    }

    #[test]
    fn malformed_content_map_is_error() {
        let tmp = TempDir::new().unwrap();
        write_live(tmp.path());
        fs::write(tmp.path().join("en/content.json"), "[1, 2").unwrap();

        let source = ContentSource::Live {
            data_dir: tmp.path().to_path_buf(),
        };
        assert!(matches!(source.load("en"), Err(SourceError::Json { .. })));
    }

    #[test]
    fn fixture_paths_ignore_language() {
        let source = ContentSource::Fixture {
            dir: PathBuf::from("data"),
        };
        assert_eq!(
            source.content_path("es"),
            Some(PathBuf::from("data/test_content.json"))
        );
        assert_eq!(source.tree_path(), Some(PathBuf::from("data/test_topics.json")));
    }

    #[test]
    fn fixture_dir_loads() {
        let source = ContentSource::Fixture {
            dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("data"),
        };
        let data = source.load("en").unwrap();

        assert!(data.tree.len() > 1);
        assert!(!data.content.is_empty());
        assert!(!data.exercises.is_empty());
    }

    #[test]
    fn built_in_fixtures_need_no_files() {
        let source = ContentSource::Bundled;
        assert_eq!(source.tree_path(), None);

        let bundled = source.load("es").unwrap();
        let on_disk = ContentSource::Fixture {
            dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("data"),
        }
        .load("es")
        .unwrap();

        assert_eq!(bundled.tree.len(), on_disk.tree.len());
        let mut keys: Vec<_> = bundled.content.keys().collect();
        let mut disk_keys: Vec<_> = on_disk.content.keys().collect();
        keys.sort();
        disk_keys.sort();
        assert_eq!(keys, disk_keys);
        assert_eq!(bundled.exercises.len(), on_disk.exercises.len());
    }
}
