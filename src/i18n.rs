//! Language-scoped translation lookup.
//!
//! A catalog is a flat JSON object mapping source strings to translations,
//! stored as `<locale_dir>/<language>.json`. Lookups follow gettext rules:
//! an untranslated string comes back unchanged, and the empty string is
//! never looked up.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum I18nError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid catalog {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    language: String,
    messages: HashMap<String, String>,
}

impl Catalog {
    /// Catalog with no translations (identity lookup).
    pub fn empty(language: &str) -> Self {
        Self {
            language: language.to_string(),
            messages: HashMap::new(),
        }
    }

    pub fn from_messages(language: &str, messages: HashMap<String, String>) -> Self {
        Self {
            language: language.to_string(),
            messages,
        }
    }

    /// Load `<dir>/<language>.json`. A missing file yields an empty catalog.
    pub fn load(dir: &Path, language: &str) -> Result<Self, I18nError> {
        let path = dir.join(format!("{language}.json"));
        if !path.exists() {
            tracing::debug!("No catalog at {}, titles stay untranslated", path.display());
            return Ok(Self::empty(language));
        }
        let content = fs::read_to_string(&path)?;
        let messages = serde_json::from_str(&content).map_err(|source| I18nError::Json {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_messages(language, messages))
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn translate(&self, msgid: &str) -> String {
        if msgid.is_empty() {
            return String::new();
        }
        self.messages
            .get(msgid)
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| msgid.to_string())
    }
}
