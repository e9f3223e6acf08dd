//! Baseline word lists (closed-class terms).
//!
//! A list is plain text with one word per line. Lines of the form
//! `lang:<code>` open a language section; words before the first header
//! belong to every language. Blank lines and `#` comments are ignored.

use std::collections::BTreeSet;
use std::path::Path;

use tdt_types::{LabelTable, VertexId};

use crate::error::GraphError;

const LANGUAGE_HEADER: &str = "lang:";

/// Baseline words of one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineList {
    language: String,
    words: Vec<String>,
}

/// Baseline words resolved against a label table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBaseline {
    /// Vertex ids of known baseline words
    pub ids: BTreeSet<VertexId>,
    /// Baseline words with no vertex
    pub unresolved: Vec<String>,
}

impl BaselineList {
    /// Parse the section for `language` out of list text.
    pub fn parse(text: &str, language: &str) -> Result<Self, GraphError> {
        let mut words = Vec::new();
        let mut section: Option<&str> = None;
        let mut saw_language = false;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(code) = line.strip_prefix(LANGUAGE_HEADER) {
                let code = code.trim();
                saw_language |= code == language;
                section = Some(code);
                continue;
            }
            if section.is_none() || section == Some(language) {
                words.push(line.to_string());
            }
        }

        if section.is_some() && !saw_language {
            return Err(GraphError::Baseline(format!(
                "language '{}' not present in baseline list",
                language
            )));
        }
        Ok(Self {
            language: language.to_string(),
            words,
        })
    }

    /// Load a list file.
    pub fn load(path: &Path, language: &str) -> Result<Self, GraphError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, language)
    }

    /// Language of the list.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Words of the list.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Resolve words through the label table without allocating ids.
    pub fn resolve(&self, labels: &LabelTable) -> ResolvedBaseline {
        let mut resolved = ResolvedBaseline::default();
        for word in &self.words {
            match labels.lookup(word) {
                Some(id) => {
                    resolved.ids.insert(id);
                }
                None => resolved.unresolved.push(word.clone()),
            }
        }
        resolved
    }
}
