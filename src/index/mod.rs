//! Nearest-neighbor document index.
//!
//! The scoring pipeline only sees the [`NeighborIndex`] trait. [`MemoryIndex`]
//! is a small lexical implementation (cosine distance over term frequencies)
//! that keeps the whole tool usable without an embedding service.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::errors::{ConfigError, SrcTagError};

pub mod storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    CommitMsg,
    Issue,
}

impl DocumentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::CommitMsg => "commit_msg",
            DocumentKind::Issue => "issue",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "commit_msg" => Ok(DocumentKind::CommitMsg),
            "issue" => Ok(DocumentKind::Issue),
            other => Err(ConfigError::UnknownDataType(other.to_string())),
        }
    }
}

/// Parse data type selectors such as `["commit_msg", "issue"]`.
///
/// # Errors
/// Returns `ConfigError::UnknownDataType` on the first unknown selector.
pub fn parse_data_types<I, S>(items: I) -> Result<BTreeSet<DocumentKind>, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().parse()).collect()
}

/// Metadata carried back with every hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub kind: DocumentKind,
    /// Originating path for commit-message documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
}

impl DocumentMeta {
    #[must_use]
    pub fn commit_msg(source: &str, commit_id: &str) -> Self {
        Self {
            kind: DocumentKind::CommitMsg,
            source: Some(source.to_string()),
            commit_id: Some(commit_id.to_string()),
            issue_id: None,
        }
    }

    #[must_use]
    pub fn issue(issue_id: &str) -> Self {
        Self { kind: DocumentKind::Issue, source: None, commit_id: None, issue_id: Some(issue_id.to_string()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub meta: DocumentMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub meta: DocumentMeta,
    pub distance: f64,
}

/// Nearest-neighbor collaborator.
pub trait NeighborIndex: Sync {
    /// Number of indexed documents, all kinds included.
    fn count(&self) -> usize;

    /// At most `limit` documents closest to `text`, nearest first,
    /// restricted to `kind` when given.
    ///
    /// # Errors
    /// Implementations report backend failures as `SrcTagError::Index`.
    fn query(&self, text: &str, limit: usize, kind: Option<DocumentKind>) -> Result<Vec<Hit>, SrcTagError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryIndex {
    docs: BTreeMap<String, Document>,
    #[serde(skip, default)]
    vectors: HashMap<String, TermVector>,
}

#[derive(Debug, Clone, Default)]
struct TermVector {
    tf: HashMap<String, f64>,
    norm: f64,
}

impl TermVector {
    fn from_text(text: &str) -> Self {
        let mut tf: HashMap<String, f64> = HashMap::new();
        for tok in tokenize(text) {
            *tf.entry(tok).or_insert(0.0) += 1.0;
        }
        let norm = tf.values().map(|v| v * v).sum::<f64>().sqrt();
        Self { tf, norm }
    }

    // 1 - cosine similarity; empty vectors are maximally distant.
    fn distance(&self, other: &TermVector) -> f64 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 1.0;
        }
        let (small, large) = if self.tf.len() <= other.tf.len() { (self, other) } else { (other, self) };
        let dot: f64 = small.tf.iter().filter_map(|(t, v)| large.tf.get(t).map(|w| v * w)).sum();
        (1.0 - dot / (self.norm * other.norm)).clamp(0.0, 1.0)
    }
}

/// Lowercased alphanumeric tokens.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document by id.
    pub fn upsert(&mut self, doc: Document) {
        self.vectors.insert(doc.id.clone(), TermVector::from_text(&doc.text));
        self.docs.insert(doc.id.clone(), doc);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.docs.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Save all documents as JSON; vectors are rebuilt on load.
    ///
    /// # Errors
    /// Returns `SrcTagError` if serialization or writing fails.
    pub fn save_json(&self, path: &std::path::Path) -> Result<(), SrcTagError> {
        let data = serde_json::to_string(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load an index saved with [`MemoryIndex::save_json`].
    ///
    /// # Errors
    /// Returns `SrcTagError` if reading fails or the JSON is invalid.
    pub fn load_json(path: &std::path::Path) -> Result<Self, SrcTagError> {
        let data = std::fs::read_to_string(path)?;
        let mut index: MemoryIndex = serde_json::from_str(&data)?;
        index.vectors =
            index.docs.iter().map(|(id, d)| (id.clone(), TermVector::from_text(&d.text))).collect();
        Ok(index)
    }
}

impl NeighborIndex for MemoryIndex {
    fn count(&self) -> usize {
        self.docs.len()
    }

    fn query(&self, text: &str, limit: usize, kind: Option<DocumentKind>) -> Result<Vec<Hit>, SrcTagError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let q = TermVector::from_text(text);
        let mut scored: Vec<(f64, &Document)> = self
            .docs
            .values()
            .filter(|d| kind.map_or(true, |k| d.meta.kind == k))
            .map(|d| {
                let dist = self.vectors.get(&d.id).map_or(1.0, |v| q.distance(v));
                (dist, d)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(distance, d)| Hit { meta: d.meta.clone(), distance }).collect())
    }
}
