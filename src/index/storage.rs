//! Turns collected facts into index documents.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{Document, DocumentKind, DocumentMeta, MemoryIndex};
use crate::errors::SrcTagError;
use crate::facts::FactStore;
use crate::graph::RelationGraph;

fn default_data_types() -> BTreeSet<DocumentKind> {
    BTreeSet::from([DocumentKind::CommitMsg, DocumentKind::Issue])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the index is persisted; in-memory only when unset.
    pub db_path: Option<PathBuf>,
    /// `"#11"` -> issue title, avoiding a tracker round trip per issue.
    pub issue_mapping: BTreeMap<String, String>,
    pub data_types: BTreeSet<DocumentKind>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: None, issue_mapping: BTreeMap::new(), data_types: default_data_types() }
    }
}

#[derive(Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
}

impl StorageConfig {
    /// Merge a GitHub issue dump (`gh issue list --json number,title`) into the mapping.
    /// Returns how many issues were read.
    ///
    /// # Errors
    /// Returns `SrcTagError` if the file cannot be read or is not a list of issues.
    pub fn load_issue_mapping_from_gh_json(&mut self, path: &Path) -> Result<usize, SrcTagError> {
        let data = std::fs::read_to_string(path)?;
        let issues: Vec<GhIssue> = serde_json::from_str(&data)?;
        for issue in &issues {
            self.issue_mapping.insert(format!("#{}", issue.number), issue.title.clone());
        }
        log::info!("loaded {} issues from {}", issues.len(), path.display());
        Ok(issues.len())
    }
}

/// What an embedding pass added and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbedReport {
    pub commit_docs: usize,
    pub issue_docs: usize,
    /// Files without any recorded history.
    pub skipped_files: Vec<String>,
    /// Issues referenced in history but with no known title.
    pub untitled_issues: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Storage {
    pub config: StorageConfig,
}

impl Storage {
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Load the persisted index when `db_path` points to one, otherwise start empty.
    ///
    /// # Errors
    /// Returns `SrcTagError` if an existing index file cannot be read.
    pub fn open_index(&self) -> Result<MemoryIndex, SrcTagError> {
        match &self.config.db_path {
            Some(p) if p.exists() => MemoryIndex::load_json(p),
            _ => Ok(MemoryIndex::new()),
        }
    }

    /// Persist `index` to `db_path` when configured.
    ///
    /// # Errors
    /// Returns `SrcTagError` if writing fails.
    pub fn persist_index(&self, index: &MemoryIndex) -> Result<(), SrcTagError> {
        if let Some(p) = &self.config.db_path {
            index.save_json(p)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn issue_title(&self, issue_id: &str) -> Option<&str> {
        self.config.issue_mapping.get(issue_id).map(String::as_str).filter(|t| !t.is_empty())
    }

    /// Add commit-message and issue documents for the configured data types.
    pub fn embed(&self, facts: &FactStore, graph: &RelationGraph, index: &mut MemoryIndex) -> EmbedReport {
        let mut report = EmbedReport::default();
        log::info!("start embedding {} source files", facts.len());

        if self.config.data_types.contains(&DocumentKind::CommitMsg) {
            for (path, history) in &facts.files {
                if history.is_empty() {
                    log::warn!("no related commits found: {path}");
                    report.skipped_files.push(path.clone());
                    continue;
                }
                for change in history {
                    index.upsert(Document {
                        id: format!("{}|{}|{}", DocumentKind::CommitMsg, path, change.commit_id),
                        text: change.message.clone(),
                        meta: DocumentMeta::commit_msg(path, &change.commit_id),
                    });
                    report.commit_docs += 1;
                }
            }
        }

        if self.config.data_types.contains(&DocumentKind::Issue) {
            for issue_id in graph.issues() {
                let Some(title) = self.issue_title(issue_id) else {
                    log::debug!("no title known for issue {issue_id}");
                    report.untitled_issues.push(issue_id.to_string());
                    continue;
                };
                index.upsert(Document {
                    id: format!("{}|{}", DocumentKind::Issue, issue_id),
                    text: title.to_string(),
                    meta: DocumentMeta::issue(issue_id),
                });
                report.issue_docs += 1;
            }
        }

        log::info!(
            "embedding finished: {} commit docs, {} issue docs",
            report.commit_docs,
            report.issue_docs
        );
        report
    }
}
