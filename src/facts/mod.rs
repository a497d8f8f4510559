//! Fact store: per-path commit history handed over by a history collaborator.
//!
//! The core never diffs anything itself. A [`HistorySource`] delivers, for
//! each tracked path, the ordered list of commits that touched it together
//! with the full changeset of every commit.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::SrcTagError;

/// One historical change of a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub commit_id: String,
    pub message: String,
    /// Every path touched by the commit, the inspected one included.
    pub changeset: BTreeSet<String>,
}

impl Change {
    pub fn new<I, S>(commit_id: &str, message: &str, changeset: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commit_id: commit_id.to_string(),
            message: message.to_string(),
            changeset: changeset.into_iter().map(Into::into).collect(),
        }
    }
}

/// Path -> ordered change list. Built once per collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactStore {
    pub files: BTreeMap<String, Vec<Change>>,
}

impl FactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tracked path. Existing history is kept.
    pub fn insert_file(&mut self, path: &str) {
        self.files.entry(path.to_string()).or_default();
    }

    /// Append a change to `path`, registering the path if needed.
    /// The same commit is only recorded once per path.
    pub fn push_change(&mut self, path: &str, change: Change) {
        let history = self.files.entry(path.to_string()).or_default();
        if !history.iter().any(|c| c.commit_id == change.commit_id) {
            history.push(change);
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    #[must_use]
    pub fn history(&self, path: &str) -> &[Change] {
        self.files.get(path).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Save the fact store as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns `SrcTagError` if serialization or writing fails.
    pub fn save_json(&self, path: &std::path::Path) -> Result<(), SrcTagError> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load a fact store from a JSON file.
    ///
    /// # Errors
    /// Returns `SrcTagError` if reading fails or the JSON is invalid.
    pub fn load_json(path: &std::path::Path) -> Result<Self, SrcTagError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// History collaborator: lists tracked paths and walks their history.
pub trait HistorySource {
    /// All paths tracked by the repository.
    ///
    /// # Errors
    /// Returns `SrcTagError` when the backing store cannot be read.
    fn list_tracked_paths(&self) -> Result<BTreeSet<String>, SrcTagError>;

    /// Newest-first history of `path`, at most `max_depth` entries (`None` = unbounded),
    /// keeping only commits whose message matches `message_filter`.
    ///
    /// # Errors
    /// Returns `SrcTagError` when the backing store cannot be read.
    fn history_of(
        &self,
        path: &str,
        max_depth: Option<usize>,
        message_filter: Option<&Regex>,
    ) -> Result<Vec<Change>, SrcTagError>;

    /// Newest-first walk over all commits, at most `max_depth` of them.
    ///
    /// # Errors
    /// Returns `SrcTagError` when the backing store cannot be read.
    fn commits(&self, max_depth: Option<usize>) -> Result<Vec<Change>, SrcTagError>;
}

/// In-memory history: a tracked path set plus a newest-first commit list.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    pub tracked: BTreeSet<String>,
    pub commits: Vec<Change>,
}

impl MemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit as the newest one. Its changeset paths become tracked.
    pub fn commit<I, S>(&mut self, commit_id: &str, message: &str, changeset: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let change = Change::new(commit_id, message, changeset);
        self.tracked.extend(change.changeset.iter().cloned());
        self.commits.insert(0, change);
        self
    }

    pub fn track(&mut self, path: &str) -> &mut Self {
        self.tracked.insert(path.to_string());
        self
    }
}

impl HistorySource for MemoryHistory {
    fn list_tracked_paths(&self) -> Result<BTreeSet<String>, SrcTagError> {
        Ok(self.tracked.clone())
    }

    fn history_of(
        &self,
        path: &str,
        max_depth: Option<usize>,
        message_filter: Option<&Regex>,
    ) -> Result<Vec<Change>, SrcTagError> {
        let dir_prefix = format!("{}/", path.trim_end_matches('/'));
        let touches = |c: &Change| {
            c.changeset.iter().any(|p| p == path || path.is_empty() || p.starts_with(&dir_prefix))
        };
        Ok(self
            .commits
            .iter()
            .filter(|c| touches(c))
            .filter(|c| message_filter.map_or(true, |re| re.is_match(&c.message)))
            .take(max_depth.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn commits(&self, max_depth: Option<usize>) -> Result<Vec<Change>, SrcTagError> {
        Ok(self.commits.iter().take(max_depth.unwrap_or(usize::MAX)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_change_deduplicates_commits_per_path() {
        let mut facts = FactStore::new();
        let c = Change::new("c1", "msg", ["a.txt"]);
        facts.push_change("a.txt", c.clone());
        facts.push_change("a.txt", c);
        assert_eq!(facts.history("a.txt").len(), 1);
        assert!(facts.history("missing").is_empty());
    }

    #[test]
    fn memory_history_is_newest_first_and_filtered() {
        let mut h = MemoryHistory::new();
        h.commit("c1", "first #1", ["a.txt"]).commit("c2", "second", ["a.txt", "b.txt"]);
        let all = h.history_of("a.txt", None, None).unwrap();
        assert_eq!(all[0].commit_id, "c2");
        assert_eq!(all[1].commit_id, "c1");

        let re = Regex::new("#\\d+").unwrap();
        let filtered = h.history_of("a.txt", None, Some(&re)).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].commit_id, "c1");

        assert_eq!(h.history_of("a.txt", Some(1), None).unwrap().len(), 1);
        assert_eq!(h.list_tracked_paths().unwrap().len(), 2);
    }

    #[test]
    fn memory_history_matches_directories() {
        let mut h = MemoryHistory::new();
        h.commit("c1", "m", ["src/a.rs"]);
        assert_eq!(h.history_of("src", None, None).unwrap().len(), 1);
        assert!(h.history_of("sr", None, None).unwrap().is_empty());
    }
}
