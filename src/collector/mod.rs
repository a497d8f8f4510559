//! Collection pass: decide which paths are in scope, gather their history
//! from a [`HistorySource`] and build the relation graph.
//!
//! [`GitHistory`] is the `git2` backed source used by the CLI.
use git2::{Commit, Diff, DiffOptions, ErrorCode, Oid, Repository};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::errors::{ConfigError, SrcTagError};
use crate::facts::{Change, FactStore, HistorySource};
use crate::graph::{RelationGraph, RelationGraphBuilder, DEFAULT_ISSUE_REGEX};

/// Granularity of tracked paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileLevel {
    #[default]
    File,
    Dir,
}

impl FromStr for FileLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FILE" => Ok(FileLevel::File),
            "DIR" => Ok(FileLevel::Dir),
            _ => Err(ConfigError::InvalidFileLevel(s.to_string())),
        }
    }
}

/// DFS asks for each path's history; BFS walks all commits once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanRule {
    #[default]
    Dfs,
    Bfs,
}

impl FromStr for ScanRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DFS" => Ok(ScanRule::Dfs),
            "BFS" => Ok(ScanRule::Bfs),
            _ => Err(ConfigError::InvalidScanRule(s.to_string())),
        }
    }
}

impl fmt::Display for ScanRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScanRule::Dfs => "DFS",
            ScanRule::Bfs => "BFS",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub repo_root: PathBuf,
    /// Paths must match this pattern from their first character.
    pub include_regex: Option<String>,
    /// Explicit scope; wins over `include_regex`.
    pub include_file_list: Vec<String>,
    /// Commit messages must contain a match.
    pub commit_include_regex: Option<String>,
    /// History depth per path (DFS) or in total (BFS); -1 = unlimited.
    pub max_depth_limit: i64,
    pub file_level: FileLevel,
    pub scan_rule: ScanRule,
    pub issue_regex: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            include_regex: None,
            include_file_list: Vec::new(),
            commit_include_regex: None,
            max_depth_limit: 16,
            file_level: FileLevel::File,
            scan_rule: ScanRule::Dfs,
            issue_regex: DEFAULT_ISSUE_REGEX.to_string(),
        }
    }
}

/// Facts and the graph built from them in one collection pass.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub facts: FactStore,
    pub graph: RelationGraph,
}

#[derive(Debug, Clone)]
pub struct Collector {
    config: CollectorConfig,
    include: Option<Regex>,
    commit_include: Option<Regex>,
    builder: RelationGraphBuilder,
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        name,
        pattern: pattern.to_string(),
        source,
    })
}

impl Collector {
    /// Validate every pattern before any repository access.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPattern` for any pattern that does not compile.
    pub fn new(config: CollectorConfig) -> Result<Self, ConfigError> {
        let include = match config.include_regex.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => {
                compile("include", p)?;
                Some(compile("include", &format!("^(?:{p})"))?)
            }
            None => None,
        };
        let commit_include = config
            .commit_include_regex
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| compile("commit include", p))
            .transpose()?;
        let builder = RelationGraphBuilder::new(&config.issue_regex)?;
        Ok(Self { config, include, commit_include, builder })
    }

    #[must_use]
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    #[must_use]
    pub fn builder(&self) -> &RelationGraphBuilder {
        &self.builder
    }

    /// Open the configured repository.
    ///
    /// # Errors
    /// Returns `SrcTagError::Git` when no repository is found at or above `repo_root`.
    pub fn open_repo(&self) -> Result<GitHistory, SrcTagError> {
        GitHistory::open(&self.config.repo_root)
    }

    fn max_depth(&self) -> Option<usize> {
        usize::try_from(self.config.max_depth_limit).ok()
    }

    /// Map a repository path to the configured granularity.
    #[must_use]
    pub fn level_path(&self, path: &str) -> String {
        match self.config.file_level {
            FileLevel::File => path.to_string(),
            FileLevel::Dir => path.rfind('/').map_or_else(String::new, |i| path[..i].to_string()),
        }
    }

    fn level_change(&self, change: Change) -> Change {
        if self.config.file_level == FileLevel::File {
            return change;
        }
        let changeset = change.changeset.iter().map(|p| self.level_path(p)).collect();
        Change { changeset, ..change }
    }

    /// Paths in scope for this collection.
    ///
    /// # Errors
    /// Propagates failures of the history source.
    pub fn scope<H: HistorySource + ?Sized>(&self, source: &H) -> Result<BTreeSet<String>, SrcTagError> {
        let tracked = source.list_tracked_paths()?;
        let mut scope = BTreeSet::new();
        if !self.config.include_file_list.is_empty() {
            log::info!("use specific file list");
            for path in &self.config.include_file_list {
                if tracked.contains(path) {
                    scope.insert(path.clone());
                } else {
                    log::warn!("specific file {path} not in git track, ignored");
                }
            }
            return Ok(scope);
        }
        for path in &tracked {
            if self.include.as_ref().is_some_and(|re| !re.is_match(path)) {
                continue;
            }
            scope.insert(self.level_path(path));
        }
        log::info!("{} path(s) collected", scope.len());
        Ok(scope)
    }

    /// Gather the fact store for all paths in scope.
    ///
    /// # Errors
    /// Propagates failures of the history source.
    pub fn collect_facts<H: HistorySource + ?Sized>(&self, source: &H) -> Result<FactStore, SrcTagError> {
        let scope = self.scope(source)?;
        let mut facts = FactStore::new();
        for path in &scope {
            facts.insert_file(path);
        }

        match self.config.scan_rule {
            ScanRule::Dfs => {
                for path in &scope {
                    for change in source.history_of(path, self.max_depth(), self.commit_include.as_ref())? {
                        facts.push_change(path, self.level_change(change));
                    }
                }
            }
            ScanRule::Bfs => {
                for change in source.commits(self.max_depth())? {
                    if self.commit_include.as_ref().is_some_and(|re| !re.is_match(&change.message)) {
                        continue;
                    }
                    let targets: BTreeSet<String> = change
                        .changeset
                        .iter()
                        .filter(|p| self.include.as_ref().map_or(true, |re| re.is_match(p)))
                        .map(|p| self.level_path(p))
                        .filter(|p| scope.contains(p))
                        .collect();
                    let change = self.level_change(change);
                    for target in &targets {
                        facts.push_change(target, change.clone());
                    }
                }
            }
        }
        Ok(facts)
    }

    /// Collect facts and build the relation graph from them.
    ///
    /// # Errors
    /// Propagates failures of the history source.
    pub fn collect<H: HistorySource + ?Sized>(&self, source: &H) -> Result<Collection, SrcTagError> {
        log::info!("git metadata collecting ({} scan) ...", self.config.scan_rule);
        let facts = self.collect_facts(source)?;
        let graph = self.builder.build(&facts);
        log::info!("metadata ready: {} nodes, {} edges", graph.node_count(), graph.edge_count());
        Ok(Collection { facts, graph })
    }
}

/// Per-commit changeset memo, shared safely between threads.
#[derive(Debug, Default)]
pub struct ChangesetCache {
    inner: Mutex<HashMap<Oid, Arc<BTreeSet<String>>>>,
}

impl ChangesetCache {
    fn get(&self, id: Oid) -> Option<Arc<BTreeSet<String>>> {
        self.inner.lock().ok()?.get(&id).cloned()
    }

    fn insert(&self, id: Oid, changeset: Arc<BTreeSet<String>>) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(id, changeset);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map_or(0, |m| m.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// History source over a git repository.
pub struct GitHistory {
    repo: Repository,
    cache: ChangesetCache,
}

impl fmt::Debug for GitHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHistory").field("path", &self.repo.path()).finish_non_exhaustive()
    }
}

fn diff_paths(diff: &Diff<'_>) -> BTreeSet<String> {
    diff.deltas()
        .filter_map(|d| d.new_file().path().or_else(|| d.old_file().path()))
        .filter_map(Path::to_str)
        .map(str::to_string)
        .collect()
}

fn touches(changeset: &BTreeSet<String>, path: &str) -> bool {
    if path.is_empty() || changeset.contains(path) {
        return true;
    }
    let prefix = format!("{}/", path.trim_end_matches('/'));
    changeset.iter().any(|p| p.starts_with(&prefix))
}

impl GitHistory {
    /// Discover the repository at or above `path`.
    ///
    /// # Errors
    /// Returns `SrcTagError::Git` when no repository can be opened.
    pub fn open(path: &Path) -> Result<Self, SrcTagError> {
        let repo = Repository::discover(path)?;
        Ok(Self { repo, cache: ChangesetCache::default() })
    }

    #[must_use]
    pub fn cache(&self) -> &ChangesetCache {
        &self.cache
    }

    /// Paths touched by `commit` relative to its first parent (or the empty tree).
    fn changeset(&self, commit: &Commit<'_>) -> Result<Arc<BTreeSet<String>>, SrcTagError> {
        if let Some(hit) = self.cache.get(commit.id()) {
            return Ok(hit);
        }
        let tree = commit.tree()?;
        let parent_tree = if commit.parent_count() > 0 { Some(commit.parent(0)?.tree()?) } else { None };
        let mut opts = DiffOptions::new();
        opts.ignore_filemode(true);
        let diff = self.repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        let changeset = Arc::new(diff_paths(&diff));
        self.cache.insert(commit.id(), Arc::clone(&changeset));
        Ok(changeset)
    }

    // Newest-first over non-merge commits reachable from HEAD; `visit` returns false to stop.
    fn walk<F>(&self, mut visit: F) -> Result<(), SrcTagError>
    where
        F: FnMut(&Commit<'_>) -> Result<bool, SrcTagError>,
    {
        match self.repo.head() {
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
            Ok(_) => {}
        }
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            if commit.parent_count() > 1 {
                continue;
            }
            if !visit(&commit)? {
                break;
            }
        }
        Ok(())
    }

    fn to_change(&self, commit: &Commit<'_>, changeset: &BTreeSet<String>) -> Change {
        Change {
            commit_id: commit.id().to_string(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            changeset: changeset.clone(),
        }
    }

    /// Paths that differ between two revisions, e.g. `HEAD~3` and `HEAD`.
    ///
    /// # Errors
    /// Returns `SrcTagError::Git` if a revision cannot be resolved to a tree.
    pub fn changed_between(&self, base: &str, head: &str) -> Result<BTreeSet<String>, SrcTagError> {
        let base_tree = self.repo.revparse_single(base)?.peel_to_tree()?;
        let head_tree = self.repo.revparse_single(head)?.peel_to_tree()?;
        let diff = self.repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)?;
        Ok(diff_paths(&diff))
    }
}

impl HistorySource for GitHistory {
    fn list_tracked_paths(&self) -> Result<BTreeSet<String>, SrcTagError> {
        let index = self.repo.index()?;
        Ok(index.iter().filter_map(|e| String::from_utf8(e.path).ok()).collect())
    }

    fn history_of(
        &self,
        path: &str,
        max_depth: Option<usize>,
        message_filter: Option<&Regex>,
    ) -> Result<Vec<Change>, SrcTagError> {
        let limit = max_depth.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }
        self.walk(|commit| {
            let message = String::from_utf8_lossy(commit.message_bytes());
            if message_filter.is_some_and(|re| !re.is_match(&message)) {
                return Ok(true);
            }
            let changeset = self.changeset(commit)?;
            if touches(&changeset, path) {
                out.push(self.to_change(commit, &changeset));
            }
            Ok(out.len() < limit)
        })?;
        Ok(out)
    }

    fn commits(&self, max_depth: Option<usize>) -> Result<Vec<Change>, SrcTagError> {
        let limit = max_depth.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }
        self.walk(|commit| {
            let changeset = self.changeset(commit)?;
            out.push(self.to_change(commit, &changeset));
            Ok(out.len() < limit)
        })?;
        Ok(out)
    }
}
