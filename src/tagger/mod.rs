//! Scoring pipeline: per-tag retrieval, distance-to-similarity conversion,
//! attribution to rows, accumulation, optional common-row down-weighting,
//! rank conversion and final normalization.
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::errors::ConfigError;
use crate::graph::{Node, RelationGraph};
use crate::index::{DocumentKind, Hit, NeighborIndex};
use crate::model::TagResult;

pub mod score;

pub use score::WeightPolicy;

type Matrix = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    pub tags: Vec<String>,
    /// Fraction of the indexed corpus retrieved per tag, e.g. 0.3 = closest 30%.
    pub n_percent: f64,
    /// Weight rows by their score variance across tags, see [`WeightPolicy`].
    pub weighting: bool,
    pub weighting_scale: f64,
    pub weight_policy: WeightPolicy,
    /// Min-max normalize each rank column to [0, 1].
    pub normalize: bool,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            n_percent: 0.3,
            weighting: false,
            weighting_scale: 2.0,
            weight_policy: WeightPolicy::default(),
            normalize: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Rows are the files that produced matching commit messages.
    Direct,
    /// Rows are the files adjacent to matching issues.
    IssueAware,
}

impl ScoringMode {
    /// Issue-aware when the graph carries issue relations, direct otherwise.
    #[must_use]
    pub fn select(graph: &RelationGraph) -> Self {
        if graph.has_issues() {
            ScoringMode::IssueAware
        } else {
            ScoringMode::Direct
        }
    }

    #[must_use]
    pub fn document_kind(self) -> DocumentKind {
        match self {
            ScoringMode::Direct => DocumentKind::CommitMsg,
            ScoringMode::IssueAware => DocumentKind::Issue,
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScoringMode::Direct => "direct",
            ScoringMode::IssueAware => "issue-aware",
        })
    }
}

/// Per-run summary of what was skipped or failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagReport {
    /// Documents requested per tag.
    pub limit: usize,
    /// Tags whose query returned no hits.
    pub empty_tags: Vec<String>,
    /// Tags whose query failed, with the error text.
    pub failed_tags: Vec<(String, String)>,
    /// Matched issues that are not part of the graph.
    pub missing_issues: BTreeSet<String>,
}

impl TagReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.empty_tags.is_empty() && self.failed_tags.is_empty() && self.missing_issues.is_empty()
    }
}

/// Everything a tagging run produces. `graph` is the caller's snapshot
/// augmented with tag nodes and edges.
#[derive(Debug, Clone)]
pub struct TagRun {
    pub result: TagResult,
    pub graph: RelationGraph,
    pub mode: ScoringMode,
    pub report: TagReport,
}

#[derive(Debug, Clone)]
pub struct Tagger {
    config: TaggerConfig,
}

enum Retrieval {
    Hits(Vec<(Hit, f64)>),
    Failed(String),
}

impl Tagger {
    /// # Errors
    /// Returns `ConfigError` if `n_percent` is outside (0, 1] or the weighting scale is not finite.
    pub fn new(config: TaggerConfig) -> Result<Self, ConfigError> {
        if !(config.n_percent > 0.0 && config.n_percent <= 1.0) {
            return Err(ConfigError::InvalidPercent(config.n_percent));
        }
        if !config.weighting_scale.is_finite() {
            return Err(ConfigError::InvalidScale(config.weighting_scale));
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    /// Tag with the mode the graph calls for (see [`ScoringMode::select`]).
    pub fn tag<I: NeighborIndex + ?Sized>(&self, index: &I, graph: RelationGraph) -> TagRun {
        let mode = ScoringMode::select(&graph);
        self.tag_with_mode(index, graph, mode)
    }

    /// Run the full pipeline in a fixed mode.
    pub fn tag_with_mode<I: NeighborIndex + ?Sized>(
        &self,
        index: &I,
        mut graph: RelationGraph,
        mode: ScoringMode,
    ) -> TagRun {
        let tags = self.unique_tags();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let limit = (index.count() as f64 * self.config.n_percent).floor() as usize;
        let kind = mode.document_kind();
        let mut report = TagReport { limit, ..TagReport::default() };
        log::info!("tagging {} tag(s) in {mode} mode, {limit} document(s) per tag", tags.len());

        let retrieved: Vec<(String, Retrieval)> = tags
            .par_iter()
            .map(|tag| {
                let outcome = match index.query(tag, limit, Some(kind)) {
                    Ok(hits) => {
                        let distances: Vec<f64> = hits.iter().map(|h| h.distance).collect();
                        let sims = score::similarities(&distances);
                        Retrieval::Hits(hits.into_iter().zip(sims).collect())
                    }
                    Err(e) => Retrieval::Failed(e.to_string()),
                };
                (tag.clone(), outcome)
            })
            .collect();

        // Single writer from here on.
        let mut raw: Matrix = BTreeMap::new();
        let mut tag_edges: BTreeSet<(String, Node)> = BTreeSet::new();
        for (tag, outcome) in retrieved {
            let hits = match outcome {
                Retrieval::Hits(hits) => hits,
                Retrieval::Failed(err) => {
                    log::warn!("query failed for tag `{tag}`: {err}");
                    report.failed_tags.push((tag, err));
                    continue;
                }
            };
            if hits.is_empty() {
                log::warn!("no hits for tag `{tag}`");
                report.empty_tags.push(tag);
                continue;
            }
            for (hit, sim) in hits {
                match mode {
                    ScoringMode::Direct => {
                        let Some(source) = hit.meta.source.as_deref() else {
                            log::debug!("hit without source path for tag `{tag}`");
                            continue;
                        };
                        *raw.entry(source.to_string()).or_default().entry(tag.clone()).or_insert(0.0) += sim;
                        if sim > 0.0 {
                            tag_edges.insert((tag.clone(), Node::File(source.to_string())));
                        }
                    }
                    ScoringMode::IssueAware => {
                        let Some(issue_id) = hit.meta.issue_id.as_deref() else {
                            log::debug!("hit without issue id for tag `{tag}`");
                            continue;
                        };
                        let issue = Node::Issue(issue_id.to_string());
                        if !graph.contains(&issue) {
                            log::warn!("issue {issue_id} not in graph scope, skipped");
                            report.missing_issues.insert(issue_id.to_string());
                            continue;
                        }
                        for file in graph.file_neighbors(&issue) {
                            *raw.entry(file.to_string()).or_default().entry(tag.clone()).or_insert(0.0) += sim;
                        }
                        if sim > 0.0 {
                            tag_edges.insert((tag.clone(), issue));
                        }
                    }
                }
            }
        }

        if self.config.weighting {
            apply_row_weights(&mut raw, self.config.weighting_scale, self.config.weight_policy);
        }
        let scores = rank_columns(&raw, &tags, self.config.normalize);

        for (tag, target) in tag_edges {
            graph.add_edge(Node::Tag(tag), target);
        }

        TagRun { result: TagResult::new(tags, scores), graph, mode, report }
    }

    fn unique_tags(&self) -> Vec<String> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        self.config
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty() && seen.insert(*t))
            .map(str::to_string)
            .collect()
    }
}

// Weight each row of exp(score * scale) by its variance across tags.
// Cells keep ln(weight * exp(score * scale)); the log is monotone so the
// following rank conversion sees the same order without overflowing.
fn apply_row_weights(raw: &mut Matrix, scale: f64, policy: WeightPolicy) {
    let log_variances: Vec<f64> = raw
        .values()
        .map(|row| score::log_exp_variance(&row.values().map(|v| v * scale).collect::<Vec<_>>()))
        .collect();
    let weights = score::row_weights(&log_variances, policy);
    for (row, w) in raw.values_mut().zip(weights) {
        let log_w = w.ln();
        for v in row.values_mut() {
            *v = *v * scale + log_w;
        }
    }
}

// Replace each tag column by its competition ranks, optionally min-max normalized.
fn rank_columns(raw: &Matrix, tags: &[String], normalize: bool) -> Matrix {
    let mut out: Matrix = BTreeMap::new();
    for tag in tags {
        let (rows, values): (Vec<&String>, Vec<f64>) =
            raw.iter().filter_map(|(row, cells)| cells.get(tag).map(|v| (row, *v))).unzip();
        if rows.is_empty() {
            continue;
        }
        let mut ranks = score::competition_ranks(&values);
        if normalize {
            ranks = score::min_max(&ranks);
        }
        for (row, rank) in rows.into_iter().zip(ranks) {
            out.entry(row.clone()).or_default().insert(tag.clone(), rank);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SrcTagError;
    use crate::facts::{Change, FactStore};
    use crate::graph::{RelationGraphBuilder, DEFAULT_ISSUE_REGEX};
    use crate::index::{Document, DocumentMeta, MemoryIndex};

    fn config(tags: &[&str]) -> TaggerConfig {
        TaggerConfig { tags: tags.iter().map(|s| (*s).to_string()).collect(), n_percent: 1.0, ..Default::default() }
    }

    fn scenario() -> (MemoryIndex, RelationGraph) {
        let mut facts = FactStore::new();
        let c1 = Change::new("C1", "fixes #42, improves caching", ["a.txt", "b.txt"]);
        facts.push_change("a.txt", c1.clone());
        facts.push_change("b.txt", c1);
        facts.push_change("c.txt", Change::new("C2", "tidy docs", ["c.txt"]));
        let graph = RelationGraphBuilder::new(DEFAULT_ISSUE_REGEX).unwrap().build(&facts);

        let mut index = MemoryIndex::new();
        for (path, history) in &facts.files {
            for c in history {
                index.upsert(Document {
                    id: format!("commit_msg|{path}|{}", c.commit_id),
                    text: c.message.clone(),
                    meta: DocumentMeta::commit_msg(path, &c.commit_id),
                });
            }
        }
        index.upsert(Document {
            id: "issue|#42".into(),
            text: "caching layer rewrite".into(),
            meta: DocumentMeta::issue("#42"),
        });
        (index, graph)
    }

    #[test]
    fn issue_aware_fans_out_to_referencing_files() {
        let (index, graph) = scenario();
        let run = Tagger::new(config(&["caching"])).unwrap().tag(&index, graph.clone());
        assert_eq!(run.mode, ScoringMode::IssueAware);
        let a = run.result.score("a.txt", "caching").unwrap();
        let b = run.result.score("b.txt", "caching").unwrap();
        assert!(a > 0.0 && b > 0.0);
        assert!(run.result.score("c.txt", "caching").is_none());
        assert!(run.graph.contains_edge(&Node::Tag("caching".into()), &Node::Issue("#42".into())));
        // the caller's snapshot stays untouched
        assert!(!graph.contains(&Node::Tag("caching".into())));
    }

    #[test]
    fn direct_mode_accumulates_repeated_evidence() {
        let mut index = MemoryIndex::new();
        for (id, path, text) in [
            ("1", "a.rs", "caching fix"),
            ("2", "a.rs", "caching tweak"),
            ("3", "b.rs", "caching"),
            ("4", "c.rs", "parser"),
        ] {
            index.upsert(Document { id: id.into(), text: text.into(), meta: DocumentMeta::commit_msg(path, id) });
        }
        let mut cfg = config(&["caching"]);
        cfg.normalize = false;
        let run = Tagger::new(cfg).unwrap().tag(&index, RelationGraph::new());
        assert_eq!(run.mode, ScoringMode::Direct);
        // a.rs: two hits at ~0.71 each; b.rs: one exact hit at 1.0; c.rs: 0.0
        let top = run.result.top_n_files("caching", 3);
        assert_eq!(top[0].0, "a.rs");
        assert_eq!(top[1].0, "b.rs");
        assert_eq!(top[2].0, "c.rs");
        assert_eq!(run.result.score("a.rs", "caching"), Some(3.0));
        assert_eq!(run.result.score("c.rs", "caching"), Some(1.0));
        assert!(run.graph.contains_edge(&Node::Tag("caching".into()), &Node::File("a.rs".into())));
        assert!(!run.graph.contains_edge(&Node::Tag("caching".into()), &Node::File("c.rs".into())));
    }

    #[test]
    fn zero_limit_reports_empty_tags() {
        let (index, graph) = scenario();
        let cfg = TaggerConfig { tags: vec!["caching".into()], n_percent: 0.1, ..Default::default() };
        let run = Tagger::new(cfg).unwrap().tag(&index, graph);
        assert_eq!(run.report.limit, 0);
        assert_eq!(run.report.empty_tags, vec!["caching".to_string()]);
        assert!(run.result.files().is_empty());
        assert_eq!(run.result.tags(), &["caching".to_string()]);
    }

    struct FlakyIndex(MemoryIndex);

    impl NeighborIndex for FlakyIndex {
        fn count(&self) -> usize {
            self.0.count()
        }

        fn query(&self, text: &str, limit: usize, kind: Option<DocumentKind>) -> Result<Vec<Hit>, SrcTagError> {
            if text == "boom" {
                return Err(SrcTagError::Index("backend unavailable".into()));
            }
            self.0.query(text, limit, kind)
        }
    }

    #[test]
    fn failed_tag_does_not_abort_others() {
        let (index, graph) = scenario();
        let run = Tagger::new(config(&["boom", "caching"])).unwrap().tag(&FlakyIndex(index), graph);
        assert_eq!(run.report.failed_tags.len(), 1);
        assert_eq!(run.report.failed_tags[0].0, "boom");
        assert!(run.result.score("a.txt", "caching").is_some());
        assert!(!run.report.is_clean());
    }

    #[test]
    fn missing_issue_is_reported_not_fatal() {
        let (mut index, graph) = scenario();
        index.upsert(Document { id: "issue|#99".into(), text: "caching".into(), meta: DocumentMeta::issue("#99") });
        let run = Tagger::new(config(&["caching"])).unwrap().tag(&index, graph);
        assert!(run.report.missing_issues.contains("#99"));
        assert!(run.result.score("a.txt", "caching").is_some());
    }

    fn two_rows() -> Matrix {
        let mut raw: Matrix = BTreeMap::new();
        raw.insert("readme".into(), BTreeMap::from([("x".into(), 1.0), ("y".into(), 1.0)]));
        raw.insert("core".into(), BTreeMap::from([("x".into(), 1.0), ("y".into(), 0.0)]));
        raw
    }

    #[test]
    fn weighting_suppresses_the_most_varying_row() {
        let mut raw = two_rows();
        apply_row_weights(&mut raw, 2.0, WeightPolicy::PenalizeVarying);
        assert_eq!(raw["core"]["x"], f64::NEG_INFINITY);
        assert!((raw["readme"]["x"] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn uniform_policy_suppresses_flat_rows() {
        let mut raw = two_rows();
        apply_row_weights(&mut raw, 2.0, WeightPolicy::PenalizeUniform);
        assert_eq!(raw["readme"]["x"], f64::NEG_INFINITY);
        assert!((raw["core"]["x"] - 2.0).abs() < 1e-12);
    }

    fn heavy_index(repeats: usize) -> MemoryIndex {
        let mut index = MemoryIndex::new();
        for i in 0..repeats {
            let id = format!("hot{i}");
            index.upsert(Document {
                id: id.clone(),
                text: "caching parser".into(),
                meta: DocumentMeta::commit_msg("hot.rs", &id),
            });
        }
        index.upsert(Document { id: "x".into(), text: "caching".into(), meta: DocumentMeta::commit_msg("x.rs", "x") });
        index.upsert(Document { id: "y".into(), text: "parser".into(), meta: DocumentMeta::commit_msg("y.rs", "y") });
        index
    }

    #[test]
    fn weighting_keeps_order_when_sums_are_huge() {
        // hot.rs sums ~424 per tag, so exp(sum * 2) is far past f64::MAX
        let index = heavy_index(600);
        let cfg = TaggerConfig { weighting: true, normalize: false, ..config(&["caching", "parser"]) };
        let run = Tagger::new(cfg).unwrap().tag(&index, RelationGraph::new());
        for tag in ["caching", "parser"] {
            let ranked = run.result.scores_for_tag(tag);
            assert_eq!(ranked[0], ("hot.rs".to_string(), 3.0));
            assert!(ranked.iter().all(|(_, s)| s.is_finite()));
        }
    }

    #[test]
    fn uniform_policy_runs_through_the_pipeline() {
        let index = heavy_index(600);
        let cfg = TaggerConfig {
            weighting: true,
            weight_policy: WeightPolicy::PenalizeUniform,
            ..config(&["caching", "parser"])
        };
        let run = Tagger::new(cfg).unwrap().tag(&index, RelationGraph::new());
        // hot.rs scores alike on both tags, x.rs and y.rs are specific
        assert_eq!(run.result.score("x.rs", "caching"), Some(1.0));
        assert_eq!(run.result.score("y.rs", "parser"), Some(1.0));
        assert_eq!(run.result.score("hot.rs", "caching"), Some(0.0));
    }

    #[test]
    fn invalid_config_fails_fast() {
        let bad = TaggerConfig { n_percent: 0.0, ..Default::default() };
        assert!(matches!(Tagger::new(bad), Err(ConfigError::InvalidPercent(_))));
        let bad = TaggerConfig { weighting_scale: f64::NAN, ..Default::default() };
        assert!(matches!(Tagger::new(bad), Err(ConfigError::InvalidScale(_))));
    }

    #[test]
    fn duplicate_and_blank_tags_are_dropped() {
        let t = Tagger::new(config(&["a", " a ", "", "b"])).unwrap();
        assert_eq!(t.unique_tags(), vec!["a".to_string(), "b".to_string()]);
    }
}
