//! Diff propagation: widen a seed set of changed paths to every path that
//! shares an issue with it, round by round, until nothing new appears or the
//! batch limit is spent.
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::graph::{Node, RelationGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffPropagation {
    /// Maximum number of expansion rounds.
    pub batch: usize,
}

/// Outcome of a propagation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    /// Seeds plus every path found related to them.
    pub related: BTreeSet<String>,
    /// Rounds that added at least one path.
    pub rounds: usize,
    /// True when the last executed round found nothing new.
    pub fixpoint: bool,
    /// Frontier paths that are not part of the graph.
    pub missing: BTreeSet<String>,
}

impl PropagationReport {
    /// Paths added on top of the seeds.
    #[must_use]
    pub fn added<'a>(&'a self, seeds: &'a BTreeSet<String>) -> impl Iterator<Item = &'a String> + 'a {
        self.related.difference(seeds)
    }
}

impl DiffPropagation {
    #[must_use]
    pub fn new(batch: usize) -> Self {
        Self { batch }
    }

    /// Expand `seeds` over shared issue neighbors.
    ///
    /// Each round looks up, for every frontier path present in the graph, its
    /// issue neighbors and their file neighbors. Lookups within a round are
    /// independent and run in parallel; the union makes the result order-free.
    #[must_use]
    pub fn propagate<I, S>(&self, graph: &RelationGraph, seeds: I) -> PropagationReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut total: BTreeSet<String> = seeds.into_iter().map(Into::into).collect();
        let mut frontier: Vec<String> = total.iter().cloned().collect();
        let mut report = PropagationReport::default();

        for round in 0..self.batch {
            let (candidates, missing) = frontier
                .par_iter()
                .map(|path| related_paths(graph, path))
                .reduce(
                    || (BTreeSet::new(), BTreeSet::new()),
                    |(mut ca, mut ma), (cb, mb)| {
                        ca.extend(cb);
                        ma.extend(mb);
                        (ca, ma)
                    },
                );
            for path in &missing {
                log::warn!("diff path not in graph scope, skipped: {path}");
            }
            report.missing.extend(missing);

            let new: Vec<String> = candidates.difference(&total).cloned().collect();
            if new.is_empty() {
                log::debug!("propagation reached fixpoint after {round} round(s)");
                report.fixpoint = true;
                break;
            }
            log::info!("propagation round {}: {} new path(s)", round + 1, new.len());
            total.extend(new.iter().cloned());
            frontier = new;
            report.rounds += 1;
        }

        report.related = total;
        report
    }
}

// (files sharing an issue with `path`, missing paths)
fn related_paths(graph: &RelationGraph, path: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let node = Node::File(path.to_string());
    if !graph.contains(&node) {
        return (BTreeSet::new(), BTreeSet::from([path.to_string()]));
    }
    let mut out = BTreeSet::new();
    for issue in graph.neighbors(&node).filter(|n| matches!(n, Node::Issue(_))) {
        out.extend(graph.file_neighbors(issue).map(str::to_string));
    }
    (out, BTreeSet::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{Change, FactStore};
    use crate::graph::{RelationGraphBuilder, DEFAULT_ISSUE_REGEX};

    // a.txt --#7-- d.txt --#9-- e.txt, plus an unrelated f.txt
    fn chain() -> RelationGraph {
        let mut facts = FactStore::new();
        facts.push_change("a.txt", Change::new("c1", "touch #7", ["a.txt", "d.txt"]));
        facts.push_change("d.txt", Change::new("c2", "follow up #9", ["d.txt", "e.txt"]));
        facts.push_change("f.txt", Change::new("c3", "no issue", ["f.txt", "a.txt"]));
        RelationGraphBuilder::new(DEFAULT_ISSUE_REGEX).unwrap().build(&facts)
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn batch_limit_bounds_rounds() {
        let g = chain();
        let one = DiffPropagation::new(1).propagate(&g, ["a.txt"]);
        assert_eq!(one.related, set(&["a.txt", "d.txt"]));
        assert!(!one.fixpoint);

        let two = DiffPropagation::new(2).propagate(&g, ["a.txt"]);
        assert_eq!(two.related, set(&["a.txt", "d.txt", "e.txt"]));
        assert_eq!(two.rounds, 2);

        let three = DiffPropagation::new(3).propagate(&g, ["a.txt"]);
        assert_eq!(three.related, two.related);
        assert!(three.fixpoint);
        assert_eq!(three.rounds, 2);
    }

    #[test]
    fn commit_only_neighbors_do_not_propagate() {
        let g = chain();
        let r = DiffPropagation::new(10).propagate(&g, ["f.txt"]);
        assert_eq!(r.related, set(&["f.txt"]));
        assert!(r.fixpoint);
    }

    #[test]
    fn missing_seed_is_kept_and_reported() {
        let g = chain();
        let r = DiffPropagation::new(5).propagate(&g, ["gone.txt", "a.txt"]);
        assert!(r.related.contains("gone.txt"));
        assert!(r.related.contains("e.txt"));
        assert_eq!(r.missing, set(&["gone.txt"]));
    }

    #[test]
    fn zero_batch_returns_seeds() {
        let g = chain();
        let r = DiffPropagation::new(0).propagate(&g, ["a.txt"]);
        assert_eq!(r.related, set(&["a.txt"]));
        assert_eq!(r.rounds, 0);
        let seeds = set(&["a.txt"]);
        assert_eq!(r.added(&seeds).count(), 0);
    }
}
