//! Result model: a file-by-tag score matrix with query, CSV round trip and
//! visualization export. Pure value type, independent of the relation graph.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::SrcTagError;
use crate::graph::{color_for_node, Node};
use crate::utils::csv;
use crate::visualization::{VisualEdge, VisualGraph, VisualNode};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagResult {
    tags: Vec<String>,
    /// row -> tag -> score; a missing cell means no evidence.
    scores: BTreeMap<String, BTreeMap<String, f64>>,
}

impl TagResult {
    /// Build from column labels and cells. Tags only present in `scores` are appended.
    #[must_use]
    pub fn new(mut tags: Vec<String>, scores: BTreeMap<String, BTreeMap<String, f64>>) -> Self {
        for cells in scores.values() {
            for tag in cells.keys() {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        Self { tags, scores }
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn files(&self) -> Vec<&str> {
        self.scores.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    #[must_use]
    pub fn score(&self, file: &str, tag: &str) -> Option<f64> {
        self.scores.get(file).and_then(|cells| cells.get(tag)).copied()
    }

    /// Tags of `file`, best first. Unknown files give an empty list.
    #[must_use]
    pub fn scores_for_file(&self, file: &str) -> Vec<(String, f64)> {
        let Some(cells) = self.scores.get(file) else {
            return Vec::new();
        };
        let mut out: Vec<(String, f64)> = self
            .tags
            .iter()
            .filter_map(|t| cells.get(t).map(|v| (t.clone(), *v)))
            .collect();
        sort_desc(&mut out);
        out
    }

    /// Files scored for `tag`, best first. Unknown tags give an empty list.
    #[must_use]
    pub fn scores_for_tag(&self, tag: &str) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .scores
            .iter()
            .filter_map(|(file, cells)| cells.get(tag).map(|v| (file.clone(), *v)))
            .collect();
        sort_desc(&mut out);
        out
    }

    #[must_use]
    pub fn top_n_tags(&self, file: &str, n: usize) -> Vec<(String, f64)> {
        let mut v = self.scores_for_file(file);
        v.truncate(n);
        v
    }

    #[must_use]
    pub fn top_n_files(&self, tag: &str, n: usize) -> Vec<(String, f64)> {
        let mut v = self.scores_for_tag(tag);
        v.truncate(n);
        v
    }

    /// Render as CSV: a header of tag labels, one row per file, empty field = no evidence.
    #[must_use]
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        let mut header: Vec<&str> = vec![""];
        header.extend(self.tags.iter().map(String::as_str));
        csv::write_record(&mut out, &header);
        for (file, cells) in &self.scores {
            let mut record: Vec<String> = Vec::with_capacity(self.tags.len() + 1);
            record.push(file.clone());
            for tag in &self.tags {
                record.push(cells.get(tag).map(|v| v.to_string()).unwrap_or_default());
            }
            csv::write_record(&mut out, &record);
        }
        out
    }

    /// Parse CSV produced by [`TagResult::to_csv_string`].
    ///
    /// # Errors
    /// Returns `SrcTagError::Csv` on malformed records or cells that are not numbers.
    pub fn from_csv_str(text: &str) -> Result<Self, SrcTagError> {
        let records = csv::parse(text)?;
        let mut iter = records.into_iter();
        let Some((_, header)) = iter.next() else {
            return Ok(Self::default());
        };
        let tags: Vec<String> = header.into_iter().skip(1).collect();
        let mut scores: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for (line, record) in iter {
            let mut fields = record.into_iter();
            let Some(file) = fields.next() else { continue };
            let cells: Vec<String> = fields.collect();
            if cells.len() > tags.len() {
                return Err(SrcTagError::Csv {
                    line,
                    message: format!("{} cells for {} tags", cells.len(), tags.len()),
                });
            }
            let row = scores.entry(file).or_default();
            for (tag, cell) in tags.iter().zip(cells) {
                if cell.trim().is_empty() {
                    continue;
                }
                let v: f64 = cell.trim().parse().map_err(|e| SrcTagError::Csv {
                    line,
                    message: format!("invalid score `{cell}`: {e}"),
                })?;
                row.insert(tag.clone(), v);
            }
        }
        Ok(Self { tags, scores })
    }

    /// # Errors
    /// Returns `SrcTagError::Io` if the file cannot be written.
    pub fn export_csv(&self, path: &Path) -> Result<(), SrcTagError> {
        std::fs::write(path, self.to_csv_string())?;
        Ok(())
    }

    /// # Errors
    /// Returns `SrcTagError` if the file cannot be read or parsed.
    pub fn import_csv(path: &Path) -> Result<Self, SrcTagError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_csv_str(&text)
    }

    /// Bipartite tag/file graph with one weighted edge per nonzero cell.
    #[must_use]
    pub fn export_graph(&self) -> VisualGraph {
        let mut g = VisualGraph::default();
        for tag in &self.tags {
            g.nodes.push(VisualNode {
                id: format!("tag:{tag}"),
                label: tag.clone(),
                color: color_for_node(&Node::Tag(tag.clone())).to_string(),
            });
        }
        for (file, cells) in &self.scores {
            g.nodes.push(VisualNode {
                id: format!("file:{file}"),
                label: file.clone(),
                color: color_for_node(&Node::File(file.clone())).to_string(),
            });
            for tag in &self.tags {
                match cells.get(tag) {
                    Some(&w) if w != 0.0 => g.edges.push(VisualEdge {
                        from: format!("tag:{tag}"),
                        to: format!("file:{file}"),
                        weight: Some(w),
                    }),
                    _ => {}
                }
            }
        }
        g
    }
}

// Stable: ties keep matrix iteration order.
fn sort_desc(v: &mut [(String, f64)]) {
    v.sort_by(|a, b| b.1.total_cmp(&a.1));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> TagResult {
        let mut scores = BTreeMap::new();
        scores.insert(
            "src/a.rs".to_string(),
            BTreeMap::from([("cache".to_string(), 1.0), ("parser".to_string(), 0.25)]),
        );
        scores.insert("src/b.rs".to_string(), BTreeMap::from([("cache".to_string(), 0.5)]));
        TagResult::new(vec!["cache".into(), "parser".into(), "net".into()], scores)
    }

    #[test]
    fn queries_sort_descending() {
        let r = fixture();
        assert_eq!(r.scores_for_file("src/a.rs")[0].0, "cache");
        assert_eq!(r.top_n_files("cache", 1), vec![("src/a.rs".to_string(), 1.0)]);
        assert_eq!(r.top_n_tags("src/a.rs", 5).len(), 2);
        assert_eq!(r.files(), vec!["src/a.rs", "src/b.rs"]);
        assert_eq!(r.tags().len(), 3);
    }

    #[test]
    fn unknown_labels_give_empty_results() {
        let r = fixture();
        assert!(r.scores_for_file("nope").is_empty());
        assert!(r.scores_for_tag("nope").is_empty());
        assert!(r.scores_for_tag("net").is_empty());
        assert!(r.score("src/b.rs", "parser").is_none());
    }

    #[test]
    fn csv_keeps_absent_cells_absent() {
        let r = fixture();
        let text = r.to_csv_string();
        assert!(text.starts_with(",cache,parser,net\n"));
        assert!(text.contains("src/b.rs,0.5,,\n"));
        let back = TagResult::from_csv_str(&text).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn csv_rejects_bad_cells() {
        let err = TagResult::from_csv_str(",a\nx,abc\n").unwrap_err();
        assert!(matches!(err, SrcTagError::Csv { line: 2, .. }));
        let err = TagResult::from_csv_str(",a\nx,1,2\n").unwrap_err();
        assert!(matches!(err, SrcTagError::Csv { line: 2, .. }));
    }

    #[test]
    fn export_graph_is_bipartite_with_weights() {
        let g = fixture().export_graph();
        assert_eq!(g.nodes.len(), 5);
        assert_eq!(g.edges.len(), 3);
        let e = g.edge("tag:parser", "file:src/a.rs").unwrap();
        assert_eq!(e.weight, Some(0.25));
    }
}
