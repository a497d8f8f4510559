//! Relation graph model and builder.
//!
//! The graph is undirected and content-addressed: a node is identified by its
//! kind plus its key (path, commit id, issue id or tag label), so inserting the
//! same fact twice never changes the graph. Adjacency is kept in ordered maps
//! to make iteration, serialization and DOT output deterministic.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{ConfigError, SrcTagError};
use crate::facts::FactStore;
use crate::visualization::{VisualEdge, VisualGraph, VisualNode};

/// Default issue grammar: GitHub style `#123`.
pub const DEFAULT_ISSUE_REGEX: &str = r"(#\d+)";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum Node {
    File(String),
    Commit(String),
    Issue(String),
    Tag(String),
}

impl Node {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Node::File(k) | Node::Commit(k) | Node::Issue(k) | Node::Tag(k) => k,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::File(_) => "file",
            Node::Commit(_) => "commit",
            Node::Issue(_) => "issue",
            Node::Tag(_) => "tag",
        }
    }

    #[must_use]
    pub fn as_file(&self) -> Option<&str> {
        match self {
            Node::File(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_issue(&self) -> Option<&str> {
        match self {
            Node::Issue(i) => Some(i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GraphDoc", into = "GraphDoc")]
pub struct RelationGraph {
    adjacency: BTreeMap<Node, BTreeSet<Node>>,
}

// JSON object keys must be strings, so the graph travels as node and edge lists.
#[derive(Serialize, Deserialize)]
struct GraphDoc {
    nodes: Vec<Node>,
    edges: Vec<(Node, Node)>,
}

impl From<RelationGraph> for GraphDoc {
    fn from(g: RelationGraph) -> Self {
        let edges = g.edges().map(|(a, b)| (a.clone(), b.clone())).collect();
        GraphDoc { nodes: g.adjacency.into_keys().collect(), edges }
    }
}

impl From<GraphDoc> for RelationGraph {
    fn from(doc: GraphDoc) -> Self {
        let mut g = RelationGraph::default();
        for n in doc.nodes {
            g.add_node(n);
        }
        for (a, b) in doc.edges {
            g.add_edge(a, b);
        }
        g
    }
}

impl RelationGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node; a no-op when it already exists.
    pub fn add_node(&mut self, node: Node) {
        self.adjacency.entry(node).or_default();
    }

    /// Insert an undirected edge, creating missing endpoints. Self loops are ignored.
    pub fn add_edge(&mut self, a: Node, b: Node) {
        if a == b {
            self.add_node(a);
            return;
        }
        self.adjacency.entry(a.clone()).or_default().insert(b.clone());
        self.adjacency.entry(b).or_default().insert(a);
    }

    #[must_use]
    pub fn contains(&self, node: &Node) -> bool {
        self.adjacency.contains_key(node)
    }

    #[must_use]
    pub fn contains_edge(&self, a: &Node, b: &Node) -> bool {
        self.adjacency.get(a).is_some_and(|n| n.contains(b))
    }

    /// Neighbors of `node`; empty when the node is unknown.
    pub fn neighbors<'a>(&'a self, node: &Node) -> impl Iterator<Item = &'a Node> + 'a {
        self.adjacency.get(node).into_iter().flatten()
    }

    /// File paths adjacent to `node`.
    pub fn file_neighbors<'a>(&'a self, node: &Node) -> impl Iterator<Item = &'a str> + 'a {
        self.neighbors(node).filter_map(Node::as_file)
    }

    /// Issue ids adjacent to `node`.
    pub fn issue_neighbors<'a>(&'a self, node: &Node) -> impl Iterator<Item = &'a str> + 'a {
        self.neighbors(node).filter_map(Node::as_issue)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.adjacency.keys()
    }

    /// Every undirected edge exactly once, smaller endpoint first.
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.adjacency
            .iter()
            .flat_map(|(a, ns)| ns.iter().filter(move |b| a < *b).map(move |b| (a, b)))
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.nodes().filter_map(Node::as_file)
    }

    pub fn issues(&self) -> impl Iterator<Item = &str> {
        self.nodes().filter_map(Node::as_issue)
    }

    #[must_use]
    pub fn has_issues(&self) -> bool {
        self.issues().next().is_some()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Node count per kind, in `file, commit, issue, tag` order.
    #[must_use]
    pub fn kind_counts(&self) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for n in self.nodes() {
            let i = match n {
                Node::File(_) => 0,
                Node::Commit(_) => 1,
                Node::Issue(_) => 2,
                Node::Tag(_) => 3,
            };
            counts[i] += 1;
        }
        counts
    }

    /// Colored node/edge view of the whole graph for rendering.
    #[must_use]
    pub fn to_visual(&self) -> VisualGraph {
        let nodes = self
            .nodes()
            .map(|n| VisualNode {
                id: format!("{}:{}", n.kind_name(), n.key()),
                label: n.key().to_string(),
                color: color_for_node(n).to_string(),
            })
            .collect();
        let edges = self
            .edges()
            .map(|(a, b)| VisualEdge {
                from: format!("{}:{}", a.kind_name(), a.key()),
                to: format!("{}:{}", b.kind_name(), b.key()),
                weight: None,
            })
            .collect();
        VisualGraph { nodes, edges }
    }

    /// Save the graph as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns `SrcTagError` if serialization or writing the file fails.
    pub fn save_json(&self, path: &std::path::Path) -> Result<(), SrcTagError> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load a graph from JSON file.
    ///
    /// # Errors
    /// Returns `SrcTagError` if reading the file fails or JSON is invalid.
    pub fn load_json(path: &std::path::Path) -> Result<Self, SrcTagError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[must_use]
pub fn color_for_node(node: &Node) -> &'static str {
    match node {
        Node::File(_) => "#1f77b4",
        Node::Commit(_) => "#7f7f7f",
        Node::Issue(_) => "#2ca02c",
        Node::Tag(_) => "#d62728",
    }
}

/// Turns a fact store into a relation graph using an issue-matching rule.
#[derive(Debug, Clone)]
pub struct RelationGraphBuilder {
    issue_regex: Regex,
}

impl RelationGraphBuilder {
    /// Compile the issue pattern up front.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPattern` if `issue_pattern` does not compile.
    pub fn new(issue_pattern: &str) -> Result<Self, ConfigError> {
        let issue_regex = Regex::new(issue_pattern).map_err(|source| ConfigError::InvalidPattern {
            name: "issue",
            pattern: issue_pattern.to_string(),
            source,
        })?;
        Ok(Self { issue_regex })
    }

    /// Issue ids referenced by `message`. The first capture group is the id when
    /// the pattern has one, otherwise the whole match.
    #[must_use]
    pub fn issues_in(&self, message: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for caps in self.issue_regex.captures_iter(message) {
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else { continue };
            if m.as_str().is_empty() {
                continue;
            }
            if !out.iter().any(|s| s == m.as_str()) {
                out.push(m.as_str().to_string());
            }
        }
        out
    }

    #[must_use]
    pub fn build(&self, facts: &FactStore) -> RelationGraph {
        let mut graph = RelationGraph::new();
        self.extend(&mut graph, facts);
        graph
    }

    /// Union `facts` into an existing graph.
    pub fn extend(&self, graph: &mut RelationGraph, facts: &FactStore) {
        for (path, history) in &facts.files {
            let file = Node::File(path.clone());
            graph.add_node(file.clone());

            for change in history {
                let commit = Node::Commit(change.commit_id.clone());
                graph.add_edge(commit.clone(), file.clone());
                for related in &change.changeset {
                    graph.add_edge(commit.clone(), Node::File(related.clone()));
                }

                for issue_id in self.issues_in(&change.message) {
                    let issue = Node::Issue(issue_id);
                    graph.add_edge(issue.clone(), file.clone());
                    for related in &change.changeset {
                        graph.add_edge(issue.clone(), Node::File(related.clone()));
                    }
                }
            }
        }
        log::debug!(
            "relation graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
    }
}
