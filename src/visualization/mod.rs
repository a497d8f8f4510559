use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Generic node for rendering sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
    pub id: String,
    pub label: String,
    pub color: String,
}

/// Generic undirected edge; `weight` is only set on score edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualEdge {
    pub from: String,
    pub to: String,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualGraph {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
}

impl VisualGraph {
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&VisualNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    #[must_use]
    pub fn edge(&self, from: &str, to: &str) -> Option<&VisualEdge> {
        self.edges
            .iter()
            .find(|e| (e.from == from && e.to == to) || (e.from == to && e.to == from))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotTheme { Light, Dark }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankDir { LR, TB }

#[derive(Debug, Clone, Copy)]
pub struct DotOptions {
    pub legend: bool,
    pub theme: DotTheme,
    pub rankdir: RankDir,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self { legend: true, theme: DotTheme::Light, rankdir: RankDir::LR }
    }
}

#[derive(Debug, Default)]
pub struct DotGenerator;

impl DotGenerator {
    #[must_use]
    pub fn new() -> Self { Self {} }

    /// Generate DOT with default options.
    #[must_use]
    pub fn generate_dot(&self, graph: &VisualGraph) -> String {
        self.generate_dot_with_options(graph, DotOptions::default())
    }

    /// Generate an undirected DOT document with the given `opts`.
    /// Weighted edges carry their weight as label and scaled pen width.
    #[must_use]
    pub fn generate_dot_with_options(&self, graph: &VisualGraph, opts: DotOptions) -> String {
        let mut s = String::new();
        s.push_str("graph SrcTag\n{");
        s.push('\n');
        let rank = match opts.rankdir { RankDir::LR => "LR", RankDir::TB => "TB" };
        let (bg, font, edge_color) = match opts.theme {
            DotTheme::Light => ("white", "black", "#555555"),
            DotTheme::Dark => ("#1e1e1e", "#e0e0e0", "#9a9a9a"),
        };
        let _ = write!(
            s,
            "  rankdir={rank};\n  graph [fontname=Helvetica, bgcolor=\"{bg}\"] ;\n  node [shape=box, fontsize=10, style=\"filled,rounded\", fontcolor=\"{font}\"] ;\n  edge [fontname=Helvetica, fontsize=9, color=\"{edge_color}\", fontcolor=\"{font}\"];\n"
        );

        for node in &graph.nodes {
            let _ = writeln!(
                s,
                "  \"{}\" [label=\"{}\", fillcolor=\"{}\", tooltip=\"{}\"];",
                escape_label(&node.id),
                escape_label(&node.label),
                themed_fill(&node.color, opts.theme),
                escape_label(&node.id)
            );
        }

        for edge in &graph.edges {
            let from = escape_label(&edge.from);
            let to = escape_label(&edge.to);
            match edge.weight {
                Some(w) => {
                    let penwidth = (0.5 + 2.5 * w).clamp(0.5, 3.0);
                    let _ = writeln!(
                        s,
                        "  \"{from}\" -- \"{to}\" [label=\"{w:.3}\", penwidth={penwidth:.2}];"
                    );
                }
                None => {
                    let _ = writeln!(s, "  \"{from}\" -- \"{to}\";");
                }
            }
        }

        if opts.legend {
            s.push_str("  subgraph cluster_legend {\n    label=\"Legend\";\n    color=grey;\n");
            for (name, color) in [
                ("File", "#1f77b4"),
                ("Commit", "#7f7f7f"),
                ("Issue", "#2ca02c"),
                ("Tag", "#d62728"),
            ] {
                let fill = themed_fill(color, opts.theme);
                let _ = writeln!(s, "    \"legend:{name}\" [label=\"{name}\", fillcolor=\"{fill}\"]; ");
            }
            s.push_str("  }\n");
        }

        s.push_str("}\n");
        s
    }
}

fn escape_label(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// Dark theme darkens the base palette so labels stay readable.
fn themed_fill(color: &str, theme: DotTheme) -> String {
    match theme {
        DotTheme::Light => color.to_string(),
        DotTheme::Dark => match color {
            "#1f77b4" => "#124559".to_string(),
            "#7f7f7f" => "#3a3a3a".to_string(),
            "#2ca02c" => "#0b6e4f".to_string(),
            "#d62728" => "#6a1e44".to_string(),
            other => other.to_string(),
        },
    }
}
