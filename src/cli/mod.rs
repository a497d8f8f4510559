use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "srctag",
    version,
    about = "Tag source files by their commit and issue history",
    long_about = "Collect commit, file and issue relations from a git repository, score files against free-text tags and widen diffs to related files. Settings are read from srctag.toml in the repository root (or --config); flags override file values."
)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Suppress non-essential output
    #[arg(long, global = true, default_value_t = false)]
    pub quiet: bool,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

/// Repository scope shared by every command that collects history.
#[derive(Debug, Clone, Args)]
pub struct CollectArgs {
    /// Repository root (any directory inside the work tree) [default: .]
    #[arg(short, long)]
    pub path: Option<String>,
    /// Only include paths matching this pattern from their start
    #[arg(long)]
    pub include: Option<String>,
    /// Explicit path to include (repeatable); wins over --include
    #[arg(long = "include-file", value_name = "PATH")]
    pub include_files: Vec<String>,
    /// Only keep commits whose message matches this pattern
    #[arg(long)]
    pub commit_include: Option<String>,
    /// History depth limit, -1 for unlimited
    #[arg(long, allow_negative_numbers = true)]
    pub max_depth: Option<i64>,
    /// Path granularity
    #[arg(long, value_parser = ["FILE", "DIR"])]
    pub file_level: Option<String>,
    /// History scan order
    #[arg(long, value_parser = ["DFS", "BFS"])]
    pub scan_rule: Option<String>,
    /// Pattern extracting issue ids from commit messages
    #[arg(long)]
    pub issue_regex: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DotArgs {
    /// DOT: include legend
    #[arg(long, value_parser = ["on", "off"])]
    pub dot_legend: Option<String>,
    /// DOT: theme (light or dark)
    #[arg(long, value_parser = ["light", "dark"])]
    pub dot_theme: Option<String>,
    /// DOT: rank direction (LR or TB)
    #[arg(long, value_parser = ["LR", "TB"])]
    pub dot_rankdir: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct GraphArgs {
    #[command(flatten)]
    pub collect: CollectArgs,
    /// Write the relation graph as JSON
    #[arg(long)]
    pub json: Option<String>,
    /// Write the relation graph as DOT
    #[arg(long)]
    pub dot: Option<String>,
    /// Write the collected facts as JSON
    #[arg(long)]
    pub facts: Option<String>,
    #[command(flatten)]
    pub dot_args: DotArgs,
}

#[derive(Debug, Clone, Args)]
pub struct TagArgs {
    #[command(flatten)]
    pub collect: CollectArgs,
    /// Tags, comma separated or repeated
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,
    /// File with one tag per line (`#` starts a comment line)
    #[arg(long)]
    pub tags_file: Option<String>,
    /// Fraction of indexed documents retrieved per tag, in (0, 1]
    #[arg(long)]
    pub n_percent: Option<f64>,
    /// GitHub issue dump (`gh issue list --json number,title`)
    #[arg(long)]
    pub issue_json: Option<String>,
    /// Document types to index: commit_msg, issue
    #[arg(long, value_delimiter = ',')]
    pub data_types: Vec<String>,
    /// Weight files by how much their scores vary across tags
    #[arg(long, default_value_t = false)]
    pub weighting: bool,
    /// Rows the weighting penalizes: the most varying or the flattest
    #[arg(long, value_parser = ["varying", "uniform"])]
    pub weight_policy: Option<String>,
    /// Exponential rescale factor used by --weighting
    #[arg(long)]
    pub weighting_scale: Option<f64>,
    /// Keep raw ranks instead of normalizing to [0, 1]
    #[arg(long, default_value_t = false)]
    pub no_normalize: bool,
    /// Index file to load and persist (JSON)
    #[arg(long)]
    pub index: Option<String>,
    /// Write the score matrix as CSV
    #[arg(long)]
    pub csv: Option<String>,
    /// Write the tag/file score graph as DOT
    #[arg(long)]
    pub dot: Option<String>,
    #[command(flatten)]
    pub dot_args: DotArgs,
    /// Tags listed per file in the summary
    #[arg(long, default_value_t = 3)]
    pub top: usize,
    /// Output format: text or json
    #[arg(long, value_parser = ["text", "json"], default_value = "text")]
    pub format: String,
}

#[derive(Debug, Clone, Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub collect: CollectArgs,
    /// Base revision; seeds are the paths changed between --base and --head
    #[arg(long)]
    pub base: Option<String>,
    /// Head revision
    #[arg(long, default_value = "HEAD")]
    pub head: String,
    /// Seed path (repeatable), taken as given; used instead of --base
    #[arg(long, conflicts_with = "base")]
    pub seed: Vec<String>,
    /// Maximum number of expansion rounds
    #[arg(long, default_value_t = 1)]
    pub batch: usize,
    /// Output format: text or json
    #[arg(long, value_parser = ["text", "json"], default_value = "text")]
    pub format: String,
}

#[derive(Debug, Clone, Args)]
pub struct ShowArgs {
    /// CSV produced by `tag --csv`
    #[arg(long)]
    pub csv: String,
    /// Show the best tags of this file
    #[arg(long, conflicts_with = "tag")]
    pub file: Option<String>,
    /// Show the best files for this tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Top N results
    #[arg(long, default_value_t = 10)]
    pub top: usize,
    /// Output format: text or json
    #[arg(long, value_parser = ["text", "json"], default_value = "text")]
    pub format: String,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Collect history and build the relation graph
    Graph(GraphArgs),
    /// Score files against tags
    Tag(TagArgs),
    /// Widen a set of changed paths to the paths sharing issues with them
    Diff(DiffArgs),
    /// Query a saved score matrix
    Show(ShowArgs),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
