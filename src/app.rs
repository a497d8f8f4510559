use crate::cli::{Cli, CollectArgs, Commands, DiffArgs, DotArgs, GraphArgs, ShowArgs, TagArgs};
use crate::collector::{Collection, Collector, CollectorConfig};
use crate::errors::{ConfigError, SrcTagError};
use crate::index::parse_data_types;
use crate::index::storage::{EmbedReport, Storage};
use crate::model::TagResult;
use crate::propagate::{DiffPropagation, PropagationReport};
use crate::tagger::{ScoringMode, TagReport, Tagger};
use crate::utils::config::{load_config_at, load_config_near, Config, DotConfig};
use crate::utils::table;
use crate::visualization::{DotGenerator, DotOptions, DotTheme, RankDir};
use clap::CommandFactory;
use clap_complete::generate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Run the CLI logic in-process.
///
/// Returns an exit code (0 = success). Failures are reported on stderr as
/// `"<Action> failed: <error>"`.
#[must_use]
pub fn run_cli(cli: Cli) -> i32 {
    let Cli { config, quiet, verbose: _, command } = cli;
    let config = config.as_deref();
    let (action, outcome) = match command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = env!("CARGO_PKG_NAME");
            let mut out = io::stdout();
            generate(shell, &mut cmd, bin_name, &mut out);
            return 0;
        }
        Commands::Graph(args) => ("Graph", run_graph(config, quiet, &args)),
        Commands::Tag(args) => ("Tag", run_tag(config, quiet, &args)),
        Commands::Diff(args) => ("Diff", run_diff(config, quiet, &args)),
        Commands::Show(args) => ("Show", run_show(&args)),
    };
    match outcome {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{action} failed: {e}");
            1
        }
    }
}

// An explicit --config must exist; otherwise srctag.toml next to the repo is optional.
fn file_config(explicit: Option<&str>, collect: &CollectArgs) -> Result<Config, SrcTagError> {
    match explicit {
        Some(p) => load_config_at(Path::new(p)),
        None => {
            let root = collect.path.as_deref().unwrap_or(".");
            Ok(load_config_near(Path::new(root))?.unwrap_or_default())
        }
    }
}

fn collector_config(args: &CollectArgs, base: Option<CollectorConfig>) -> Result<CollectorConfig, SrcTagError> {
    let mut cfg = base.unwrap_or_default();
    if let Some(v) = &args.path {
        cfg.repo_root = PathBuf::from(v);
    }
    if let Some(v) = &args.include {
        cfg.include_regex = Some(v.clone());
    }
    if !args.include_files.is_empty() {
        cfg.include_file_list.clone_from(&args.include_files);
    }
    if let Some(v) = &args.commit_include {
        cfg.commit_include_regex = Some(v.clone());
    }
    if let Some(v) = args.max_depth {
        cfg.max_depth_limit = v;
    }
    if let Some(v) = &args.file_level {
        cfg.file_level = v.parse()?;
    }
    if let Some(v) = &args.scan_rule {
        cfg.scan_rule = v.parse()?;
    }
    if let Some(v) = &args.issue_regex {
        cfg.issue_regex.clone_from(v);
    }
    Ok(cfg)
}

fn collect_repo(cfg: CollectorConfig) -> Result<Collection, SrcTagError> {
    let collector = Collector::new(cfg)?;
    let repo = collector.open_repo()?;
    collector.collect(&repo)
}

fn parse_theme(v: &str) -> DotTheme {
    if v.eq_ignore_ascii_case("dark") {
        DotTheme::Dark
    } else {
        DotTheme::Light
    }
}

fn parse_rankdir(v: &str) -> RankDir {
    if v.eq_ignore_ascii_case("TB") {
        RankDir::TB
    } else {
        RankDir::LR
    }
}

// Config file values first, then flags.
fn dot_options(args: &DotArgs, file: Option<&DotConfig>) -> DotOptions {
    let mut opts = DotOptions::default();
    if let Some(dot) = file {
        if let Some(v) = dot.legend {
            opts.legend = v;
        }
        if let Some(v) = &dot.theme {
            opts.theme = parse_theme(v);
        }
        if let Some(v) = &dot.rankdir {
            opts.rankdir = parse_rankdir(v);
        }
    }
    if let Some(v) = &args.dot_legend {
        opts.legend = v == "on";
    }
    if let Some(v) = &args.dot_theme {
        opts.theme = parse_theme(v);
    }
    if let Some(v) = &args.dot_rankdir {
        opts.rankdir = parse_rankdir(v);
    }
    opts
}

fn run_graph(config: Option<&str>, quiet: bool, args: &GraphArgs) -> Result<(), SrcTagError> {
    let file = file_config(config, &args.collect)?;
    let cfg = collector_config(&args.collect, file.collector)?;
    let Collection { facts, graph } = collect_repo(cfg)?;

    if let Some(p) = &args.json {
        graph.save_json(Path::new(p))?;
    }
    if let Some(p) = &args.dot {
        let opts = dot_options(&args.dot_args, file.dot.as_ref());
        fs::write(p, DotGenerator::new().generate_dot_with_options(&graph.to_visual(), opts))?;
    }
    if let Some(p) = &args.facts {
        facts.save_json(Path::new(p))?;
    }

    if !quiet {
        let [files, commits, issues, tags] = graph.kind_counts();
        let rows: Vec<Vec<String>> = [("file", files), ("commit", commits), ("issue", issues), ("tag", tags)]
            .into_iter()
            .map(|(k, n)| vec![k.to_string(), n.to_string()])
            .collect();
        println!("{}", table::render(&["Kind", "Nodes"], &rows));
        println!("Graph built: {} nodes, {} edges", graph.node_count(), graph.edge_count());
    }
    Ok(())
}

#[derive(Serialize)]
struct TagSummary<'a> {
    mode: ScoringMode,
    tags: &'a [String],
    files: BTreeMap<String, Vec<(String, f64)>>,
    report: &'a TagReport,
    embed: &'a EmbedReport,
}

fn read_tags_file(path: &str) -> Result<Vec<String>, SrcTagError> {
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn run_tag(config: Option<&str>, quiet: bool, args: &TagArgs) -> Result<(), SrcTagError> {
    let file = file_config(config, &args.collect)?;

    let mut tagger_cfg = file.tagger.unwrap_or_default();
    let mut tags = args.tags.clone();
    if let Some(p) = &args.tags_file {
        tags.extend(read_tags_file(p)?);
    }
    if !tags.is_empty() {
        tagger_cfg.tags = tags;
    }
    if tagger_cfg.tags.iter().all(|t| t.trim().is_empty()) {
        return Err(ConfigError::MissingInput("no tags given, pass --tags or --tags-file").into());
    }
    if let Some(v) = args.n_percent {
        tagger_cfg.n_percent = v;
    }
    if args.weighting {
        tagger_cfg.weighting = true;
    }
    if let Some(v) = args.weighting_scale {
        tagger_cfg.weighting_scale = v;
    }
    if let Some(v) = &args.weight_policy {
        tagger_cfg.weight_policy = v.parse()?;
    }
    if args.no_normalize {
        tagger_cfg.normalize = false;
    }
    let tagger = Tagger::new(tagger_cfg)?;

    let mut storage_cfg = file.storage.unwrap_or_default();
    if !args.data_types.is_empty() {
        storage_cfg.data_types = parse_data_types(&args.data_types)?;
    }
    if let Some(p) = &args.index {
        storage_cfg.db_path = Some(PathBuf::from(p));
    }
    if let Some(p) = &args.issue_json {
        storage_cfg.load_issue_mapping_from_gh_json(Path::new(p))?;
    }

    let cfg = collector_config(&args.collect, file.collector)?;
    let collection = collect_repo(cfg)?;
    let storage = Storage::new(storage_cfg);
    let mut index = storage.open_index()?;
    let embed = storage.embed(&collection.facts, &collection.graph, &mut index);
    storage.persist_index(&index)?;

    let run = tagger.tag(&index, collection.graph);
    if let Some(p) = &args.csv {
        run.result.export_csv(Path::new(p))?;
    }
    if let Some(p) = &args.dot {
        let opts = dot_options(&args.dot_args, file.dot.as_ref());
        fs::write(p, DotGenerator::new().generate_dot_with_options(&run.result.export_graph(), opts))?;
    }

    let files: BTreeMap<String, Vec<(String, f64)>> = run
        .result
        .files()
        .into_iter()
        .map(|f| (f.to_string(), run.result.top_n_tags(f, args.top)))
        .collect();

    if args.format == "json" {
        let summary =
            TagSummary { mode: run.mode, tags: run.result.tags(), files, report: &run.report, embed: &embed };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }
    let rows: Vec<Vec<String>> = files
        .iter()
        .map(|(f, top)| {
            let cells: Vec<String> = top.iter().map(|(t, s)| format!("{t} ({s:.3})")).collect();
            vec![f.clone(), cells.join(", ")]
        })
        .collect();
    println!("{}", table::render(&["File", "Top tags"], &rows));
    println!(
        "Tagged {} file(s) with {} tag(s) in {} mode ({} commit and {} issue document(s), {} per tag)",
        rows.len(),
        run.result.tags().len(),
        run.mode,
        embed.commit_docs,
        embed.issue_docs,
        run.report.limit,
    );
    if !run.report.empty_tags.is_empty() {
        println!("Tags without hits: {}", run.report.empty_tags.join(", "));
    }
    for (tag, err) in &run.report.failed_tags {
        println!("Tag `{tag}` failed: {err}");
    }
    if !run.report.missing_issues.is_empty() {
        let ids: Vec<&str> = run.report.missing_issues.iter().map(String::as_str).collect();
        println!("Issues outside the collected scope: {}", ids.join(", "));
    }
    Ok(())
}

#[derive(Serialize)]
struct DiffSummary<'a> {
    seeds: &'a BTreeSet<String>,
    added: Vec<&'a String>,
    #[serde(flatten)]
    report: &'a PropagationReport,
}

fn run_diff(config: Option<&str>, quiet: bool, args: &DiffArgs) -> Result<(), SrcTagError> {
    let file = file_config(config, &args.collect)?;
    let cfg = collector_config(&args.collect, file.collector)?;
    let collector = Collector::new(cfg)?;
    let repo = collector.open_repo()?;

    let seeds: BTreeSet<String> = match &args.base {
        Some(base) => {
            repo.changed_between(base, &args.head)?.iter().map(|p| collector.level_path(p)).collect()
        }
        None if args.seed.is_empty() => {
            return Err(ConfigError::MissingInput("no seeds given, pass --seed or --base").into());
        }
        None => args.seed.iter().cloned().collect(),
    };
    log::info!("{} seed path(s)", seeds.len());

    let collection = collector.collect(&repo)?;
    let report = DiffPropagation::new(args.batch).propagate(&collection.graph, seeds.iter().cloned());

    if args.format == "json" {
        let summary = DiffSummary { seeds: &seeds, added: report.added(&seeds).collect(), report: &report };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = report
        .related
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let origin = if seeds.contains(p) { "seed" } else { "related" };
            vec![format!("{}", i + 1), p.clone(), origin.to_string()]
        })
        .collect();
    println!("{}", table::render(&["#", "Path", "Origin"], &rows));
    if !quiet {
        println!(
            "{} related path(s) after {} round(s){}",
            report.related.len(),
            report.rounds,
            if report.fixpoint { ", fixpoint reached" } else { "" }
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct Scored<'a> {
    name: &'a str,
    score: f64,
}

fn print_ranking(label: &str, ranking: &[(String, f64)], format: &str) -> Result<(), SrcTagError> {
    if format == "json" {
        let out: Vec<Scored<'_>> = ranking.iter().map(|(n, s)| Scored { name: n, score: *s }).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if ranking.is_empty() {
        println!("<no scores>");
    } else {
        let rows: Vec<Vec<String>> = ranking
            .iter()
            .enumerate()
            .map(|(i, (n, s))| vec![format!("{}", i + 1), n.clone(), format!("{s:.4}")])
            .collect();
        println!("{}", table::render(&["#", label, "Score"], &rows));
    }
    Ok(())
}

fn run_show(args: &ShowArgs) -> Result<(), SrcTagError> {
    let result = TagResult::import_csv(Path::new(&args.csv))?;
    if let Some(f) = &args.file {
        return print_ranking("Tag", &result.top_n_tags(f, args.top), &args.format);
    }
    if let Some(t) = &args.tag {
        return print_ranking("File", &result.top_n_files(t, args.top), &args.format);
    }

    #[derive(Serialize)]
    struct Overview<'a> {
        tag: &'a str,
        files: usize,
        best: Option<String>,
    }
    let overview: Vec<Overview<'_>> = result
        .tags()
        .iter()
        .map(|t| {
            let column = result.scores_for_tag(t);
            Overview { tag: t, files: column.len(), best: column.into_iter().next().map(|(f, _)| f) }
        })
        .collect();
    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&overview)?);
    } else {
        let rows: Vec<Vec<String>> = overview
            .iter()
            .map(|o| vec![o.tag.to_string(), o.files.to_string(), o.best.clone().unwrap_or_default()])
            .collect();
        println!("{}", table::render(&["Tag", "Scored files", "Best file"], &rows));
    }
    Ok(())
}
