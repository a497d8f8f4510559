use srctag::collector::{FileLevel, ScanRule};
use srctag::errors::{ConfigError, SrcTagError};
use srctag::index::DocumentKind;
use srctag::tagger::WeightPolicy;
use srctag::utils::config::{self};
use std::fs;
use std::path::Path;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    fs::write(path, content).unwrap();
}

#[test]
fn parses_full_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = tmp.path().join("srctag.toml");
    let data = r##"
[collector]
include_regex = "src/.*"
max_depth_limit = -1
file_level = "DIR"
scan_rule = "BFS"
issue_regex = "(GH-\\d+)"

[storage]
data_types = ["commit_msg"]

[storage.issue_mapping]
"#1" = "first issue"

[tagger]
tags = ["caching", "parser"]
n_percent = 0.5
weighting = true
weight_policy = "penalize_uniform"

[dot]
legend = false
theme = "dark"
rankdir = "TB"
"##;
    write(&cfg_path, data);

    let cfg = config::load_config_at(&cfg_path).expect("config parsed");
    let collector = cfg.collector.expect("collector section");
    assert_eq!(collector.include_regex.as_deref(), Some("src/.*"));
    assert_eq!(collector.max_depth_limit, -1);
    assert_eq!(collector.file_level, FileLevel::Dir);
    assert_eq!(collector.scan_rule, ScanRule::Bfs);
    assert_eq!(collector.issue_regex, "(GH-\\d+)");
    assert!(collector.include_file_list.is_empty());

    let storage = cfg.storage.expect("storage section");
    assert_eq!(storage.data_types.into_iter().collect::<Vec<_>>(), vec![DocumentKind::CommitMsg]);
    assert_eq!(storage.issue_mapping.get("#1").map(String::as_str), Some("first issue"));

    let tagger = cfg.tagger.expect("tagger section");
    assert_eq!(tagger.tags, vec!["caching".to_string(), "parser".to_string()]);
    assert!((tagger.n_percent - 0.5).abs() < f64::EPSILON);
    assert!(tagger.weighting);
    assert_eq!(tagger.weight_policy, WeightPolicy::PenalizeUniform);
    assert!(tagger.normalize);
    assert!((tagger.weighting_scale - 2.0).abs() < f64::EPSILON);

    let dot = cfg.dot.expect("dot section");
    assert_eq!(dot.legend, Some(false));
    assert_eq!(dot.theme.as_deref(), Some("dark"));
    assert_eq!(dot.rankdir.as_deref(), Some("TB"));
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    write(&tmp.path().join("srctag.toml"), "[collector]\n");
    let cfg = config::load_config_near(tmp.path()).unwrap().expect("file found");
    let collector = cfg.collector.unwrap();
    assert_eq!(collector.max_depth_limit, 16);
    assert_eq!(collector.issue_regex, "(#\\d+)");
    assert_eq!(collector.file_level, FileLevel::File);
    assert!(cfg.tagger.is_none());
}

#[test]
fn load_config_near_without_file_is_none() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(config::load_config_near(tmp.path()).unwrap().is_none());
}

#[test]
fn invalid_values_are_config_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("bad.toml");
    write(&p, "[collector]\nfile_level = \"TREE\"\n");
    let err = config::load_config_at(&p).unwrap_err();
    assert!(matches!(err, SrcTagError::Config(ConfigError::Toml { .. })));

    write(&p, "[storage]\ndata_types = [\"wiki\"]\n");
    assert!(config::load_config_at(&p).is_err());

    assert!(matches!(config::load_config_at(&tmp.path().join("absent.toml")), Err(SrcTagError::Io(_))));
}
