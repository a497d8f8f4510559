use assert_cmd::prelude::*;
use git2::{Repository, Signature};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn single_commit_repo(root: &Path) {
    let repo = Repository::init(root).unwrap();
    fs::write(root.join("a.txt"), "a\n").unwrap();
    fs::write(root.join("b.txt"), "b\n").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("a.txt")).unwrap();
    index.add_path(Path::new("b.txt")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Tester", "tester@example.com").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "caching rework for #3", &tree, &[]).unwrap();
}

#[test]
fn cli_graph_prints_counts() {
    let dir = tempdir().unwrap();
    single_commit_repo(dir.path());
    let mut cmd = Command::cargo_bin("srctag").unwrap();
    cmd.arg("graph").arg("--path").arg(dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Graph built"))
        .stdout(predicate::str::contains("| issue"));
}

#[test]
fn cli_diff_json_lists_related_paths() {
    let dir = tempdir().unwrap();
    single_commit_repo(dir.path());
    let mut cmd = Command::cargo_bin("srctag").unwrap();
    cmd.args(["diff", "--seed", "a.txt", "--format", "json", "--path"]).arg(dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"related\""))
        .stdout(predicate::str::contains("b.txt"));
}

#[test]
fn cli_show_reads_csv() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("tags.csv");
    fs::write(&csv, ",caching,parser\nsrc/a.rs,1,0.5\nsrc/b.rs,0,\n").unwrap();

    let mut cmd = Command::cargo_bin("srctag").unwrap();
    cmd.arg("show").arg("--csv").arg(&csv).arg("--tag").arg("caching");
    cmd.assert().success().stdout(predicate::str::contains("src/a.rs"));

    let mut cmd = Command::cargo_bin("srctag").unwrap();
    cmd.arg("show").arg("--csv").arg(&csv).arg("--file").arg("src/a.rs").arg("--format").arg("json");
    cmd.assert().success().stdout(predicate::str::contains("\"name\": \"parser\""));

    let mut cmd = Command::cargo_bin("srctag").unwrap();
    cmd.arg("show").arg("--csv").arg(&csv);
    cmd.assert().success().stdout(predicate::str::contains("Best file"));
}

#[test]
fn cli_failures_go_to_stderr() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("srctag").unwrap();
    cmd.arg("show").arg("--csv").arg(dir.path().join("nope.csv"));
    cmd.assert().failure().stderr(predicate::str::contains("Show failed"));

    let csv = dir.path().join("bad.csv");
    fs::write(&csv, ",a\nx,notanumber\n").unwrap();
    let mut cmd = Command::cargo_bin("srctag").unwrap();
    cmd.arg("show").arg("--csv").arg(&csv);
    cmd.assert().failure().stderr(predicate::str::contains("line 2"));
}

#[test]
fn cli_completions_bash() {
    let mut cmd = Command::cargo_bin("srctag").unwrap();
    cmd.arg("completions").arg("bash");
    cmd.assert().success().stdout(predicate::str::contains("srctag"));
}
