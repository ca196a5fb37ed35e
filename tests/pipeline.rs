//! End-to-end pipeline tests driving the `qry` binary.
//!
//! Covers the full sync → search flow against a real temp directory:
//! initial indexing, idempotent re-sync, content-change detection,
//! deletion completeness, and ranked retrieval.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn qry_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("qry");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();
    fs::create_dir_all(root.join("files")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/quarry.sqlite"

[manifest]
path = "{}/data/manifest.json"

[chunking]
max_chars = 800

[embedding]
dims = 256

[retrieval]
final_limit = 10
min_similarity = 0.05

[sources.filesystem]
root = "{}/files"
extensions = ["txt", "md"]
exclude_globs = []
follow_symlinks = false
"#,
        root.display(),
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("quarry.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_qry(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = qry_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run qry binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn end_to_end_index_and_search() {
    let (tmp, config_path) = setup_test_env();
    let files_dir = tmp.path().join("files");
    fs::write(files_dir.join("fox.txt"), "The quick brown fox").unwrap();

    let (stdout, stderr, ok) = run_qry(&config_path, &["init"]);
    assert!(ok, "init failed: {} {}", stdout, stderr);

    let (stdout, stderr, ok) = run_qry(&config_path, &["sync"]);
    assert!(ok, "sync failed: {} {}", stdout, stderr);
    assert!(stdout.contains("files added: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("records added: 1"), "stdout: {}", stdout);

    // Related query finds the record.
    let (stdout, _, ok) = run_qry(&config_path, &["search", "quick fox"]);
    assert!(ok);
    assert!(stdout.contains("fox.txt"), "stdout: {}", stdout);

    // An unrelated query with a strict threshold yields nothing.
    let (stdout, _, ok) = run_qry(
        &config_path,
        &["search", "database replication lag", "--min-score", "0.9"],
    );
    assert!(ok);
    assert!(stdout.contains("No results."), "stdout: {}", stdout);
}

#[test]
fn resync_without_changes_is_a_noop() {
    let (tmp, config_path) = setup_test_env();
    let files_dir = tmp.path().join("files");
    fs::write(files_dir.join("alpha.md"), "# Alpha\n\nNotes about Rust.").unwrap();
    fs::write(files_dir.join("beta.txt"), "Beta notes about deployment.").unwrap();

    run_qry(&config_path, &["init"]);
    let (stdout, _, ok) = run_qry(&config_path, &["sync"]);
    assert!(ok);
    assert!(stdout.contains("files added: 2"), "stdout: {}", stdout);

    let manifest_path = tmp.path().join("data/manifest.json");
    let manifest_before = fs::read(&manifest_path).unwrap();

    let (stdout, _, ok) = run_qry(&config_path, &["sync"]);
    assert!(ok);
    assert!(stdout.contains("files added: 0"), "stdout: {}", stdout);
    assert!(stdout.contains("files updated: 0"), "stdout: {}", stdout);
    assert!(stdout.contains("files removed: 0"), "stdout: {}", stdout);
    assert!(stdout.contains("records added: 0"), "stdout: {}", stdout);

    let manifest_after = fs::read(&manifest_path).unwrap();
    assert_eq!(manifest_before, manifest_after);
}

#[test]
fn content_change_triggers_update() {
    let (tmp, config_path) = setup_test_env();
    let files_dir = tmp.path().join("files");
    fs::write(files_dir.join("doc.txt"), "original content here").unwrap();

    run_qry(&config_path, &["init"]);
    run_qry(&config_path, &["sync"]);

    fs::write(files_dir.join("doc.txt"), "completely rewritten content").unwrap();
    let (stdout, _, ok) = run_qry(&config_path, &["sync"]);
    assert!(ok);
    assert!(stdout.contains("files updated: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("records added: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("records removed: 1"), "stdout: {}", stdout);

    let (stdout, _, ok) = run_qry(&config_path, &["search", "rewritten content"]);
    assert!(ok);
    assert!(stdout.contains("doc.txt"), "stdout: {}", stdout);
}

#[test]
fn deleted_file_is_fully_removed() {
    let (tmp, config_path) = setup_test_env();
    let files_dir = tmp.path().join("files");
    fs::write(files_dir.join("keep.txt"), "kept document content").unwrap();
    fs::write(files_dir.join("gone.txt"), "doomed document content").unwrap();

    run_qry(&config_path, &["init"]);
    run_qry(&config_path, &["sync"]);

    fs::remove_file(files_dir.join("gone.txt")).unwrap();
    let (stdout, _, ok) = run_qry(&config_path, &["sync"]);
    assert!(ok);
    assert!(stdout.contains("files removed: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("records removed: 1"), "stdout: {}", stdout);

    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("data/manifest.json")).unwrap(),
    )
    .unwrap();
    let entries = manifest["entries"].as_object().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries.keys().all(|k| k.ends_with("keep.txt")));

    let (stdout, _, ok) = run_qry(&config_path, &["stats"]);
    assert!(ok);
    assert!(stdout.contains("Records:         1"), "stdout: {}", stdout);
}

#[test]
fn corrupt_manifest_forces_full_reindex() {
    let (tmp, config_path) = setup_test_env();
    let files_dir = tmp.path().join("files");
    fs::write(files_dir.join("doc.txt"), "some document content").unwrap();

    run_qry(&config_path, &["init"]);
    run_qry(&config_path, &["sync"]);

    // Corrupt the manifest: next sync must treat everything as new instead
    // of failing.
    fs::write(tmp.path().join("data/manifest.json"), "{ garbage").unwrap();
    let (stdout, stderr, ok) = run_qry(&config_path, &["sync"]);
    assert!(ok, "sync failed: {} {}", stdout, stderr);
    assert!(stdout.contains("files added: 1"), "stdout: {}", stdout);
}

#[test]
fn get_prints_document_by_id() {
    let (tmp, config_path) = setup_test_env();
    let files_dir = tmp.path().join("files");
    fs::write(files_dir.join("doc.txt"), "retrievable body text").unwrap();

    run_qry(&config_path, &["init"]);
    run_qry(&config_path, &["sync"]);

    let (stdout, _, ok) = run_qry(&config_path, &["get", "1"]);
    assert!(ok);
    assert!(stdout.contains("doc.txt"), "stdout: {}", stdout);
    assert!(stdout.contains("retrievable body text"), "stdout: {}", stdout);

    let (_, stderr, ok) = run_qry(&config_path, &["get", "999"]);
    assert!(!ok);
    assert!(stderr.contains("document not found"), "stderr: {}", stderr);
}

#[test]
fn blank_query_returns_no_results() {
    let (_tmp, config_path) = setup_test_env();
    run_qry(&config_path, &["init"]);
    let (stdout, _, ok) = run_qry(&config_path, &["search", "   "]);
    assert!(ok);
    assert!(stdout.contains("No results."), "stdout: {}", stdout);
}
