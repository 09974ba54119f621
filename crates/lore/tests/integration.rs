use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lore_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lore");
    path
}

/// Temp workspace with a config (embedding disabled) and three documents:
/// one with a body, one heading-only, one empty. Only the first has
/// sections, so only it needs the embedding provider.
fn setup_test_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(docs_dir.join("guides")).unwrap();
    fs::write(
        docs_dir.join("guides/alpha.md"),
        "---\ntags: [rust]\n---\n# Alpha\n\n## Build\n\nRun cargo build.\n",
    )
    .unwrap();
    fs::write(docs_dir.join("heading-only.md"), "# Nothing below\n").unwrap();
    fs::write(docs_dir.join("empty.txt"), "").unwrap();
    fs::write(docs_dir.join("ignored.rs"), "fn main() {}").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/lore.sqlite"

[source]
root = "{root}/docs"
{extra_config}
"#,
        root = root.display(),
        extra_config = extra_config,
    );

    let config_path = config_dir.join("lore.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_lore(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lore_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lore binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_lore(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/lore.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, _, first) = run_lore(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_lore(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_index_with_embedding_disabled() {
    let (_tmp, config_path) = setup_test_env("");
    run_lore(&config_path, &["init"]);

    let (stdout, stderr, success) = run_lore(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("scanned: 3 documents"), "got: {}", stdout);
    assert!(stdout.contains("changed: 2"), "got: {}", stdout);
    assert!(stdout.contains("failed: 1"), "got: {}", stdout);
    assert!(stdout.contains("guides/alpha.md: embedding provider error"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_index_rerun_skips_unchanged() {
    let (_tmp, config_path) = setup_test_env("");
    run_lore(&config_path, &["init"]);
    run_lore(&config_path, &["index"]);

    let (stdout, _, success) = run_lore(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("unchanged: 2"), "got: {}", stdout);
    assert!(stdout.contains("changed: 0"), "got: {}", stdout);
    // Nothing was written for the failed document, so it is retried.
    assert!(stdout.contains("failed: 1"), "got: {}", stdout);
}

#[test]
fn test_index_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env("");
    run_lore(&config_path, &["init"]);

    let (stdout, _, success) = run_lore(&config_path, &["index", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("would insert: 3"), "got: {}", stdout);
    assert!(stdout.contains("estimated sections: 1"), "got: {}", stdout);

    let (stats, _, _) = run_lore(&config_path, &["stats"]);
    assert!(stats.contains("Documents:     0"), "got: {}", stats);
}

#[test]
fn test_index_removes_deleted_files() {
    let (tmp, config_path) = setup_test_env("");
    run_lore(&config_path, &["init"]);
    run_lore(&config_path, &["index"]);

    fs::remove_file(tmp.path().join("docs/empty.txt")).unwrap();
    let (stdout, _, success) = run_lore(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("removed: 1"), "got: {}", stdout);
    assert!(stdout.contains("    empty.txt"), "got: {}", stdout);

    let (stats, _, _) = run_lore(&config_path, &["stats"]);
    assert!(stats.contains("Documents:     1"), "got: {}", stats);
}

#[test]
fn test_stats_after_index() {
    let (_tmp, config_path) = setup_test_env("");
    run_lore(&config_path, &["init"]);
    run_lore(&config_path, &["index"]);

    let (stdout, _, success) = run_lore(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:     2"), "got: {}", stdout);
    assert!(stdout.contains("Sections:      0"), "got: {}", stdout);
    assert!(stdout.contains("Conversations: 0"), "got: {}", stdout);
}

#[test]
fn test_conversations_empty() {
    let (_tmp, config_path) = setup_test_env("");
    run_lore(&config_path, &["init"]);

    let (stdout, _, success) = run_lore(&config_path, &["conversations"]);
    assert!(success);
    assert!(stdout.contains("No conversations."));
}

#[test]
fn test_context_errors_when_embedding_disabled() {
    let (_tmp, config_path) = setup_test_env("");
    run_lore(&config_path, &["init"]);

    let (_, stderr, success) = run_lore(&config_path, &["context", "how to build"]);
    assert!(!success, "context should fail without an embedding provider");
    assert!(stderr.contains("disabled"), "got: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env("\n[context]\nmatch_count = 0\n");

    let (_, stderr, success) = run_lore(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("match_count"), "got: {}", stderr);
}

#[test]
fn test_path_exists_policy_config_accepted() {
    let (_tmp, config_path) = setup_test_env("\n[indexing]\nchange_policy = \"path-exists\"\n");
    let (_, stderr, success) = run_lore(&config_path, &["init"]);
    assert!(success, "got: {}", stderr);
}
