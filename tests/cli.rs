use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dive_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dive");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // Create test files
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    ).unwrap();
    fs::write(
        files_dir.join("beta.txt"),
        "Beta plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    ).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/deepdive.sqlite"

[chunking]
chunk_words = 40
overlap_words = 5

[retrieval]
round1_k = 10
round2_k = 3

[generation]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = root.join("deepdive.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dive(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dive_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dive binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Extract the document id printed by `dive add`.
fn added_document_id(stdout: &str) -> String {
    stdout
        .lines()
        .find(|l| l.trim().starts_with("document:"))
        .and_then(|l| l.split("document:").nth(1))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| panic!("No document id in output: {}", stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_dive(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/deepdive.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_dive(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_dive(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_add_and_list() {
    let (tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    let alpha = tmp.path().join("files/alpha.md");
    let (stdout, stderr, success) = run_dive(&config_path, &["add", alpha.to_str().unwrap()]);
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("added alpha.md"));
    assert!(stdout.contains("chunks: 1"));

    let (stdout, _, success) = run_dive(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("alpha.md"));
}

#[test]
fn test_list_empty_corpus() {
    let (_tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    let (stdout, _, success) = run_dive(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("no documents"));
}

#[test]
fn test_add_persists_across_invocations() {
    let (tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    let alpha = tmp.path().join("files/alpha.md");
    let beta = tmp.path().join("files/beta.txt");
    run_dive(&config_path, &["add", alpha.to_str().unwrap()]);
    run_dive(&config_path, &["add", beta.to_str().unwrap()]);

    // Each invocation is a fresh process, so listing both documents
    // proves the corpus was reloaded from the database.
    let (stdout, _, success) = run_dive(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("alpha.md"));
    assert!(stdout.contains("beta.txt"));
}

#[test]
fn test_rm_removes_document() {
    let (tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    let alpha = tmp.path().join("files/alpha.md");
    let (add_out, _, _) = run_dive(&config_path, &["add", alpha.to_str().unwrap()]);
    let doc_id = added_document_id(&add_out);

    let (stdout, stderr, success) = run_dive(&config_path, &["rm", &doc_id]);
    assert!(success, "rm failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("deleted document"));

    let (stdout, _, _) = run_dive(&config_path, &["list"]);
    assert!(stdout.contains("no documents"));
}

#[test]
fn test_rm_missing_document() {
    let (_tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    let (_, stderr, success) = run_dive(&config_path, &["rm", "nonexistent-id"]);
    assert!(!success, "rm with missing ID should fail");
    assert!(
        stderr.contains("not found"),
        "Should report not found, got: {}",
        stderr
    );
}

#[test]
fn test_clear_wipes_corpus() {
    let (tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    let alpha = tmp.path().join("files/alpha.md");
    let beta = tmp.path().join("files/beta.txt");
    run_dive(&config_path, &["add", alpha.to_str().unwrap()]);
    run_dive(&config_path, &["add", beta.to_str().unwrap()]);

    let (stdout, _, success) = run_dive(&config_path, &["clear"]);
    assert!(success);
    assert!(stdout.contains("documents removed: 2"));

    let (stdout, _, _) = run_dive(&config_path, &["list"]);
    assert!(stdout.contains("no documents"));
}

#[test]
fn test_add_unsupported_format() {
    let (tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    let pdf = tmp.path().join("files/report.pdf");
    fs::write(&pdf, b"%PDF-").unwrap();

    let (_, stderr, success) = run_dive(&config_path, &["add", pdf.to_str().unwrap()]);
    assert!(!success, "add of unsupported format should fail");
    assert!(
        stderr.contains("unsupported file format"),
        "Should mention format, got: {}",
        stderr
    );
}

#[test]
fn test_research_empty_corpus_fails_fast() {
    let (_tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    // With no documents the session fails before generation is needed,
    // so this works even with the disabled provider.
    let (stdout, stderr, success) = run_dive(&config_path, &["research", "anything"]);
    assert!(
        success,
        "research should report the failed session, not error: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("status: failed"));
    assert!(stdout.contains("no documents"));
}

#[test]
fn test_research_session_is_persisted() {
    let (_tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    let (stdout, _, _) = run_dive(&config_path, &["research", "anything"]);
    let session_id = stdout
        .lines()
        .find(|l| l.starts_with("session "))
        .and_then(|l| l.split_whitespace().nth(1))
        .map(str::to_string)
        .unwrap_or_else(|| panic!("No session id in output: {}", stdout));

    let (stdout, stderr, success) = run_dive(&config_path, &["session", &session_id]);
    assert!(
        success,
        "session lookup failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains(&session_id));
    assert!(stdout.contains("status: failed"));
    assert!(stdout.contains("query: anything"));
}

#[test]
fn test_session_missing_id() {
    let (_tmp, config_path) = setup_test_env();

    run_dive(&config_path, &["init"]);
    let (_, stderr, success) = run_dive(&config_path, &["session", "nonexistent-id"]);
    assert!(!success, "session with missing ID should fail");
    assert!(
        stderr.contains("not found"),
        "Should report not found, got: {}",
        stderr
    );
}

#[test]
fn test_missing_config_file() {
    let (tmp, _) = setup_test_env();

    let missing = tmp.path().join("nope.toml");
    let (_, stderr, success) = run_dive(&missing, &["list"]);
    assert!(!success, "Missing config should fail");
    assert!(
        stderr.contains("config"),
        "Should mention the config file, got: {}",
        stderr
    );
}
