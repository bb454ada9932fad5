use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lextree_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_lextree"))
}

const TAX_ACT: &str = "# Definitions\n\
[[PAGE 1]]\n\
Words used in this Act have the meanings given below.\n\
## Person\n\
A person includes a company or a trust.\n\
## Return\n\
A return is a statement filed with the commissioner.\n\
# Penalties\n\
[[PAGE 2]]\n\
Penalties apply for breaches of this Act.\n\
## Late filing\n\
The penalty for late filing of a return is a fine of fifty units.\n\
## Repeat offences\n\
[[PAGE 3]]\n\
A repeat offence attracts double the fine.\n\
## Appeals\n\
A penalty may be appealed to the tribunal within thirty days.\n\
# Commencement\n\
[[PAGE 4]]\n\
This Act commences on the day it receives assent.\n";

const RENT_ACT: &str = "# Rent\n[[PAGE 1]]\nRent is payable monthly in advance.\n";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let acts_dir = root.join("acts");
    fs::create_dir_all(acts_dir.join("drafts")).unwrap();
    fs::write(acts_dir.join("tax_act.md"), TAX_ACT).unwrap();
    fs::write(acts_dir.join("rent_act.txt"), RENT_ACT).unwrap();
    fs::write(acts_dir.join("drafts/unfinished.md"), "# Draft\nTBD.\n").unwrap();
    fs::write(acts_dir.join("scan.pdf"), "not text").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/lextree.sqlite"

[ingestion]
exclude_globs = ["drafts/**"]

[retrieval]
top_h1 = 3
top_h2 = 4
"#,
        root.display()
    );

    let config_path = config_dir.join("lextree.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_lextree(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lextree_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lextree binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn ingest_tax_act(tmp: &TempDir, config_path: &Path) {
    let file = tmp.path().join("acts/tax_act.md");
    let (stdout, stderr, success) = run_lextree(config_path, &["ingest", file.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lextree(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/lextree.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_lextree(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_lextree(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_single_file() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);

    let file = tmp.path().join("acts/tax_act.md");
    let (stdout, stderr, success) = run_lextree(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("-> tax_act"));
    assert!(stdout.contains("top sections: 3"));
    assert!(stdout.contains("sub sections: 6"));
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_ingest_directory_applies_globs() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);

    let dir = tmp.path().join("acts");
    let (stdout, stderr, success) = run_lextree(&config_path, &["ingest", dir.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents ingested: 2"));
    assert!(!stdout.contains("unfinished"));

    let (stdout, _, success) = run_lextree(&config_path, &["docs"]);
    assert!(success);
    assert!(stdout.contains("rent_act"));
    assert!(stdout.contains("tax_act.pdf"));
    assert!(!stdout.contains("unfinished"));
}

#[test]
fn test_reingest_unchanged_is_skipped() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);
    ingest_tax_act(&tmp, &config_path);

    let file = tmp.path().join("acts/tax_act.md");
    let (stdout, _, success) = run_lextree(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("unchanged"), "expected skip, got: {}", stdout);

    let (stdout, _, success) =
        run_lextree(&config_path, &["ingest", file.to_str().unwrap(), "--force"]);
    assert!(success);
    assert!(stdout.contains("top sections: 3"));
}

#[test]
fn test_ingest_with_overrides() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);

    let file = tmp.path().join("acts/tax_act.md");
    let (_, stderr, success) = run_lextree(
        &config_path,
        &[
            "ingest",
            file.to_str().unwrap(),
            "--doc-id",
            "tax2020",
            "--pdf-name",
            "Tax Act 2020.pdf",
        ],
    );
    assert!(success, "ingest failed: {}", stderr);

    let (stdout, _, success) = run_lextree(&config_path, &["ask", "tax2020", "penalty"]);
    assert!(success);
    assert!(stdout.contains("- Tax Act 2020.pdf p.2, 3 [h1_02]"), "got: {}", stdout);
}

#[test]
fn test_ask_overview_query() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);
    ingest_tax_act(&tmp, &config_path);

    let (stdout, stderr, success) = run_lextree(&config_path, &["ask", "tax_act", "penalty"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.starts_with("Retrieved statutory context (no additional interpretation applied):"));
    assert!(stdout.contains("- Penalties"));
    assert!(stdout.contains("Citations:"));
    assert!(stdout.contains("- tax_act.pdf p.2, 3 [h1_02]"));
}

#[test]
fn test_ask_detail_query_json() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);
    ingest_tax_act(&tmp, &config_path);

    let (stdout, stderr, success) = run_lextree(
        &config_path,
        &["ask", "tax_act", "what is the penalty for late filing", "--json"],
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);

    let payload: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let chunks = payload["chunks"].as_array().unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks.len() <= 4);
    assert_eq!(chunks[0]["node_id"], "h2_02_01");
    assert_eq!(chunks[0]["parent_h1"], "h1_02");
    assert!(payload["citations"][0]
        .as_str()
        .unwrap()
        .ends_with("[h2_02_01]"));
    assert!(payload["answer"].as_str().unwrap().contains("Citations:"));
}

#[test]
fn test_ask_top_h2_override() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);
    ingest_tax_act(&tmp, &config_path);

    let (stdout, _, success) = run_lextree(
        &config_path,
        &["ask", "tax_act", "what is the penalty for late filing", "--json", "--top-h2", "1"],
    );
    assert!(success);
    let payload: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(payload["chunks"].as_array().unwrap().len(), 1);
}

#[test]
fn test_ask_deterministic() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);
    ingest_tax_act(&tmp, &config_path);

    let args = ["ask", "tax_act", "how are repeat offences punished"];
    let (stdout1, _, _) = run_lextree(&config_path, &args);
    let (stdout2, _, _) = run_lextree(&config_path, &args);
    assert_eq!(stdout1, stdout2, "answers should be deterministic");
}

#[test]
fn test_ask_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);

    let (_, stderr, success) = run_lextree(&config_path, &["ask", "missing", "penalty"]);
    assert!(!success);
    assert!(stderr.contains("document not found"));
}

#[test]
fn test_read_commands_before_init() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lextree(&config_path, &["docs"]);
    assert!(success, "docs failed: {}", stderr);
    assert!(stdout.contains("No documents."));

    let (_, stderr, success) = run_lextree(&config_path, &["ask", "tax_act", "penalty"]);
    assert!(!success);
    assert!(stderr.contains("document not found"), "got: {}", stderr);
    assert!(!stderr.contains("no such table"));

    let (_, stderr, success) = run_lextree(&config_path, &["show", "tax_act"]);
    assert!(!success);
    assert!(stderr.contains("document not found"), "got: {}", stderr);
}

#[test]
fn test_show_outline() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);
    ingest_tax_act(&tmp, &config_path);

    let (stdout, stderr, success) = run_lextree(&config_path, &["show", "tax_act"]);
    assert!(success, "show failed: {}", stderr);
    assert!(stdout.contains("pages:  1, 2, 3, 4"));
    assert!(stdout.contains("[h1_02] Penalties (p.2, 3)"));
    assert!(stdout.contains("  [h2_02_02] Repeat offences (p.3)"));
    assert!(stdout.contains("  [h2_03_01] Commencement (p.4)"));
}

#[test]
fn test_expand_neighbors() {
    let (tmp, config_path) = setup_test_env();
    run_lextree(&config_path, &["init"]);
    ingest_tax_act(&tmp, &config_path);

    let (stdout, stderr, success) = run_lextree(&config_path, &["expand", "tax_act", "h2_02_01"]);
    assert!(success, "expand failed: {}", stderr);
    let ids: Vec<&str> = stdout.lines().collect();
    assert_eq!(ids, vec!["h2_02_01", "h2_02_02"]);

    let (stdout, _, success) = run_lextree(
        &config_path,
        &["expand", "tax_act", "h2_02_02", "--window", "5"],
    );
    assert!(success);
    assert_eq!(stdout.lines().count(), 3);

    let (_, stderr, success) = run_lextree(&config_path, &["expand", "tax_act", "h2_09_09"]);
    assert!(!success);
    assert!(stderr.contains("sub-section not found"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{}/x.sqlite\"\n[retrieval]\nbm25_b = 2.0\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_lextree(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("bm25_b"));
}

#[test]
fn test_missing_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_lextree(&tmp.path().join("nope.toml"), &["docs"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
