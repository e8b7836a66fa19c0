//! CLI tests that drive the `gw` binary. None of these need a database:
//! they cover argument parsing, config validation and the fail-fast
//! credential check.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gw_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gw"))
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
url = "postgres://127.0.0.1:1/groundwork_unused"

[retrieval]
final_limit = 12

[server]
bind = "127.0.0.1:7331"
{}
"#,
        extra
    );

    let config_path = config_dir.join("groundwork.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_gw(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = gw_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .env_remove("DATABASE_URL")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gw binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(gw_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["init", "load", "retrieve", "ask", "serve", "completions"] {
        assert!(stdout.contains(cmd), "missing {} in help:\n{}", cmd, stdout);
    }
}

#[test]
fn test_completions_need_no_config() {
    let output = Command::new(gw_binary())
        .args(["--config", "/nonexistent/groundwork.toml", "completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("gw"));
}

#[test]
fn test_missing_config_file_fails() {
    let (stdout, stderr, success) = run_gw(
        Path::new("/nonexistent/groundwork.toml"),
        &["retrieve", "pricing", "--team", "T1", "--user", "U1"],
    );
    assert!(!success, "stdout={}", stdout);
    assert!(stderr.contains("Failed to read config file"), "stderr={}", stderr);
}

#[test]
fn test_invalid_weights_rejected() {
    let (_tmp, config_path) = setup_test_env("");
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("final_limit = 12", "final_limit = 12\nvector_weight = 0.9");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_gw(
        &config_path,
        &["retrieve", "pricing", "--team", "T1", "--user", "U1"],
    );
    assert!(!success);
    assert!(stderr.contains("sum to 1.0"), "stderr={}", stderr);
}

#[test]
fn test_retrieve_requires_principal() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, stderr, success) = run_gw(&config_path, &["retrieve", "pricing", "--team", "T1"]);
    assert!(!success);
    assert!(stderr.contains("--user"), "stderr={}", stderr);
}

#[test]
fn test_missing_api_key_fails_before_connecting() {
    let (_tmp, config_path) = setup_test_env(
        r#"
[embedding]
provider = "openai"

[generation]
provider = "openai"
"#,
    );
    let (_, stderr, success) = run_gw(
        &config_path,
        &["ask", "How is pricing decided?", "--team", "T1", "--user", "U1"],
    );
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr={}", stderr);
    assert!(!stderr.contains("Postgres"), "stderr={}", stderr);
}

#[test]
fn test_load_rejects_malformed_file() {
    let (tmp, config_path) = setup_test_env("");
    let file = tmp.path().join("seed.json");
    fs::write(&file, "{ not json").unwrap();

    let (_, stderr, success) = run_gw(&config_path, &["load", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Failed to parse load file"), "stderr={}", stderr);
}
