//! CLI integration tests for barcode-store.
//!
//! These tests verify command-line argument parsing, help output, exit codes
//! for configuration and pre-flight errors, and an end-to-end dry-run import.
//! None of them need a running MySQL server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

/// Get a command for the barcode-store binary.
fn cmd() -> Command {
    Command::cargo_bin("barcode-store").unwrap()
}

/// Write a config whose import section reads `input`.
fn write_config(dir: &Path, input: &Path, batch_size: usize) -> std::path::PathBuf {
    let path = dir.join("config.yaml");
    let yaml = format!(
        "database:\n\
         \x20 host: localhost\n\
         \x20 database: products\n\
         \x20 user: loader\n\
         import:\n\
         \x20 file: {}\n\
         \x20 table: eanref\n\
         \x20 batch_size: {}\n\
         \x20 columns:\n\
         \x20   code: VARCHAR(10) PRIMARY KEY\n\
         \x20   product_name: MEDIUMTEXT\n",
        input.display(),
        batch_size
    );
    std::fs::write(&path, yaml).unwrap();
    path
}

fn write_input(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("products.tsv");
    std::fs::write(&path, contents).unwrap();
    path
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("tables"))
        .stdout(predicate::str::contains("drop-table"))
        .stdout(predicate::str::contains("lookup"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_import_subcommand_help() {
    cmd()
        .args(["import", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--file"))
        .stdout(predicate::str::contains("--table"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_serve_subcommand_help() {
    cmd()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--host"))
        .stdout(predicate::str::contains("--port"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("barcode-store"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("[default: config.yaml]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_lookup_requires_all_arguments() {
    cmd()
        .args(["lookup", "eanref", "code"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 2)
// =============================================================================

#[test]
fn test_missing_config_file_exits_with_code_1() {
    // A missing file is an IO error, not a config error
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "server:").unwrap();
    writeln!(file, "  port: 5000").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_unsupported_column_type_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  host: localhost").unwrap();
    writeln!(file, "  database: products").unwrap();
    writeln!(file, "  user: loader").unwrap();
    writeln!(file, "import:").unwrap();
    writeln!(file, "  table: eanref").unwrap();
    writeln!(file, "  columns:").unwrap();
    writeln!(file, "    price: DECIMAL(10,2)").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "import", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("price"));
}

#[test]
fn test_import_without_section_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(
        &config,
        "database:\n  host: localhost\n  database: products\n  user: loader\n",
    )
    .unwrap();

    cmd()
        .args(["--config", config.to_str().unwrap(), "import", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("import"));
}

// =============================================================================
// Import Tests (Pre-flight Exit Code 3, Dry Run)
// =============================================================================

#[test]
fn test_import_missing_file_exits_with_code_3() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &dir.path().join("missing.tsv"), 100);

    cmd()
        .args(["--config", config.to_str().unwrap(), "import"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_import_missing_column_exits_with_code_3() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "code\tname\n1\tApple\n");
    let config = write_config(dir.path(), &input, 100);

    cmd()
        .args(["--config", config.to_str().unwrap(), "import", "--dry-run"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("product_name"));
}

#[test]
fn test_dry_run_import_reports_counts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "code\tproduct_name\tbrands\n\
         1234567890123\tOat Milk\tAcme\n\
         222\tRye Bread\tAcme\n\
         333\tshort row\n\
         444\tHoney\tBees\n",
    );
    let config = write_config(dir.path(), &input, 2);

    let output = cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "--output-json",
            "--verbosity",
            "error",
            "import",
            "--dry-run",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(result["table"], "eanref");
    assert_eq!(result["rows_accepted"], 3);
    assert_eq!(result["rows_skipped"], 1);
    assert_eq!(result["fields_truncated"], 1);
    assert_eq!(result["batches_flushed"], 2);
}

#[test]
fn test_dry_run_overrides_from_flags() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &dir.path().join("missing.tsv"), 100);
    let other = dir.path().join("other.tsv");
    std::fs::write(&other, "code\tproduct_name\n1\tA\n2\tB\n3\tC\n").unwrap();

    cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "import",
            "--dry-run",
            "--file",
            other.to_str().unwrap(),
            "--table",
            "eanref_copy",
            "--batch-size",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run completed!"))
        .stdout(predicate::str::contains("Table: eanref_copy"))
        .stdout(predicate::str::contains("Rows accepted: 3"))
        .stdout(predicate::str::contains("Batches: 3"));
}

#[test]
fn test_zero_batch_size_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "code\tproduct_name\n1\tA\n");
    let config = write_config(dir.path(), &input, 100);

    cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "import",
            "--dry-run",
            "--batch-size",
            "0",
        ])
        .assert()
        .code(2);
}
