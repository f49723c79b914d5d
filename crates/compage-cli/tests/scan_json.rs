//! Integration tests for `compage scan --json` output.

use compage_core::bytecode::{dump_pyc, CodeUnitBuilder};
use compage_core::PycCompiler;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "compage-cli", "--bin", "compage", "--"]);
    cmd
}

/// Writes `mod.py` and the `.pyc` a 2.7 interpreter would produce for it.
fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("mod.py");
    std::fs::write(
        &path,
        "import os\nfrom . import sibling\n\ndef f():\n    import json\n",
    )
    .unwrap();

    let mut f = CodeUnitBuilder::function("f", "mod.py", 4);
    f.line(5).import("json", None);

    let mut m = CodeUnitBuilder::module("mod.py");
    m.line(1).import("os", None);
    m.line(2).import_from("", &["sibling"], 1);
    m.line(4).function_def(f.finish());
    std::fs::write(
        PycCompiler::pyc_path(&path),
        dump_pyc(&m.finish(), 0).unwrap(),
    )
    .unwrap();
    path
}

#[test]
fn test_scan_json_lists_records() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path());

    let output = cargo_bin()
        .args(["--json", "scan", "--pyc"])
        .arg(&path)
        .output()
        .expect("Failed to run scan command");
    assert!(output.status.success(), "scan should exit 0");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");

    assert_eq!(json["schema_version"].as_u64(), Some(1));
    assert_eq!(json["ok"].as_bool(), Some(true));
    assert_eq!(json["format"].as_str(), Some("2.7"));
    assert_eq!(json["compiler"].as_str(), Some("pyc"));
    assert_eq!(json["blake3"].as_str().map(str::len), Some(64));
    assert!(json["failures"].as_array().unwrap().is_empty());

    let imports = json["imports"].as_array().unwrap();
    let modules: Vec<_> = imports
        .iter()
        .map(|r| r["module"].as_str().unwrap())
        .collect();
    assert_eq!(modules, vec!["os", ".", "json"]);

    assert_eq!(imports[0]["line_number"].as_u64(), Some(1));
    assert_eq!(imports[0]["source_line"].as_str(), Some("import os"));
    assert_eq!(imports[0]["style"].as_str(), Some("normal"));

    assert_eq!(imports[1]["style"].as_str(), Some("relative"));
    assert_eq!(imports[1]["level"].as_u64(), Some(1));
    assert_eq!(imports[1]["fromlist"][0].as_str(), Some("sibling"));

    assert_eq!(imports[2]["line_number"].as_u64(), Some(5));
    assert_eq!(imports[2]["source_line"].as_str(), Some("    import json"));
}

#[test]
fn test_scan_missing_pyc_reports_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lonely.py");
    std::fs::write(&path, "import os\n").unwrap();

    let output = cargo_bin()
        .args(["--json", "scan", "--pyc"])
        .arg(&path)
        .output()
        .expect("Failed to run scan command");
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(json["ok"].as_bool(), Some(false));
    assert_eq!(json["error"]["code"].as_str(), Some("COMPILE_ERROR"));
    assert!(json["imports"].as_array().unwrap().is_empty());
}

#[test]
fn test_scan_unknown_format_is_usage_error() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path());

    let output = cargo_bin()
        .args(["--json", "scan", "--pyc", "--format", "3.4"])
        .arg(&path)
        .output()
        .expect("Failed to run scan command");
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(
        json["error"]["code"].as_str(),
        Some("UNSUPPORTED_BYTECODE_FORMAT")
    );
}

#[test]
fn test_scan_human_output() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path());

    let output = cargo_bin()
        .args(["scan", "--pyc"])
        .arg(&path)
        .output()
        .expect("Failed to run scan command");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("      1  os"));
    assert!(stdout.contains("      2  . (sibling) [relative, level 1]"));
    assert!(stdout.contains("      5  json"));
}
