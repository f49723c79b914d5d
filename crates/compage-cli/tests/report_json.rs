//! Integration tests for `compage report`.

use compage_core::bytecode::{dump_pyc, CodeUnitBuilder};
use compage_core::PycCompiler;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "compage-cli", "--bin", "compage", "--"]);
    cmd
}

fn write_module(root: &Path, rel: &str, imports: &[&str]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let source: String = imports.iter().map(|m| format!("import {m}\n")).collect();
    std::fs::write(&path, source).unwrap();

    let mut m = CodeUnitBuilder::module(rel);
    for (i, module) in imports.iter().enumerate() {
        m.line(u32::try_from(i).unwrap() + 1).import(module, None);
    }
    std::fs::write(
        PycCompiler::pyc_path(&path),
        dump_pyc(&m.finish(), 0).unwrap(),
    )
    .unwrap();
}

fn project(root: &Path) {
    write_module(root, "app.py", &["os", "requests", "os.path"]);
    write_module(root, "pkg/util.py", &["sys", "requests"]);
}

fn run_json(args: &[&str], root: &Path) -> (Option<i32>, serde_json::Value) {
    let output = cargo_bin()
        .arg("--json")
        .args(args)
        .arg(root)
        .output()
        .expect("Failed to run report command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json = serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    (output.status.code(), json)
}

#[test]
fn test_report_json_index() {
    let dir = tempdir().unwrap();
    project(dir.path());

    let (code, json) = run_json(&["report", "--pyc", "--jobs", "2"], dir.path());
    assert_eq!(code, Some(0));
    assert_eq!(json["schema_version"].as_u64(), Some(1));
    assert_eq!(json["ok"].as_bool(), Some(true));
    assert_eq!(json["files_scanned"].as_u64(), Some(2));

    let modules = json["modules"].as_object().unwrap();
    let names: Vec<_> = modules.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["os", "requests", "sys"]);

    let app = dir.path().join("app.py").display().to_string();
    let os = modules["os"][&app].as_array().unwrap();
    assert_eq!(os.len(), 2);
    assert_eq!(os[1]["line"].as_u64(), Some(3));
    assert_eq!(os[1]["source"].as_str(), Some("import os.path"));
    assert_eq!(modules["requests"].as_object().unwrap().len(), 2);
}

#[test]
fn test_report_rank_and_dependencies() {
    let dir = tempdir().unwrap();
    project(dir.path());

    let (_, rank) = run_json(&["report", "--pyc", "--rank"], dir.path());
    let entries = rank["rank"].as_array().unwrap();
    assert_eq!(entries[0]["module"].as_str(), Some("os"));
    assert_eq!(entries[0]["count"].as_u64(), Some(2));
    assert_eq!(entries[1]["module"].as_str(), Some("requests"));
    assert_eq!(entries[2]["module"].as_str(), Some("sys"));

    let (_, deps) = run_json(
        &["report", "--pyc", "--dependencies", "--required", "requests,attrs"],
        dir.path(),
    );
    let report = &deps["dependencies"];
    assert_eq!(report["required_imported"][0].as_str(), Some("requests"));
    assert_eq!(report["required_missing"][0].as_str(), Some("attrs"));
    let extra: Vec<_> = report["imported_extra"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(extra, vec!["os", "sys"]);
}

#[test]
fn test_report_reads_project_config() {
    let dir = tempdir().unwrap();
    project(dir.path());
    std::fs::write(
        dir.path().join("compage.json"),
        r#"{"required": ["requests", "six"], "ignore": ["sys"]}"#,
    )
    .unwrap();

    let (code, json) = run_json(&["report", "--pyc", "--dependencies"], dir.path());
    assert_eq!(code, Some(0));
    assert!(json["modules"].get("sys").is_none());
    assert_eq!(
        json["dependencies"]["required_missing"][0].as_str(),
        Some("six")
    );
}

#[test]
fn test_report_invalid_project_config() {
    let dir = tempdir().unwrap();
    project(dir.path());
    std::fs::write(dir.path().join("compage.json"), r#"{"requird": []}"#).unwrap();

    let (code, json) = run_json(&["report", "--pyc"], dir.path());
    assert_eq!(code, Some(1));
    assert_eq!(json["ok"].as_bool(), Some(false));
    assert_eq!(json["error"]["code"].as_str(), Some("CONFIG_PARSE_ERROR"));
}

#[test]
fn test_report_partial_failure_exits_one() {
    let dir = tempdir().unwrap();
    project(dir.path());
    std::fs::write(dir.path().join("orphan.py"), "import yaml\n").unwrap();

    let (code, json) = run_json(&["report", "--pyc"], dir.path());
    assert_eq!(code, Some(1));
    assert_eq!(json["ok"].as_bool(), Some(false));
    assert_eq!(json["files_scanned"].as_u64(), Some(3));
    let failures = json["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0]["path"].as_str().unwrap().ends_with("orphan.py"));
    assert!(json["modules"].get("os").is_some());
}

#[test]
fn test_report_text_to_file() {
    let dir = tempdir().unwrap();
    project(dir.path());
    let out = dir.path().join("report.txt");

    let status = cargo_bin()
        .args(["report", "--pyc", "--module", "requests", "--width", "200", "--output"])
        .arg(&out)
        .arg(dir.path())
        .status()
        .expect("Failed to run report command");
    assert!(status.success());

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("\n\nImport Report for 'requests'\n"));
    assert!(text.contains("Module Name: 'requests'"));
    assert!(text.contains("line 2:\nimport requests"));
}

#[test]
fn test_report_missing_root_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");

    let (code, json) = run_json(&["report", "--pyc"], &missing);
    assert_eq!(code, Some(1));
    assert_eq!(json["ok"].as_bool(), Some(false));
    assert_eq!(json["error"]["code"].as_str(), Some("FILE_READ_ERROR"));
}

#[cfg(unix)]
#[test]
fn test_report_dangling_symlink_is_a_failure() {
    let dir = tempdir().unwrap();
    project(dir.path());
    std::os::unix::fs::symlink(dir.path().join("gone.py"), dir.path().join("ghost.py")).unwrap();

    let (code, json) = run_json(&["report", "--pyc"], dir.path());
    assert_eq!(code, Some(1));
    assert_eq!(json["files_scanned"].as_u64(), Some(2));
    let failures = json["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["code"].as_str(), Some("FILE_READ_ERROR"));
    assert!(failures[0]["path"].as_str().unwrap().ends_with("ghost.py"));
    assert!(json["modules"].get("requests").is_some());
}
