//! `compage scan` command implementation.

use super::{bytecode_format, compiler_for, print_json, resolve_path, ErrorJson, EXIT_PARTIAL};
use compage_core::{scan_file, Config, ImportRecord, ImportStyle, ScanResult, UnitFailure};
use compage_core::SCHEMA_VERSION;
use compage_util::hash::blake3_bytes;
use miette::Result;
use serde::Serialize;
use std::path::Path;

/// Result for JSON output.
#[derive(Serialize)]
struct ScanOutput<'a> {
    schema_version: u32,
    ok: bool,
    path: String,
    format: &'static str,
    compiler: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    blake3: Option<String>,
    imports: &'a [ImportRecord],
    failures: &'a [UnitFailure],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

/// Scan one file and print its import records.
///
/// Exits with status 1 when the file, or any unit inside it, failed.
pub fn run(config: &Config, file: &Path, pyc: bool, json: bool) -> Result<()> {
    let path = resolve_path(&config.cwd, file);
    let format = bytecode_format(&config.format, json);
    let compiler = compiler_for(config, pyc);

    let blake3 = std::fs::read(&path).ok().map(|bytes| blake3_bytes(&bytes));
    let outcome = scan_file(&path, compiler.as_ref(), format);

    let empty = ScanResult::default();
    let (result, error) = match &outcome {
        Ok(result) => (result, None),
        Err(err) => (&empty, Some(err)),
    };
    let ok = error.is_none() && result.is_complete();

    if json {
        print_json(&ScanOutput {
            schema_version: SCHEMA_VERSION,
            ok,
            path: path.display().to_string(),
            format: format.name,
            compiler: compiler.name(),
            blake3,
            imports: result.records(),
            failures: result.failures(),
            error: error.map(ErrorJson::from),
        });
    } else {
        print_human(&path, result);
        if let Some(err) = error {
            eprintln!("error: {err}");
        }
    }

    if !ok {
        std::process::exit(EXIT_PARTIAL);
    }
    Ok(())
}

fn print_human(path: &Path, result: &ScanResult) {
    println!("{}", path.display());
    for record in result.records() {
        println!("  {:>5}  {}", record.line_number(), describe(record));
    }
    for failure in result.failures() {
        eprintln!(
            "warning: unit '{}' at line {} skipped: {}",
            failure.unit(),
            failure.first_line(),
            failure.message()
        );
    }
}

fn describe(record: &ImportRecord) -> String {
    let mut out = record.module().to_string();
    if let Some(names) = record.fromlist() {
        if names.is_empty() {
            out.push_str(" (*)");
        } else {
            out.push_str(&format!(" ({})", names.join(", ")));
        }
    }
    match record.style() {
        ImportStyle::Normal => {}
        ImportStyle::Absolute => out.push_str(" [absolute]"),
        ImportStyle::Relative { level } => out.push_str(&format!(" [relative, level {level}]")),
    }
    out
}
