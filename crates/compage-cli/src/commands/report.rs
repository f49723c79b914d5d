//! `compage report` command implementation.

use super::{bytecode_format, compiler_for, print_json, resolve_path, ErrorJson, EXIT_PARTIAL};
use compage_core::{
    Aggregator, Config, DependencyReport, FileFailure, ImportIndex, ImportReporter, Parallelism,
    ProjectConfig, RankEntry, SCHEMA_VERSION,
};
use compage_util::fs::atomic_write;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which report to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    Imports,
    Module(String),
    Rank,
    Dependencies,
}

/// Report command action.
#[derive(Debug, Clone)]
pub struct ReportAction {
    pub root: PathBuf,
    /// Overrides the project's `required` list when non-empty.
    pub required: Vec<String>,
    /// Added to the project's `ignore` list.
    pub ignore: Vec<String>,
    pub kind: ReportKind,
    pub pyc: bool,
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct OccurrenceJson<'a> {
    line: u32,
    source: Option<&'a str>,
}

#[derive(Serialize)]
struct FailureJson<'a> {
    path: String,
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
}

impl<'a> From<&'a FileFailure> for FailureJson<'a> {
    fn from(failure: &'a FileFailure) -> Self {
        Self {
            path: failure.path.display().to_string(),
            code: failure.code,
            message: &failure.message,
            unit: failure.unit.as_deref(),
        }
    }
}

/// Result for JSON output.
#[derive(Serialize)]
struct ReportOutput<'a> {
    schema_version: u32,
    ok: bool,
    root: String,
    files_scanned: usize,
    modules: BTreeMap<&'a str, BTreeMap<String, Vec<OccurrenceJson<'a>>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rank: Option<Vec<RankEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<DependencyReport>,
    failures: Vec<FailureJson<'a>>,
}

/// Aggregate imports under `action.root` and print or save the report.
///
/// Exits with status 1 when any file could not be fully scanned.
pub fn run(config: &Config, action: ReportAction, json: bool) -> Result<()> {
    let root = resolve_path(&config.cwd, &action.root);

    let project = match ProjectConfig::load(&root) {
        Ok(project) => project,
        Err(err) => fail(&root, &err, json),
    };
    let config = config.clone().merged_with(&project);
    let format = bytecode_format(&config.format, json);
    let compiler = compiler_for(&config, action.pyc);

    let required = if action.required.is_empty() {
        project.required.clone()
    } else {
        action.required.clone()
    };
    let parallelism = Parallelism::from_jobs(config.jobs);
    debug!(?parallelism, format = format.name, compiler = compiler.name(), "report settings");

    let index = match Aggregator::new(compiler.as_ref(), format)
        .with_parallelism(parallelism)
        .with_ignore(project.ignore.iter().chain(&action.ignore).cloned())
        .scan_root(&root)
    {
        Ok(index) => index,
        Err(err) => fail(&root, &err, json),
    };
    info!(
        files = index.files_scanned(),
        modules = index.module_names().count(),
        failures = index.failures().len(),
        "scan complete"
    );

    let reporter = ImportReporter::new(&index)
        .with_width(config.width)
        .with_required(required);

    let rendered = if json {
        let document = json_report(&root, &index, &reporter, &action.kind);
        serde_json::to_string_pretty(&document).into_diagnostic()?
    } else {
        match &action.kind {
            ReportKind::Imports => reporter.import_report(),
            ReportKind::Module(name) => reporter.module_report(name),
            ReportKind::Rank => reporter.render_rank_report(),
            ReportKind::Dependencies => reporter.render_dependency_report(),
        }
    };

    match &action.output {
        Some(out) => {
            let out = resolve_path(&config.cwd, out);
            atomic_write(&out, format!("{rendered}\n").as_bytes()).into_diagnostic()?;
            info!(path = %out.display(), "report written");
        }
        None => println!("{rendered}"),
    }

    if !index.failures().is_empty() {
        if !json {
            eprintln!(
                "warning: {} of {} files could not be fully scanned",
                count_files(index.failures()),
                index.files_scanned()
            );
            for failure in index.failures() {
                eprintln!("  {}: {}", failure.path.display(), failure.message);
            }
        }
        std::process::exit(EXIT_PARTIAL);
    }
    Ok(())
}

fn json_report<'a>(
    root: &Path,
    index: &'a ImportIndex,
    reporter: &ImportReporter<'a>,
    kind: &ReportKind,
) -> ReportOutput<'a> {
    let modules = index
        .iter()
        .filter(|(name, _)| match kind {
            ReportKind::Module(wanted) => *name == wanted.as_str(),
            _ => true,
        })
        .map(|(name, files)| {
            let files = files
                .iter()
                .map(|(path, occurrences)| {
                    let occurrences = occurrences
                        .iter()
                        .map(|occ| OccurrenceJson {
                            line: occ.line_number,
                            source: occ.source_line.as_deref(),
                        })
                        .collect();
                    (path.display().to_string(), occurrences)
                })
                .collect();
            (name, files)
        })
        .collect();

    ReportOutput {
        schema_version: SCHEMA_VERSION,
        ok: index.failures().is_empty(),
        root: root.display().to_string(),
        files_scanned: index.files_scanned(),
        modules,
        rank: (*kind == ReportKind::Rank).then(|| reporter.rank_report()),
        dependencies: (*kind == ReportKind::Dependencies).then(|| reporter.dependency_report()),
        failures: index.failures().iter().map(FailureJson::from).collect(),
    }
}

fn count_files(failures: &[FileFailure]) -> usize {
    let mut paths: Vec<&Path> = failures.iter().map(|f| f.path.as_path()).collect();
    paths.dedup();
    paths.len()
}

fn fail(root: &Path, err: &compage_core::Error, json: bool) -> ! {
    if json {
        print_json(&serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "ok": false,
            "root": root.display().to_string(),
            "error": ErrorJson::from(err),
        }));
    } else {
        eprintln!("error: {err}");
    }
    std::process::exit(EXIT_PARTIAL);
}
