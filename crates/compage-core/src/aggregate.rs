//! Directory-wide scanning and the module → file → occurrence index.
//!
//! Files are scanned independently (optionally on a rayon pool), and the
//! per-file outcomes are merged afterwards in input order, so the index does
//! not depend on the degree of parallelism.

use crate::bytecode::BytecodeFormat;
use crate::compiler::{scan_file, Compiler};
use crate::discovery::find_source_files;
use crate::error::{Error, Result};
use crate::imports::ScanResult;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One place a module is imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub line_number: u32,
    pub source_line: Option<String>,
}

/// A file (or a unit inside it) that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub code: &'static str,
    pub message: String,
    /// Set when only a nested unit failed; the file's other records are kept.
    pub unit: Option<String>,
}

/// Occurrences per file for one module.
pub type FileOccurrences = BTreeMap<PathBuf, Vec<Occurrence>>;

/// Imports of a whole tree, keyed by top-level module name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportIndex {
    modules: BTreeMap<String, FileOccurrences>,
    failures: Vec<FileFailure>,
    files_scanned: usize,
}

impl ImportIndex {
    /// Module names in sorted order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Per-file occurrences of `module`.
    #[must_use]
    pub fn get(&self, module: &str) -> Option<&FileOccurrences> {
        self.modules.get(module)
    }

    #[must_use]
    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Total occurrences of `module` across files.
    #[must_use]
    pub fn occurrence_count(&self, module: &str) -> usize {
        self.modules
            .get(module)
            .map_or(0, |files| files.values().map(Vec::len).sum())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileOccurrences)> {
        self.modules.iter().map(|(name, files)| (name.as_str(), files))
    }

    #[must_use]
    pub fn failures(&self) -> &[FileFailure] {
        &self.failures
    }

    /// Files attempted, failed ones included.
    #[must_use]
    pub fn files_scanned(&self) -> usize {
        self.files_scanned
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn record_failure(&mut self, path: PathBuf, err: &Error) {
        warn!(path = %path.display(), code = err.code(), "scan failed: {err}");
        self.failures.push(FileFailure {
            path,
            code: err.code(),
            message: err.to_string(),
            unit: None,
        });
    }

    fn merge(&mut self, path: PathBuf, outcome: Result<ScanResult>, ignore: &BTreeSet<String>) {
        self.files_scanned += 1;

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                self.record_failure(path, &err);
                return;
            }
        };

        for failure in result.failures() {
            warn!(
                path = %path.display(),
                unit = failure.unit(),
                code = failure.code(),
                "partial scan: {}",
                failure.message()
            );
            self.failures.push(FileFailure {
                path: path.clone(),
                code: failure.code(),
                message: failure.message().to_string(),
                unit: Some(failure.unit().to_string()),
            });
        }

        for record in result.records() {
            let top = record.top_level_name();
            if ignore.contains(top) {
                continue;
            }
            self.modules
                .entry(top.to_string())
                .or_default()
                .entry(path.clone())
                .or_default()
                .push(Occurrence {
                    line_number: record.line_number(),
                    source_line: record.source_line().map(str::to_string),
                });
        }
    }
}

/// How files are spread over threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    Sequential,
    /// A rayon pool with the given thread count, or rayon's default.
    #[default]
    Auto,
    Threads(usize),
}

impl Parallelism {
    /// Map a `--jobs` value: `None` is automatic, `1` is sequential.
    #[must_use]
    pub fn from_jobs(jobs: Option<usize>) -> Self {
        match jobs {
            None | Some(0) => Self::Auto,
            Some(1) => Self::Sequential,
            Some(n) => Self::Threads(n),
        }
    }
}

/// Scans many files into one [`ImportIndex`].
pub struct Aggregator<'a> {
    compiler: &'a dyn Compiler,
    format: &'a BytecodeFormat,
    parallelism: Parallelism,
    ignore: BTreeSet<String>,
}

impl<'a> Aggregator<'a> {
    #[must_use]
    pub fn new(compiler: &'a dyn Compiler, format: &'a BytecodeFormat) -> Self {
        Self {
            compiler,
            format,
            parallelism: Parallelism::default(),
            ignore: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Drop these top-level module names from the index.
    #[must_use]
    pub fn with_ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }

    /// Discover and scan every source file under `root`.
    ///
    /// Fails only when `root` itself cannot be read; unreadable entries
    /// below it are recorded as failures after the scanned files'.
    pub fn scan_root(&self, root: &Path) -> Result<ImportIndex> {
        let sources = find_source_files(root)?;
        debug!(
            root = %root.display(),
            files = sources.files.len(),
            unreadable = sources.unreadable.len(),
            "discovered sources"
        );
        let mut index = self.scan_files(&sources.files)?;
        for (path, err) in sources.unreadable {
            index.record_failure(path, &err);
        }
        Ok(index)
    }

    /// Scan `files`; per-file errors land in [`ImportIndex::failures`].
    pub fn scan_files(&self, files: &[PathBuf]) -> Result<ImportIndex> {
        let scan = |path: &PathBuf| scan_file(path, self.compiler, self.format);

        let outcomes: Vec<Result<ScanResult>> = match self.parallelism {
            Parallelism::Sequential => files.iter().map(scan).collect(),
            Parallelism::Auto => files.par_iter().map(scan).collect(),
            Parallelism::Threads(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| Error::other(format!("failed to start scan threads: {e}")))?;
                pool.install(|| files.par_iter().map(scan).collect())
            }
        };

        let mut index = ImportIndex::default();
        for (path, outcome) in files.iter().zip(outcomes) {
            index.merge(path.clone(), outcome, &self.ignore);
        }
        Ok(index)
    }
}
