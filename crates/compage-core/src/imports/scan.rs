//! Depth-first import scan over a tree of code units.

use super::extract::extract_imports;
use super::record::ImportRecord;
use super::source::SourceCache;
use crate::bytecode::{BytecodeFormat, CodeUnit};
use crate::error::{Error, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// A unit whose own scan aborted. Its records are missing from the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    unit: String,
    first_line: u32,
    code: &'static str,
    message: String,
}

impl UnitFailure {
    fn new(unit: &CodeUnit, err: &Error) -> Self {
        Self {
            unit: unit.name().to_string(),
            first_line: unit.first_line(),
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// Name of the failed unit (`<module>`, a function or class name).
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    #[must_use]
    pub fn first_line(&self) -> u32 {
        self.first_line
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Records of a unit followed by those of its nested units, pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    records: Vec<ImportRecord>,
    failures: Vec<UnitFailure>,
}

impl ScanResult {
    #[must_use]
    pub fn records(&self) -> &[ImportRecord] {
        &self.records
    }

    #[must_use]
    pub fn failures(&self) -> &[UnitFailure] {
        &self.failures
    }

    /// True when every unit in the tree was scanned.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<ImportRecord> {
        self.records
    }
}

/// Scanner bound to one bytecode format and, optionally, the module source.
#[derive(Debug, Clone)]
pub struct ImportScanner<'f> {
    format: &'f BytecodeFormat,
    source: Option<SourceCache>,
}

impl<'f> ImportScanner<'f> {
    #[must_use]
    pub fn new(format: &'f BytecodeFormat) -> Self {
        Self {
            format,
            source: None,
        }
    }

    /// Attach source text so records carry their line.
    #[must_use]
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(SourceCache::new(source));
        self
    }

    /// Scan `root` and every unit nested in its constants.
    ///
    /// A root compiled for another format fails the whole scan. A nested
    /// unit with a foreign marker, and any unit whose walk errors, is
    /// reported in [`ScanResult::failures`] while its children are still
    /// scanned.
    pub fn scan(&self, root: &CodeUnit) -> Result<ScanResult> {
        self.format.check(root.format_marker())?;

        let mut result = ScanResult::default();
        let mut stack = vec![root];

        while let Some(unit) = stack.pop() {
            // Reverse so siblings come off the stack in constant-table order
            stack.extend(unit.nested().rev());

            let outcome = self
                .format
                .check(unit.format_marker())
                .and_then(|()| extract_imports(unit, self.format, self.source.as_ref()));

            match outcome {
                Ok(records) => {
                    debug!(
                        unit = unit.name(),
                        first_line = unit.first_line(),
                        imports = records.len(),
                        "scanned unit"
                    );
                    result.records.extend(records);
                }
                Err(err) => {
                    warn!(
                        unit = unit.name(),
                        first_line = unit.first_line(),
                        code = err.code(),
                        "unit scan aborted: {err}"
                    );
                    result.failures.push(UnitFailure::new(unit, &err));
                }
            }
        }

        Ok(result)
    }
}

/// Scan `unit` with `format`, correlating against `source` when given.
pub fn scan_unit(
    unit: &CodeUnit,
    format: &BytecodeFormat,
    source: Option<&str>,
) -> Result<ScanResult> {
    let scanner = ImportScanner::new(format);
    match source {
        Some(text) => scanner.with_source(text).scan(unit),
        None => scanner.scan(unit),
    }
}
