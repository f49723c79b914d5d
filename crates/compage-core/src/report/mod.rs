//! Width-wrapped text reports over an [`ImportIndex`].

mod dependency;
mod rank;

pub use dependency::DependencyReport;
pub use rank::RankEntry;

use crate::aggregate::ImportIndex;
use crate::config::DEFAULT_WIDTH;
use compage_util::text::{format_header, format_iterable, format_output};
use std::collections::BTreeSet;

const HEADER_FILL: char = '-';
const QUOTE: char = '\'';
const MISSING_SOURCE: &str = "<source unavailable>";

/// Renders reports for one index.
#[derive(Debug, Clone)]
pub struct ImportReporter<'a> {
    index: &'a ImportIndex,
    width: usize,
    required: Vec<String>,
}

impl<'a> ImportReporter<'a> {
    #[must_use]
    pub fn new(index: &'a ImportIndex) -> Self {
        Self {
            index,
            width: DEFAULT_WIDTH,
            required: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Packages the project declares it needs.
    #[must_use]
    pub fn with_required<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = required.into_iter().map(Into::into).collect();
        self
    }

    /// Imported module names, sorted.
    #[must_use]
    pub fn modules(&self) -> Vec<&'a str> {
        self.index.module_names().collect()
    }

    /// Every module's section, then required packages never imported.
    #[must_use]
    pub fn import_report(&self) -> String {
        let mut out = vec!["\n\nImport Report".to_string()];
        for module in self.index.module_names() {
            out.extend(self.module_section(module));
        }

        if !self.required.is_empty() {
            let missing = self.required_but_missing();
            if !missing.is_empty() {
                out.push(self.header("Following packages are required but never imported:"));
                out.push(format_iterable(missing, QUOTE));
            }
        }
        format_output(&out, self.width)
    }

    /// Section for a single module.
    #[must_use]
    pub fn module_report(&self, module: &str) -> String {
        let mut out = vec![format!("\n\nImport Report for '{module}'")];
        out.extend(self.module_section(module));
        format_output(&out, self.width)
    }

    /// Modules ordered by occurrence count, most imported first.
    #[must_use]
    pub fn rank_report(&self) -> Vec<RankEntry> {
        rank::rank(self.index)
    }

    /// [`Self::rank_report`] as text.
    #[must_use]
    pub fn render_rank_report(&self) -> String {
        rank::render(&self.rank_report(), self.width)
    }

    /// Required packages against what the tree actually imports.
    #[must_use]
    pub fn dependency_report(&self) -> DependencyReport {
        DependencyReport::build(self.index, &self.required)
    }

    /// [`Self::dependency_report`] as text.
    #[must_use]
    pub fn render_dependency_report(&self) -> String {
        self.dependency_report().render(self.index, self.width)
    }

    fn header(&self, msg: &str) -> String {
        format_header(msg, HEADER_FILL, self.width)
    }

    fn required_but_missing(&self) -> Vec<&str> {
        self.required
            .iter()
            .map(String::as_str)
            .filter(|name| !self.index.contains(name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn module_section(&self, module: &str) -> Vec<String> {
        let Some(files) = self.index.get(module) else {
            return vec![format!("No data found for module '{module}'")];
        };

        let required = if self.required.is_empty() {
            ""
        } else if self.required.iter().any(|r| r == module) {
            "\nIn Required: Yes"
        } else {
            "\nIn Required: No"
        };

        let mut out = vec![self.header(&format!("Module Name: '{module}'{required}"))];
        for (path, occurrences) in files {
            out.push(format!("\"{}\"", path.display()));
            for occ in occurrences {
                out.push(format!(
                    "line {}:\n{}",
                    occ.line_number,
                    occ.source_line.as_deref().unwrap_or(MISSING_SOURCE)
                ));
            }
        }
        out
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::index;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_modules_sorted() {
        let dir = tempdir().unwrap();
        let idx = index(dir.path(), &[("a.py", &[(1, "sys"), (2, "os")])]);
        assert_eq!(ImportReporter::new(&idx).modules(), vec!["os", "sys"]);
    }

    #[test]
    fn test_module_report_lists_files_and_lines() {
        let dir = tempdir().unwrap();
        let idx = index(dir.path(), &[("a.py", &[(1, "os"), (3, "os.path")])]);
        let report = ImportReporter::new(&idx).with_width(120).module_report("os");

        let path = dir.path().join("a.py");
        let expected = format!(
            "\n\nImport Report for 'os'\n{sep}\nModule Name: 'os'\n{sep}\n\"{}\"\nline 1:\nimport os\nline 3:\nimport os.path",
            path.display(),
            sep = "-".repeat(120),
        );
        assert_eq!(report, expected);
    }

    #[test]
    fn test_module_report_unknown_module() {
        let dir = tempdir().unwrap();
        let idx = index(dir.path(), &[("a.py", &[(1, "os")])]);
        let report = ImportReporter::new(&idx).module_report("yaml");
        assert!(report.ends_with("No data found for module 'yaml'"));
    }

    #[test]
    fn test_import_report_with_required() {
        let dir = tempdir().unwrap();
        let idx = index(dir.path(), &[("a.py", &[(1, "os"), (2, "requests")])]);
        let report = ImportReporter::new(&idx)
            .with_required(["six", "requests", "attrs"])
            .import_report();

        assert!(report.starts_with("\n\nImport Report\n"));
        assert!(report.contains("Module Name: 'os'\nIn Required: No"));
        assert!(report.contains("Module Name: 'requests'\nIn Required: Yes"));
        assert!(report.contains("Following packages are required but never imported:"));
        assert!(report.ends_with("'attrs', 'six'"));
    }

    #[test]
    fn test_import_report_without_required() {
        let dir = tempdir().unwrap();
        let idx = index(dir.path(), &[("a.py", &[(1, "os")])]);
        let report = ImportReporter::new(&idx).import_report();
        assert!(!report.contains("In Required"));
        assert!(!report.contains("never imported"));
    }
}
