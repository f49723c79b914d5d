use crate::aggregate::ImportIndex;
use compage_util::text::{format_header, format_iterable, format_output};
use serde::Serialize;
use std::collections::BTreeSet;

/// Declared requirements compared with the imports found.
///
/// Relative imports point inside the scanned package and are never counted
/// as extra dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    /// Required and imported, in declaration order.
    pub required_imported: Vec<String>,
    /// Required but never imported, sorted.
    pub required_missing: Vec<String>,
    /// Imported but not required, sorted.
    pub imported_extra: Vec<String>,
}

impl DependencyReport {
    pub(super) fn build(index: &ImportIndex, required: &[String]) -> Self {
        let required_set: BTreeSet<&str> = required.iter().map(String::as_str).collect();

        let mut seen = BTreeSet::new();
        let required_imported = required
            .iter()
            .filter(|name| index.contains(name) && seen.insert(name.as_str()))
            .cloned()
            .collect();

        let required_missing = required_set
            .iter()
            .filter(|name| !index.contains(name))
            .map(|name| (*name).to_string())
            .collect();

        let imported_extra = index
            .module_names()
            .filter(|name| !name.starts_with('.') && !required_set.contains(name))
            .map(str::to_string)
            .collect();

        Self {
            required_imported,
            required_missing,
            imported_extra,
        }
    }

    /// Text form, listing every occurrence of each required package.
    #[must_use]
    pub fn render(&self, index: &ImportIndex, width: usize) -> String {
        let mut out = vec!["\n\nDependency Report".to_string()];

        for package in &self.required_imported {
            out.push(format_header(
                &format!("'{package}' is a required package with following import data:"),
                '-',
                width,
            ));
            for (path, occurrences) in index.get(package).into_iter().flatten() {
                for occ in occurrences {
                    out.push(format!("line {} in {}:", occ.line_number, path.display()));
                    out.push(occ.source_line.clone().unwrap_or_default());
                    out.push(String::new());
                }
            }
        }

        if !self.required_missing.is_empty() {
            out.push(format_header(
                "Following packages are required but never imported:",
                '-',
                width,
            ));
            out.push(format_iterable(&self.required_missing, '\''));
        }

        out.push(String::new());

        if !self.imported_extra.is_empty() {
            out.push(format_header(
                "Following are imported but are not in required:",
                '-',
                width,
            ));
            out.push(format_iterable(&self.imported_extra, '\''));
        }

        format_output(&out, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::index;
    use tempfile::tempdir;

    fn required(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_build_partitions_packages() {
        let dir = tempdir().unwrap();
        let idx = index(
            dir.path(),
            &[("a.py", &[(1, "requests"), (2, "os"), (3, "six.moves")])],
        );

        let report = DependencyReport::build(&idx, &required(&["six", "requests", "attrs", "six"]));
        assert_eq!(report.required_imported, vec!["six", "requests"]);
        assert_eq!(report.required_missing, vec!["attrs"]);
        assert_eq!(report.imported_extra, vec!["os"]);
    }

    #[test]
    fn test_render_lists_occurrences() {
        let dir = tempdir().unwrap();
        let idx = index(dir.path(), &[("a.py", &[(1, "os"), (2, "requests")])]);
        let report = DependencyReport::build(&idx, &required(&["requests", "attrs"]));
        let text = report.render(&idx, 200);

        let path = dir.path().join("a.py");
        assert!(text.starts_with("\n\nDependency Report\n"));
        assert!(text.contains("'requests' is a required package with following import data:"));
        assert!(text.contains(&format!("line 2 in {}:\nimport requests\n", path.display())));
        assert!(text.contains("Following packages are required but never imported:"));
        assert!(text.contains("'attrs'"));
        assert!(text.ends_with("'os'"));
    }

    #[test]
    fn test_no_requirements_everything_is_extra() {
        let dir = tempdir().unwrap();
        let idx = index(dir.path(), &[("a.py", &[(1, "os"), (2, "sys")])]);
        let report = DependencyReport::build(&idx, &[]);
        assert!(report.required_imported.is_empty());
        assert!(report.required_missing.is_empty());
        assert_eq!(report.imported_extra, vec!["os", "sys"]);
    }
}
