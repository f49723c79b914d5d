use serde::Serialize;

/// How an import statement resolves its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum ImportStyle {
    /// Implicit-relative lookup (the 2.x default).
    Normal,
    /// `from __future__ import absolute_import` in effect.
    Absolute,
    /// Explicit leading dots.
    Relative { level: u32 },
}

/// One decoded import occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRecord {
    line_number: u32,
    source_line: Option<String>,
    module: String,
    fromlist: Option<Vec<String>>,
    #[serde(flatten)]
    style: ImportStyle,
}

impl ImportRecord {
    pub(crate) fn new(
        line_number: u32,
        source_line: Option<String>,
        module: String,
        fromlist: Option<Vec<String>>,
        style: ImportStyle,
    ) -> Self {
        Self {
            line_number,
            source_line,
            module,
            fromlist,
            style,
        }
    }

    /// 1-based source line of the statement.
    #[must_use]
    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    /// Text of the source line, when source was available.
    #[must_use]
    pub fn source_line(&self) -> Option<&str> {
        self.source_line.as_deref()
    }

    /// Dotted module name. Relative imports keep their leading dots.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Names requested by a `from` import, without `*`.
    #[must_use]
    pub fn fromlist(&self) -> Option<&[String]> {
        self.fromlist.as_deref()
    }

    #[must_use]
    pub fn style(&self) -> ImportStyle {
        self.style
    }

    /// Dot count of a relative import.
    #[must_use]
    pub fn level(&self) -> Option<u32> {
        match self.style {
            ImportStyle::Relative { level } => Some(level),
            ImportStyle::Normal | ImportStyle::Absolute => None,
        }
    }

    /// First dotted component, keeping any leading dots.
    ///
    /// `os.path` gives `os`, `..pkg.sub` gives `..pkg`, `.` stays `.`.
    #[must_use]
    pub fn top_level_name(&self) -> &str {
        let dots = self.module.len() - self.module.trim_start_matches('.').len();
        let rest = &self.module[dots..];
        let first = rest.split('.').next().unwrap_or(rest);
        &self.module[..dots + first.len()]
    }
}
