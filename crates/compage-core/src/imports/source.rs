/// Line cache over a module's source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCache {
    lines: Vec<String>,
}

impl SourceCache {
    /// Split `source` into lines, dropping `\n` / `\r\n` terminators.
    #[must_use]
    pub fn new(source: &str) -> Self {
        Self {
            lines: source.lines().map(str::to_string).collect(),
        }
    }

    /// Zero-based lookup.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Text of 1-based `line_number`. Out-of-range lines give `None`.
    #[must_use]
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let index = usize::try_from(line_number).ok()?.checked_sub(1)?;
        self.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
