use crate::aggregate::ImportIndex;
use compage_util::text::{format_header, format_output};
use serde::Serialize;

/// A module and how many times it is imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankEntry {
    pub module: String,
    pub count: usize,
}

/// Count descending, ties broken by name.
pub(super) fn rank(index: &ImportIndex) -> Vec<RankEntry> {
    let mut entries: Vec<RankEntry> = index
        .module_names()
        .map(|module| RankEntry {
            module: module.to_string(),
            count: index.occurrence_count(module),
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.module.cmp(&b.module)));
    entries
}

pub(super) fn render(entries: &[RankEntry], width: usize) -> String {
    let mut out = vec![
        "\n\nRank Report".to_string(),
        format_header("Module Name: Import Count", '-', width),
    ];
    out.extend(
        entries
            .iter()
            .map(|entry| format!("{}: {}", entry.module, entry.count)),
    );
    format_output(&out, width)
}
