//! Plain-text layout helpers for width-limited reports.

use std::fmt::Display;

/// Greedily wrap `text` to `width` columns, preserving explicit newlines.
///
/// Empty lines are kept as empty lines; lines holding only whitespace are
/// dropped. Leading indentation of a line is kept on its first wrapped row.
/// Words longer than `width` are split.
#[must_use]
pub fn wrap(text: &str, width: usize) -> String {
    let mut out = Vec::new();
    for line in text.split('\n') {
        if line.is_empty() {
            out.push(String::new());
            continue;
        }
        out.extend(wrap_line(line, width));
    }
    out.join("\n")
}

fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let indent = &line[..line.len() - line.trim_start().len()];

    let mut rows = Vec::new();
    let mut current = indent.to_string();
    let mut has_word = false;

    for word in line.split_whitespace() {
        let mut rest = word;
        while !rest.is_empty() {
            let used = current.chars().count();
            let needed = rest.chars().count() + usize::from(has_word);
            if used + needed <= width {
                if has_word {
                    current.push(' ');
                }
                current.push_str(rest);
                has_word = true;
                rest = "";
            } else if has_word {
                rows.push(std::mem::take(&mut current));
                has_word = false;
            } else {
                let room = width.saturating_sub(used).max(1);
                let split = rest.char_indices().nth(room).map_or(rest.len(), |(i, _)| i);
                current.push_str(&rest[..split]);
                rows.push(std::mem::take(&mut current));
                rest = &rest[split..];
            }
        }
    }

    if has_word {
        rows.push(current);
    }
    rows
}

/// Frame `msg` between two separator lines made of `fill` repeated `width` times.
#[must_use]
pub fn format_header(msg: &str, fill: char, width: usize) -> String {
    let sep: String = std::iter::repeat(fill).take(width).collect();
    format!("{sep}\n{msg}\n{sep}")
}

/// Quote every item with `quote` and join them with `", "`.
#[must_use]
pub fn format_iterable<I>(items: I, quote: char) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    items
        .into_iter()
        .map(|item| format!("{quote}{item}{quote}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Wrap each block to `width` and join the blocks with newlines.
#[must_use]
pub fn format_output<S: AsRef<str>>(blocks: &[S], width: usize) -> String {
    blocks
        .iter()
        .map(|block| wrap(block.as_ref(), width))
        .collect::<Vec<_>>()
        .join("\n")
}
