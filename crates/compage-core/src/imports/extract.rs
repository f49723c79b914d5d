//! Turn walker events into import records.

use super::record::{ImportRecord, ImportStyle};
use super::source::SourceCache;
use crate::bytecode::{BytecodeFormat, CodeUnit, Constant, Event, Walker};
use crate::error::{Error, Result};
use tracing::trace;

const WILDCARD: &str = "*";

/// Import records of a single unit, nested units excluded.
///
/// Any walk error discards the unit's records.
pub fn extract_imports(
    unit: &CodeUnit,
    format: &BytecodeFormat,
    source: Option<&SourceCache>,
) -> Result<Vec<ImportRecord>> {
    let lines = unit.line_table();
    let mut records = Vec::new();

    for event in Walker::new(unit, format) {
        let event = event?;
        let line_number = lines.line_for_offset(event.offset());

        let (style, fromlist_index, module_index) = match event {
            Event::Store { name_index, .. } => {
                trace!(
                    unit = unit.name(),
                    name = %unit.names()[name_index],
                    line = line_number,
                    "store"
                );
                continue;
            }
            Event::Import {
                fromlist_index,
                module_index,
                ..
            } => (ImportStyle::Normal, fromlist_index, module_index),
            Event::AbsoluteImport {
                fromlist_index,
                module_index,
                ..
            } => (ImportStyle::Absolute, fromlist_index, module_index),
            Event::RelativeImport {
                level,
                fromlist_index,
                module_index,
                ..
            } => (ImportStyle::Relative { level }, fromlist_index, module_index),
        };

        let name = &unit.names()[module_index];
        let module = match style {
            ImportStyle::Relative { level } => format!("{}{name}", ".".repeat(level as usize)),
            ImportStyle::Normal | ImportStyle::Absolute => name.clone(),
        };

        let fromlist = resolve_fromlist(&unit.consts()[fromlist_index], event.offset())?;
        let source_line = source
            .and_then(|cache| cache.line(line_number))
            .map(str::to_string);

        records.push(ImportRecord::new(
            line_number,
            source_line,
            module,
            fromlist,
            style,
        ));
    }

    Ok(records)
}

fn resolve_fromlist(constant: &Constant, offset: usize) -> Result<Option<Vec<String>>> {
    let names = match constant {
        Constant::None => return Ok(None),
        Constant::Str(s) | Constant::Unicode(s) => vec![s.clone()],
        Constant::Tuple(items) | Constant::List(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidConstant {
                        offset,
                        detail: format!("fromlist entry of kind {}", item.kind()),
                    })
            })
            .collect::<Result<Vec<_>>>()?,
        other => {
            return Err(Error::InvalidConstant {
                offset,
                detail: format!("fromlist of kind {}", other.kind()),
            })
        }
    };
    Ok(Some(
        names.into_iter().filter(|name| name != WILDCARD).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{CodeUnitBuilder, CodeUnitParts, PY27};
    use crate::error::codes;

    #[test]
    fn test_records_carry_lines_and_source() {
        let mut m = CodeUnitBuilder::module("m.py");
        m.line(1).import("os", None);
        m.line(3).import_from("a.b", &["c"], -1);
        let unit = m.finish();
        let source = SourceCache::new("import os\n\nfrom a.b import c\n");

        let records = extract_imports(&unit, &PY27, Some(&source)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].line_number(), 1);
        assert_eq!(records[0].source_line(), Some("import os"));
        assert_eq!(records[1].line_number(), 3);
        assert_eq!(records[1].module(), "a.b");
        assert_eq!(records[1].fromlist(), Some(&["c".to_string()][..]));
    }

    #[test]
    fn test_wildcard_removed() {
        let mut m = CodeUnitBuilder::module("m.py");
        m.import_star("os.path", -1);
        let records = extract_imports(&m.finish(), &PY27, None).unwrap();
        assert_eq!(records[0].fromlist(), Some(&[][..]));
        assert_eq!(records[0].source_line(), None);
    }

    #[test]
    fn test_absolute_and_relative_styles() {
        let mut m = CodeUnitBuilder::module("m.py");
        m.import_from("json", &["loads"], 0);
        m.import_from("pkg", &["x"], 2);
        let records = extract_imports(&m.finish(), &PY27, None).unwrap();

        assert_eq!(records[0].style(), ImportStyle::Absolute);
        assert_eq!(records[0].module(), "json");
        assert_eq!(records[1].style(), ImportStyle::Relative { level: 2 });
        assert_eq!(records[1].module(), "..pkg");
    }

    #[test]
    fn test_relative_import_keeps_dots() {
        // `from . import e`: the names-table entry is empty
        let mut m = CodeUnitBuilder::module("m.py");
        m.import_from("", &["e"], 1);
        let records = extract_imports(&m.finish(), &PY27, None).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module(), ".");
        assert_eq!(records[0].style(), ImportStyle::Relative { level: 1 });
        assert_eq!(records[0].fromlist(), Some(&["e".to_string()][..]));
    }

    #[test]
    fn test_single_string_fromlist() {
        let unit = CodeUnit::from_parts(CodeUnitParts {
            format_marker: PY27.magic,
            code: vec![100, 0, 0, 100, 1, 0, 108, 0, 0],
            consts: vec![Constant::Int(-1), Constant::Str("join".into())],
            names: vec!["os.path".into()],
            first_line: 1,
            ..Default::default()
        });
        let records = extract_imports(&unit, &PY27, None).unwrap();
        assert_eq!(records[0].fromlist(), Some(&["join".to_string()][..]));
    }

    #[test]
    fn test_bad_fromlist_is_invalid_constant() {
        let unit = CodeUnit::from_parts(CodeUnitParts {
            format_marker: PY27.magic,
            code: vec![100, 0, 0, 100, 1, 0, 108, 0, 0],
            consts: vec![Constant::Int(-1), Constant::Int(7)],
            names: vec!["os".into()],
            first_line: 1,
            ..Default::default()
        });
        let err = extract_imports(&unit, &PY27, None).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_CONSTANT);
    }

    #[test]
    fn test_nested_units_not_visited() {
        let mut f = CodeUnitBuilder::function("f", "m.py", 1);
        f.import("sys", None);
        let mut m = CodeUnitBuilder::module("m.py");
        m.function_def(f.finish());
        assert!(extract_imports(&m.finish(), &PY27, None).unwrap().is_empty());
    }
}
