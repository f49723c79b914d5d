//! In-memory model of a compiled code object.

use super::linetable::LineTable;
use std::sync::Arc;

/// A literal held in a code unit's constant table.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Ellipsis,
    StopIteration,
    Int(i64),
    /// Arbitrary-precision integer as 15-bit digits, least significant first.
    Long {
        negative: bool,
        digits: Vec<u16>,
    },
    Float(f64),
    Complex(f64, f64),
    /// A byte string, decoded lossily.
    Str(String),
    Unicode(String),
    Tuple(Vec<Constant>),
    List(Vec<Constant>),
    Dict(Vec<(Constant, Constant)>),
    Set(Vec<Constant>),
    FrozenSet(Vec<Constant>),
    Code(Arc<CodeUnit>),
}

impl Constant {
    /// The value of a small integer constant.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// The text of a string constant, byte or unicode.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Unicode(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_code(&self) -> Option<&CodeUnit> {
        match self {
            Self::Code(code) => Some(&**code),
            _ => None,
        }
    }

    /// Short name of the constant's kind, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Ellipsis => "Ellipsis",
            Self::StopIteration => "StopIteration",
            Self::Int(_) => "int",
            Self::Long { .. } => "long",
            Self::Float(_) => "float",
            Self::Complex(..) => "complex",
            Self::Str(_) => "str",
            Self::Unicode(_) => "unicode",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::FrozenSet(_) => "frozenset",
            Self::Code(_) => "code",
        }
    }
}

/// Everything needed to build a [`CodeUnit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeUnitParts {
    pub format_marker: u16,
    pub argcount: i32,
    pub nlocals: i32,
    pub stacksize: i32,
    pub flags: i32,
    pub code: Vec<u8>,
    pub consts: Vec<Constant>,
    pub names: Vec<String>,
    pub varnames: Vec<String>,
    pub freevars: Vec<String>,
    pub cellvars: Vec<String>,
    pub filename: String,
    pub name: String,
    pub first_line: u32,
    pub lnotab: Vec<u8>,
}

/// A compiled block of source (module, class body or function).
///
/// Read-only once built. Nested units live in the constant table, so a
/// module's units form a finite tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeUnit {
    parts: CodeUnitParts,
}

impl CodeUnit {
    #[must_use]
    pub fn from_parts(parts: CodeUnitParts) -> Self {
        Self { parts }
    }

    /// Magic number of the bytecode format this unit was compiled for.
    #[must_use]
    pub fn format_marker(&self) -> u16 {
        self.parts.format_marker
    }

    /// Raw instruction bytes.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.parts.code
    }

    #[must_use]
    pub fn consts(&self) -> &[Constant] {
        &self.parts.consts
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.parts.names
    }

    #[must_use]
    pub fn first_line(&self) -> u32 {
        self.parts.first_line
    }

    /// Compressed line table bytes.
    #[must_use]
    pub fn lnotab(&self) -> &[u8] {
        &self.parts.lnotab
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.parts.name
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.parts.filename
    }

    /// All fields, for re-encoding.
    #[must_use]
    pub fn parts(&self) -> &CodeUnitParts {
        &self.parts
    }

    /// Decode this unit's line table.
    #[must_use]
    pub fn line_table(&self) -> LineTable {
        LineTable::decode(&self.parts.lnotab, self.parts.first_line)
    }

    /// Units nested directly in the constant table, in table order.
    pub fn nested(&self) -> impl DoubleEndedIterator<Item = &CodeUnit> {
        self.parts.consts.iter().filter_map(Constant::as_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, consts: Vec<Constant>) -> CodeUnit {
        CodeUnit::from_parts(CodeUnitParts {
            name: name.to_string(),
            consts,
            first_line: 1,
            ..Default::default()
        })
    }

    #[test]
    fn test_nested_in_constant_order() {
        let f = Arc::new(unit("f", vec![]));
        let g = Arc::new(unit("g", vec![]));
        let module = unit(
            "<module>",
            vec![
                Constant::Int(-1),
                Constant::Code(f),
                Constant::None,
                Constant::Code(g),
            ],
        );

        let names: Vec<_> = module.nested().map(CodeUnit::name).collect();
        assert_eq!(names, vec!["f", "g"]);
    }

    #[test]
    fn test_constant_accessors() {
        assert_eq!(Constant::Int(-1).as_int(), Some(-1));
        assert_eq!(Constant::None.as_int(), None);
        assert_eq!(Constant::Unicode("e".into()).as_str(), Some("e"));
        assert_eq!(Constant::Tuple(vec![]).kind(), "tuple");
    }
}
