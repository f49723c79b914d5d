//! Small assembler for CPython-2-shaped code units.
//!
//! Emits the same instruction sequences the 2.x compiler produces for
//! `import` statements, function definitions and simple assignments, with a
//! matching line table. Used to build fixtures and benchmark inputs without
//! a host interpreter.
//!
//! ```
//! use compage_core::bytecode::CodeUnitBuilder;
//!
//! let mut module = CodeUnitBuilder::module("m.py");
//! module.line(1).import("os", None);
//! module.line(2).import_from("a.b", &["c", "d"], -1);
//! let unit = module.finish();
//! assert_eq!(unit.names(), &["os", "a.b", "c", "d"]);
//! ```

use super::code::{CodeUnit, CodeUnitParts, Constant};
use super::format::{BytecodeFormat, PY27};
use std::sync::Arc;

const CO_OPTIMIZED: i32 = 0x0001;
const CO_NEWLOCALS: i32 = 0x0002;
const CO_NOFREE: i32 = 0x0040;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Module,
    Function,
}

/// Incremental builder for one [`CodeUnit`].
#[derive(Debug, Clone)]
pub struct CodeUnitBuilder {
    format: &'static BytecodeFormat,
    scope: Scope,
    name: String,
    filename: String,
    first_line: u32,
    code: Vec<u8>,
    consts: Vec<Constant>,
    names: Vec<String>,
    varnames: Vec<String>,
    lnotab: Vec<u8>,
    last_line: u32,
    last_offset: usize,
}

impl CodeUnitBuilder {
    /// Builder for a module body starting at line 1.
    #[must_use]
    pub fn module(filename: &str) -> Self {
        Self::new(Scope::Module, "<module>", filename, 1)
    }

    /// Builder for a function body whose `def` sits on `first_line`.
    ///
    /// The constant table starts with `None`, the docstring slot.
    #[must_use]
    pub fn function(name: &str, filename: &str, first_line: u32) -> Self {
        let mut builder = Self::new(Scope::Function, name, filename, first_line);
        builder.consts.push(Constant::None);
        builder
    }

    fn new(scope: Scope, name: &str, filename: &str, first_line: u32) -> Self {
        Self {
            format: &PY27,
            scope,
            name: name.to_string(),
            filename: filename.to_string(),
            first_line,
            code: Vec::new(),
            consts: Vec::new(),
            names: Vec::new(),
            varnames: Vec::new(),
            lnotab: Vec::new(),
            last_line: first_line,
            last_offset: 0,
        }
    }

    /// Emit opcodes and stamp the format marker of `format` instead of 2.7.
    #[must_use]
    pub fn with_format(mut self, format: &'static BytecodeFormat) -> Self {
        self.format = format;
        self
    }

    /// Current length of the instruction buffer.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Index of `value` in the constant table, adding it if needed.
    pub fn constant(&mut self, value: Constant) -> u16 {
        let idx = match self.consts.iter().position(|c| *c == value) {
            Some(idx) => idx,
            None => {
                self.consts.push(value);
                self.consts.len() - 1
            }
        };
        operand(idx)
    }

    /// Index of `name` in the names table, adding it if needed.
    pub fn name(&mut self, name: &str) -> u16 {
        operand(intern(&mut self.names, name))
    }

    /// Emit a no-argument instruction.
    pub fn op(&mut self, opcode: u8) -> &mut Self {
        self.code.push(opcode);
        self
    }

    /// Emit an instruction with a 2-byte operand.
    pub fn op_arg(&mut self, opcode: u8, arg: u16) -> &mut Self {
        self.code.push(opcode);
        self.code.extend_from_slice(&arg.to_le_bytes());
        self
    }

    /// Start a new source line at the current offset.
    ///
    /// Lines that do not move forward are ignored; the 2.x table cannot
    /// encode a negative delta.
    pub fn line(&mut self, line: u32) -> &mut Self {
        if line <= self.last_line {
            return self;
        }
        let mut byte_delta = self.code.len() - self.last_offset;
        let mut line_delta = line - self.last_line;

        while byte_delta > 255 {
            self.lnotab.extend_from_slice(&[255, 0]);
            byte_delta -= 255;
        }
        while line_delta > 255 {
            self.lnotab.extend_from_slice(&[low_byte(byte_delta), 255]);
            byte_delta = 0;
            line_delta -= 255;
        }
        self.lnotab
            .extend_from_slice(&[low_byte(byte_delta), low_byte(line_delta as usize)]);

        self.last_line = line;
        self.last_offset = self.code.len();
        self
    }

    /// Bind the value on top of the stack to `name` in the current scope.
    pub fn store(&mut self, name: &str) -> &mut Self {
        match self.scope {
            Scope::Module => {
                let idx = self.name(name);
                self.op_arg(self.format.store_name, idx)
            }
            Scope::Function => {
                let idx = operand(intern(&mut self.varnames, name));
                self.op_arg(self.format.store_fast, idx)
            }
        }
    }

    /// `name = None`
    pub fn assign_none(&mut self, name: &str) -> &mut Self {
        let none = self.constant(Constant::None);
        self.op_arg(self.format.load_const, none).store(name)
    }

    fn import_prefix(&mut self, level: i64, fromlist: Constant, module: &str) -> &mut Self {
        let level = self.constant(Constant::Int(level));
        let fromlist = self.constant(fromlist);
        let module = self.name(module);
        let f = self.format;
        self.op_arg(f.load_const, level)
            .op_arg(f.load_const, fromlist)
            .op_arg(f.import_name, module)
    }

    /// `import dotted [as alias]` with implicit-relative semantics.
    pub fn import(&mut self, dotted: &str, alias: Option<&str>) -> &mut Self {
        self.import_prefix(-1, Constant::None, dotted);
        match alias {
            None => {
                let top = dotted.split('.').next().unwrap_or(dotted).to_string();
                self.store(&top)
            }
            Some(alias) => {
                for attr in dotted.split('.').skip(1) {
                    let idx = self.name(attr);
                    let load_attr = self.format.load_attr;
                    self.op_arg(load_attr, idx);
                }
                self.store(alias)
            }
        }
    }

    /// `from module import names...`
    ///
    /// `level` is `-1` for implicit-relative, `0` for absolute and the dot
    /// count for explicit relative imports, in which case `module` is the
    /// part after the dots (possibly empty).
    pub fn import_from(&mut self, module: &str, names: &[&str], level: i64) -> &mut Self {
        let fromlist = Constant::Tuple(
            names
                .iter()
                .map(|n| Constant::Str((*n).to_string()))
                .collect(),
        );
        self.import_prefix(level, fromlist, module);
        for name in names {
            let idx = self.name(name);
            let import_from = self.format.import_from;
            self.op_arg(import_from, idx).store(name);
        }
        let pop_top = self.format.pop_top;
        self.op(pop_top)
    }

    /// `from module import *`
    pub fn import_star(&mut self, module: &str, level: i64) -> &mut Self {
        self.import_prefix(level, Constant::Tuple(vec![Constant::Str("*".into())]), module);
        let import_star = self.format.import_star;
        self.op(import_star)
    }

    /// `def name(): ...` where `body` is the finished function unit.
    pub fn function_def(&mut self, body: CodeUnit) -> &mut Self {
        let name = body.name().to_string();
        let code = self.constant(Constant::Code(Arc::new(body)));
        let f = self.format;
        self.op_arg(f.load_const, code)
            .op_arg(f.make_function, 0)
            .store(&name)
    }

    /// Append the implicit `return None` and build the unit.
    ///
    /// Stack depth is not computed; built units are meant to be decoded,
    /// not executed.
    #[must_use]
    pub fn finish(mut self) -> CodeUnit {
        let none = self.constant(Constant::None);
        let f = self.format;
        self.op_arg(f.load_const, none).op(f.return_value);

        let flags = match self.scope {
            Scope::Module => CO_NOFREE,
            Scope::Function => CO_OPTIMIZED | CO_NEWLOCALS | CO_NOFREE,
        };
        let nlocals = i32::try_from(self.varnames.len()).unwrap_or(i32::MAX);

        CodeUnit::from_parts(CodeUnitParts {
            format_marker: self.format.magic,
            argcount: 0,
            nlocals,
            stacksize: 0,
            flags,
            code: self.code,
            consts: self.consts,
            names: self.names,
            varnames: self.varnames,
            freevars: Vec::new(),
            cellvars: Vec::new(),
            filename: self.filename,
            name: self.name,
            first_line: self.first_line,
            lnotab: self.lnotab,
        })
    }
}

fn intern(table: &mut Vec<String>, name: &str) -> usize {
    match table.iter().position(|n| n == name) {
        Some(idx) => idx,
        None => {
            table.push(name.to_string());
            table.len() - 1
        }
    }
}

fn operand(idx: usize) -> u16 {
    u16::try_from(idx).unwrap_or(u16::MAX)
}

fn low_byte(v: usize) -> u8 {
    u8::try_from(v).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_os_matches_compiler_output() {
        let mut m = CodeUnitBuilder::module("m.py");
        m.line(1).import("os", None);
        let unit = m.finish();

        assert_eq!(
            unit.code(),
            &[100, 0, 0, 100, 1, 0, 108, 0, 0, 90, 0, 0, 100, 1, 0, 83]
        );
        assert_eq!(unit.consts(), &[Constant::Int(-1), Constant::None]);
        assert_eq!(unit.names(), &["os"]);
        assert!(unit.lnotab().is_empty());
    }

    #[test]
    fn test_aliased_dotted_import_loads_attributes() {
        let mut m = CodeUnitBuilder::module("m.py");
        m.import("os.path", Some("p"));
        let unit = m.finish();
        assert_eq!(unit.names(), &["os.path", "path", "p"]);
        assert_eq!(&unit.code()[9..12], &[PY27.load_attr, 1, 0]);
    }

    #[test]
    fn test_line_table_encoding() {
        let mut m = CodeUnitBuilder::module("m.py");
        m.line(1).import("os", None);
        m.line(2).import("os.path", Some("p"));
        m.line(3).import_from("a.b", &["c", "d"], -1);
        m.line(4).import_from("", &["e"], 1);
        let unit = m.finish();

        assert_eq!(unit.lnotab(), &[12, 1, 15, 1, 22, 1]);
        assert_eq!(unit.code().len(), 69);
    }

    #[test]
    fn test_large_deltas_are_split() {
        let mut m = CodeUnitBuilder::module("m.py");
        for i in 0..100 {
            m.assign_none(&format!("x{i}"));
        }
        m.line(400);
        let unit = m.finish();
        // 600 bytes then 399 lines
        assert_eq!(unit.lnotab(), &[255, 0, 255, 0, 90, 255, 0, 144]);
        assert_eq!(unit.line_table().line_for_offset(600), 400);
    }

    #[test]
    fn test_function_uses_fast_locals() {
        let mut f = CodeUnitBuilder::function("f", "m.py", 2);
        f.line(3).import("sys", None);
        let f = f.finish();

        assert_eq!(f.consts(), &[Constant::None, Constant::Int(-1)]);
        assert_eq!(f.parts().varnames, vec!["sys".to_string()]);
        assert_eq!(f.lnotab(), &[0, 1]);
        assert_eq!(f.code()[9], PY27.store_fast);
    }

    #[test]
    fn test_constants_and_names_deduplicated() {
        let mut m = CodeUnitBuilder::module("m.py");
        m.import("os", None).import("os", None);
        let unit = m.finish();
        assert_eq!(unit.names().len(), 1);
        assert_eq!(unit.consts().len(), 2);
    }

    #[test]
    fn test_with_format_stamps_marker() {
        let mut m = CodeUnitBuilder::module("m.py").with_format(&crate::bytecode::PY26);
        m.import("os", None);
        let unit = m.finish();
        assert_eq!(unit.format_marker(), 62161);
        assert_eq!(unit.code()[6], 107);
    }
}
