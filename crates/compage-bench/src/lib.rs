#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! Benchmark harness for compage.
//!
//! Run benchmarks with: `cargo bench -p compage-bench`
//!
//! Inputs are synthetic modules assembled with [`CodeUnitBuilder`], so no
//! CPython interpreter is needed.

use compage_core::bytecode::{CodeUnit, CodeUnitBuilder};

const MODULES: &[&str] = &["os", "sys", "json", "re", "os.path", "collections", "logging"];

/// A module with `statements` import statements, one per line, plus one
/// function per ten statements holding an import of its own.
#[must_use]
pub fn synthetic_module(statements: u32) -> CodeUnit {
    let mut module = CodeUnitBuilder::module("bench.py");
    let mut line = 1;
    for i in 0..statements {
        let target = MODULES[i as usize % MODULES.len()];
        match i % 4 {
            0 => module.line(line).import(target, None),
            1 => module.line(line).import_from(target, &["a", "b"], -1),
            2 => module.line(line).import_from("", &["sibling"], 1),
            _ => module.line(line).assign_none("value"),
        };
        line += 1;

        if i % 10 == 9 {
            let mut body = CodeUnitBuilder::function(&format!("f{i}"), "bench.py", line);
            body.line(line + 1).import(target, None);
            module.line(line).function_def(body.finish());
            line += 2;
        }
    }
    module.finish()
}

/// Source text whose line count matches [`synthetic_module`].
#[must_use]
pub fn synthetic_source(statements: u32) -> String {
    let mut out = String::new();
    for i in 0..statements {
        out.push_str("import x\n");
        if i % 10 == 9 {
            out.push_str("def f():\n    import y\n");
        }
    }
    out
}
