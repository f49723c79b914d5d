//! Source to code unit compilation.
//!
//! Compilation itself belongs to a CPython 2 interpreter. [`HostCompiler`]
//! runs one as a subprocess and decodes the marshalled result;
//! [`PycCompiler`] reuses the `.pyc` the interpreter already left next to
//! the source.

use crate::bytecode::{load_pyc, BytecodeFormat, CodeUnit};
use crate::error::{Error, Result};
use crate::imports::{ImportScanner, ScanResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Default host interpreter.
pub const DEFAULT_PYTHON: &str = "python2";

/// Reads source from stdin, writes a `.pyc` container to stdout.
const COMPILE_SCRIPT: &str = r"
import sys, marshal, imp
try:
    import msvcrt, os
    msvcrt.setmode(sys.stdout.fileno(), os.O_BINARY)
except ImportError:
    pass
src = sys.stdin.read()
code = compile(src + '\n', sys.argv[1], 'exec')
sys.stdout.write(imp.get_magic() + '\0\0\0\0' + marshal.dumps(code))
sys.stdout.flush()
";

/// Turns source text into a code unit.
pub trait Compiler: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Compile `source` (read from `path`) for `format`.
    fn compile(&self, path: &Path, source: &str, format: &BytecodeFormat) -> Result<CodeUnit>;
}

/// Compiles through a CPython 2 interpreter subprocess.
#[derive(Debug, Clone)]
pub struct HostCompiler {
    program: PathBuf,
}

impl Default for HostCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

impl HostCompiler {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Compiler for HostCompiler {
    fn name(&self) -> &'static str {
        "host"
    }

    fn compile(&self, path: &Path, source: &str, format: &BytecodeFormat) -> Result<CodeUnit> {
        let mut child = Command::new(&self.program)
            .arg("-c")
            .arg(COMPILE_SCRIPT)
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::CompilerUnavailable {
                program: self.program.display().to_string(),
                source,
            })?;

        // The script reads all of stdin before writing, so this cannot block
        // on a full stdout pipe.
        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits early closes the pipe; its status says why.
            let _ = stdin.write_all(source.as_bytes());
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map_or_else(
                    || format!("{} exited with {}", self.program.display(), output.status),
                    |line| line.trim().to_string(),
                );
            return Err(Error::Compile {
                path: path.to_path_buf(),
                message,
            });
        }

        debug!(
            path = %path.display(),
            bytes = output.stdout.len(),
            "compiled with host interpreter"
        );
        load_pyc(&output.stdout, format)
    }
}

/// Loads the `.pyc` written next to each source file.
#[derive(Debug, Clone, Copy, Default)]
pub struct PycCompiler;

impl PycCompiler {
    /// Path of the compiled file for `source_path`.
    #[must_use]
    pub fn pyc_path(source_path: &Path) -> PathBuf {
        source_path.with_extension("pyc")
    }
}

impl Compiler for PycCompiler {
    fn name(&self) -> &'static str {
        "pyc"
    }

    fn compile(&self, path: &Path, _source: &str, format: &BytecodeFormat) -> Result<CodeUnit> {
        let pyc = Self::pyc_path(path);
        let bytes = std::fs::read(&pyc).map_err(|e| Error::Compile {
            path: path.to_path_buf(),
            message: format!("no compiled module at {}: {e}", pyc.display()),
        })?;
        load_pyc(&bytes, format)
    }
}

/// Read, compile and scan one source file.
pub fn scan_file(
    path: &Path,
    compiler: &dyn Compiler,
    format: &BytecodeFormat,
) -> Result<ScanResult> {
    let source =
        compage_util::fs::read_source_lossy(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    let unit = compiler.compile(path, &source, format)?;
    debug!(path = %path.display(), compiler = compiler.name(), "scanning");
    ImportScanner::new(format).with_source(&source).scan(&unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{dump_pyc, CodeUnitBuilder, PY26, PY27};
    use crate::error::codes;
    use tempfile::tempdir;

    #[test]
    fn test_pyc_path() {
        assert_eq!(
            PycCompiler::pyc_path(Path::new("pkg/mod.py")),
            PathBuf::from("pkg/mod.pyc")
        );
    }

    #[test]
    fn test_scan_file_with_pyc() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("mod.py");
        std::fs::write(&source, "import os\nfrom a.b import c\n").unwrap();

        let mut m = CodeUnitBuilder::module("mod.py");
        m.line(1).import("os", None);
        m.line(2).import_from("a.b", &["c"], -1);
        std::fs::write(
            PycCompiler::pyc_path(&source),
            dump_pyc(&m.finish(), 0).unwrap(),
        )
        .unwrap();

        let result = scan_file(&source, &PycCompiler, &PY27).unwrap();
        let records = result.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].source_line(), Some("from a.b import c"));
    }

    #[test]
    fn test_pyc_for_other_format_fails_closed() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("mod.py");
        std::fs::write(&source, "import os\n").unwrap();
        let mut m = CodeUnitBuilder::module("mod.py").with_format(&PY26);
        m.import("os", None);
        std::fs::write(
            PycCompiler::pyc_path(&source),
            dump_pyc(&m.finish(), 0).unwrap(),
        )
        .unwrap();

        let err = scan_file(&source, &PycCompiler, &PY27).unwrap_err();
        assert_eq!(err.code(), codes::UNSUPPORTED_BYTECODE_FORMAT);
    }

    #[test]
    fn test_missing_pyc_is_compile_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("mod.py");
        std::fs::write(&source, "import os\n").unwrap();

        let err = scan_file(&source, &PycCompiler, &PY27).unwrap_err();
        assert_eq!(err.code(), codes::COMPILE_ERROR);
    }

    #[test]
    fn test_missing_source_is_file_read_error() {
        let dir = tempdir().unwrap();
        let err = scan_file(&dir.path().join("nope.py"), &PycCompiler, &PY27).unwrap_err();
        assert_eq!(err.code(), codes::FILE_READ_ERROR);
    }

    #[test]
    fn test_missing_interpreter() {
        let compiler = HostCompiler::new("/nonexistent/bin/python2");
        let err = compiler
            .compile(Path::new("m.py"), "import os\n", &PY27)
            .unwrap_err();
        assert_eq!(err.code(), codes::COMPILER_UNAVAILABLE);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_interpreter_is_compile_error() {
        let compiler = HostCompiler::new("false");
        let err = compiler
            .compile(Path::new("m.py"), "import os\n", &PY27)
            .unwrap_err();
        assert_eq!(err.code(), codes::COMPILE_ERROR);
        assert!(err.to_string().contains("m.py"));
    }
}
