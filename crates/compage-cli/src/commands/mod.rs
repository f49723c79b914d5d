pub mod compile;
pub mod report;
pub mod scan;
pub mod version;

use compage_core::bytecode::BytecodeFormat;
use compage_core::compiler::DEFAULT_PYTHON;
use compage_core::{Compiler, Config, Error, HostCompiler, PycCompiler};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Some files or units could not be scanned.
pub const EXIT_PARTIAL: i32 = 1;

/// Bad invocation.
pub const EXIT_USAGE: i32 = 2;

/// Error info for JSON output.
#[derive(Debug, Serialize)]
pub struct ErrorJson {
    pub code: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorJson {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Resolve `path` against the working directory.
pub fn resolve_path(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Look up `name`, exiting with a usage error when it is unknown.
pub fn bytecode_format(name: &str, json: bool) -> &'static BytecodeFormat {
    match BytecodeFormat::by_name(name) {
        Ok(format) => format,
        Err(err) => {
            if json {
                print_json(&serde_json::json!({
                    "ok": false,
                    "error": ErrorJson::from(&err),
                }));
            } else {
                eprintln!("error: {err}");
            }
            std::process::exit(EXIT_USAGE);
        }
    }
}

/// The compiler a command should use.
pub fn compiler_for(config: &Config, pyc: bool) -> Box<dyn Compiler> {
    if pyc {
        return Box::new(PycCompiler);
    }
    let program = config
        .python
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON));
    Box::new(HostCompiler::new(program))
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: failed to serialize output: {e}"),
    }
}
