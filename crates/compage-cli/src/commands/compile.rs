//! `compage compile` command implementation.
//!
//! Compiles a source file with the host interpreter and saves the `.pyc`
//! container, so fixtures can be produced once and scanned with `--pyc`.

use super::{bytecode_format, print_json, resolve_path, ErrorJson, EXIT_PARTIAL};
use compage_core::bytecode::{dump_pyc, BytecodeFormat};
use compage_core::compiler::DEFAULT_PYTHON;
use compage_core::{Compiler, Config, Error, HostCompiler, SCHEMA_VERSION};
use compage_util::fs::{atomic_write, read_source_lossy};
use compage_util::hash::blake3_bytes;
use miette::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::info;

#[derive(Serialize)]
struct CompileOutput {
    schema_version: u32,
    ok: bool,
    path: String,
    output: String,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blake3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

pub fn run(config: &Config, file: &Path, emit: &Path, json: bool) -> Result<()> {
    let path = resolve_path(&config.cwd, file);
    let out = resolve_path(&config.cwd, emit);
    let format = bytecode_format(&config.format, json);
    let program = config
        .python
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON));
    let compiler = HostCompiler::new(program);

    let outcome = compile_to(&compiler, &path, &out, format);

    if json {
        let (bytes, blake3, error) = match &outcome {
            Ok(bytes) => (Some(bytes.len()), Some(blake3_bytes(bytes)), None),
            Err(err) => (None, None, Some(ErrorJson::from(err))),
        };
        print_json(&CompileOutput {
            schema_version: SCHEMA_VERSION,
            ok: outcome.is_ok(),
            path: path.display().to_string(),
            output: out.display().to_string(),
            format: format.name,
            bytes,
            blake3,
            error,
        });
    } else {
        match &outcome {
            Ok(bytes) => println!("wrote {} ({} bytes)", out.display(), bytes.len()),
            Err(err) => eprintln!("error: {err}"),
        }
    }

    if outcome.is_err() {
        std::process::exit(EXIT_PARTIAL);
    }
    Ok(())
}

fn compile_to(
    compiler: &HostCompiler,
    path: &Path,
    out: &Path,
    format: &BytecodeFormat,
) -> compage_core::Result<Vec<u8>> {
    let source = read_source_lossy(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let unit = compiler.compile(path, &source, format)?;

    // The container keeps a 32-bit mtime, as CPython 2 writes it.
    let mtime = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_secs() as u32);

    let bytes = dump_pyc(&unit, mtime)?;
    atomic_write(out, &bytes)?;
    info!(path = %out.display(), bytes = bytes.len(), "compiled");
    Ok(bytes)
}
