#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::return_self_not_must_use)]

//! Import scanning for CPython 2.6/2.7 compiled code units.
//!
//! A source file is compiled (by a host interpreter, or read from a `.pyc`),
//! every code unit in the resulting tree is walked for import instructions,
//! and the records are merged into an index keyed by top-level module name.

pub mod aggregate;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod discovery;
pub mod error;
pub mod imports;
pub mod report;
pub mod version;

pub use aggregate::{Aggregator, FileFailure, ImportIndex, Occurrence, Parallelism};
pub use compiler::{scan_file, Compiler, HostCompiler, PycCompiler};
pub use config::{Config, ProjectConfig};
pub use discovery::{find_source_files, SourceFiles};
pub use error::{codes, Error, Result};
pub use imports::{
    extract_imports, scan_unit, ImportRecord, ImportScanner, ImportStyle, ScanResult, UnitFailure,
};
pub use report::{DependencyReport, ImportReporter, RankEntry};
pub use version::{SCHEMA_VERSION, VERSION};
