//! CPython 2.x compiled-code model.
//!
//! - [`format`]: versioned opcode tables
//! - [`code`]: the read-only code unit and its constants
//! - [`marshal`]: `.pyc` container reader/writer
//! - [`linetable`]: offset to line decoding
//! - [`walker`]: instruction stream walker
//! - [`builder`]: assembler for fixtures and benchmarks

pub mod builder;
pub mod code;
pub mod format;
pub mod linetable;
pub mod marshal;
pub mod walker;

pub use builder::CodeUnitBuilder;
pub use code::{CodeUnit, CodeUnitParts, Constant};
pub use format::{BytecodeFormat, PY26, PY27};
pub use linetable::{LineBreakpoint, LineTable};
pub use marshal::{dump_pyc, load_pyc, PycHeader};
pub use walker::{Event, Walker};
