//! Versioned opcode tables.
//!
//! Each supported CPython 2.x release gets one immutable [`BytecodeFormat`].
//! Anything else fails closed with [`Error::UnsupportedBytecodeFormat`].

use crate::error::{Error, Result};

/// Opcode numbering and container magic of one bytecode format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytecodeFormat {
    /// Short name, e.g. `"2.7"`.
    pub name: &'static str,
    /// 16-bit magic number written at the start of `.pyc` containers.
    pub magic: u16,
    pub pop_top: u8,
    pub return_value: u8,
    pub import_star: u8,
    /// Opcodes at or above this value carry a 2-byte operand.
    pub have_argument: u8,
    pub store_name: u8,
    pub store_global: u8,
    pub load_const: u8,
    pub load_attr: u8,
    pub import_name: u8,
    pub import_from: u8,
    pub store_fast: u8,
    pub make_function: u8,
    pub extended_arg: u8,
}

/// CPython 2.6.
pub const PY26: BytecodeFormat = BytecodeFormat {
    name: "2.6",
    magic: 62161,
    pop_top: 1,
    return_value: 83,
    import_star: 84,
    have_argument: 90,
    store_name: 90,
    store_global: 97,
    load_const: 100,
    load_attr: 105,
    import_name: 107,
    import_from: 108,
    store_fast: 125,
    make_function: 132,
    extended_arg: 143,
};

/// CPython 2.7.
pub const PY27: BytecodeFormat = BytecodeFormat {
    name: "2.7",
    magic: 62211,
    pop_top: 1,
    return_value: 83,
    import_star: 84,
    have_argument: 90,
    store_name: 90,
    store_global: 97,
    load_const: 100,
    load_attr: 106,
    import_name: 108,
    import_from: 109,
    store_fast: 125,
    make_function: 132,
    extended_arg: 145,
};

/// Every supported format, oldest first.
pub const SUPPORTED: [&BytecodeFormat; 2] = [&PY26, &PY27];

impl BytecodeFormat {
    /// Look a format up by its name (`"2.6"`, `"2.7"`).
    pub fn by_name(name: &str) -> Result<&'static Self> {
        SUPPORTED
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                Error::UnsupportedBytecodeFormat(format!(
                    "unknown format '{name}' (supported: {})",
                    supported_names()
                ))
            })
    }

    /// Look a format up by its container magic.
    #[must_use]
    pub fn by_magic(magic: u16) -> Option<&'static Self> {
        SUPPORTED.into_iter().find(|f| f.magic == magic)
    }

    /// Ensure `marker` was produced for this format.
    pub fn check(&self, marker: u16) -> Result<()> {
        if marker == self.magic {
            return Ok(());
        }
        let found = match Self::by_magic(marker) {
            Some(other) => format!("{} (magic {marker})", other.name),
            None => format!("magic {marker}"),
        };
        Err(Error::UnsupportedBytecodeFormat(format!(
            "expected {} (magic {}), found {found}",
            self.name, self.magic
        )))
    }

    /// Whether `opcode` is followed by a 2-byte operand.
    #[must_use]
    pub fn has_argument(&self, opcode: u8) -> bool {
        opcode >= self.have_argument
    }
}

fn supported_names() -> String {
    SUPPORTED
        .iter()
        .map(|f| f.name)
        .collect::<Vec<_>>()
        .join(", ")
}
