//! Linear walk over an instruction buffer.
//!
//! The walker recognizes two shapes:
//!
//! - `STORE_NAME` / `STORE_GLOBAL` with a names-table operand
//! - `LOAD_CONST level; LOAD_CONST fromlist; IMPORT_NAME module`, which is
//!   what every `import` statement compiles to
//!
//! Everything else is skipped by width. The walk never reads past the end of
//! the buffer; a truncated instruction or an operand outside its table ends
//! the walk with a single error item.

use super::code::{CodeUnit, Constant};
use super::format::BytecodeFormat;
use crate::error::{Error, Result};

/// Width of an instruction with an operand.
const ARG_WIDTH: usize = 3;

/// Width of the three-instruction import pattern.
const IMPORT_WIDTH: usize = 3 * ARG_WIDTH;

/// An offset-tagged event found in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A store to a module-level or global name.
    Store { offset: usize, name_index: usize },
    /// Implicit-relative import (level `-1` or `None`).
    Import {
        offset: usize,
        fromlist_index: usize,
        module_index: usize,
    },
    /// Absolute import (level `0`).
    AbsoluteImport {
        offset: usize,
        fromlist_index: usize,
        module_index: usize,
    },
    /// Explicit relative import (level `> 0`).
    RelativeImport {
        offset: usize,
        level: u32,
        fromlist_index: usize,
        module_index: usize,
    },
}

impl Event {
    /// Offset of the first instruction of the event.
    #[must_use]
    pub fn offset(&self) -> usize {
        match *self {
            Self::Store { offset, .. }
            | Self::Import { offset, .. }
            | Self::AbsoluteImport { offset, .. }
            | Self::RelativeImport { offset, .. } => offset,
        }
    }
}

/// Lazy iterator of events over one unit's instruction buffer.
pub struct Walker<'a> {
    unit: &'a CodeUnit,
    format: &'a BytecodeFormat,
    cursor: usize,
    done: bool,
}

impl<'a> Walker<'a> {
    #[must_use]
    pub fn new(unit: &'a CodeUnit, format: &'a BytecodeFormat) -> Self {
        Self {
            unit,
            format,
            cursor: 0,
            done: false,
        }
    }

    /// Current position in the buffer.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn opcode_at(&self, offset: usize) -> Option<u8> {
        self.unit.code().get(offset).copied()
    }

    /// Little-endian operand of the instruction starting at `offset`.
    fn operand(&self, offset: usize) -> Result<usize> {
        let code = self.unit.code();
        match code.get(offset + 1..offset + ARG_WIDTH) {
            Some(&[lo, hi]) => Ok(usize::from(u16::from_le_bytes([lo, hi]))),
            _ => Err(Error::TruncatedInstruction {
                offset,
                len: code.len(),
            }),
        }
    }

    fn name_index(&self, offset: usize) -> Result<usize> {
        let index = self.operand(offset)?;
        if index < self.unit.names().len() {
            Ok(index)
        } else {
            Err(Error::InvalidOperand {
                offset,
                index,
                table: "names",
            })
        }
    }

    fn const_index(&self, offset: usize) -> Result<usize> {
        let index = self.operand(offset)?;
        if index < self.unit.consts().len() {
            Ok(index)
        } else {
            Err(Error::InvalidOperand {
                offset,
                index,
                table: "constants",
            })
        }
    }

    fn is_import_pattern(&self, at: usize) -> bool {
        let f = self.format;
        self.opcode_at(at) == Some(f.load_const)
            && self.opcode_at(at + ARG_WIDTH) == Some(f.load_const)
            && self.opcode_at(at + 2 * ARG_WIDTH) == Some(f.import_name)
    }

    fn import_event(&self, at: usize) -> Result<Event> {
        let level_index = self.const_index(at)?;
        let fromlist_index = self.const_index(at + ARG_WIDTH)?;
        let module_index = self.name_index(at + 2 * ARG_WIDTH)?;

        let event = match &self.unit.consts()[level_index] {
            Constant::None => Event::Import {
                offset: at,
                fromlist_index,
                module_index,
            },
            level => match level.as_int() {
                Some(-1) => Event::Import {
                    offset: at,
                    fromlist_index,
                    module_index,
                },
                Some(0) => Event::AbsoluteImport {
                    offset: at,
                    fromlist_index,
                    module_index,
                },
                Some(n) if n > 0 => Event::RelativeImport {
                    offset: at,
                    level: u32::try_from(n).map_err(|_| Error::InvalidConstant {
                        offset: at,
                        detail: format!("import level {n} out of range"),
                    })?,
                    fromlist_index,
                    module_index,
                },
                Some(n) => {
                    return Err(Error::InvalidConstant {
                        offset: at,
                        detail: format!("import level {n}"),
                    })
                }
                None => {
                    return Err(Error::InvalidConstant {
                        offset: at,
                        detail: format!("import level of kind {}", level.kind()),
                    })
                }
            },
        };
        Ok(event)
    }

    fn fail(&mut self, err: Error) -> Option<Result<Event>> {
        self.done = true;
        Some(Err(err))
    }
}

impl Iterator for Walker<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.unit.code().len();
        while !self.done && self.cursor < len {
            let at = self.cursor;
            let opcode = self.unit.code()[at];

            if opcode == self.format.store_name || opcode == self.format.store_global {
                return match self.name_index(at) {
                    Ok(name_index) => {
                        self.cursor += ARG_WIDTH;
                        Some(Ok(Event::Store {
                            offset: at,
                            name_index,
                        }))
                    }
                    Err(err) => self.fail(err),
                };
            }

            if self.is_import_pattern(at) {
                return match self.import_event(at) {
                    Ok(event) => {
                        self.cursor += IMPORT_WIDTH;
                        Some(Ok(event))
                    }
                    Err(err) => self.fail(err),
                };
            }

            if self.format.has_argument(opcode) {
                if at + ARG_WIDTH > len {
                    return self.fail(Error::TruncatedInstruction { offset: at, len });
                }
                self.cursor += ARG_WIDTH;
            } else {
                self.cursor += 1;
            }
        }
        None
    }
}
