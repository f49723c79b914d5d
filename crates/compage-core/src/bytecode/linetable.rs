//! Byte offset to source line mapping.
//!
//! The compressed table is a run of `(byte_delta, line_delta)` byte pairs.
//! Decoding yields one breakpoint per line start; lookups take the closest
//! breakpoint at or before an offset.

use serde::Serialize;

/// Start of a source line in the instruction buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineBreakpoint {
    pub offset: usize,
    pub line: u32,
}

/// Decoded line table of one code unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineTable {
    first_line: u32,
    breakpoints: Vec<LineBreakpoint>,
}

impl LineTable {
    /// Decode `lnotab` for a unit starting at `first_line`.
    ///
    /// A trailing odd byte is ignored.
    #[must_use]
    pub fn decode(lnotab: &[u8], first_line: u32) -> Self {
        let mut breakpoints = Vec::with_capacity(lnotab.len() / 2 + 1);
        let mut last_line = None;
        let mut line = first_line;
        let mut offset = 0usize;

        for pair in lnotab.chunks_exact(2) {
            let (byte_delta, line_delta) = (pair[0], pair[1]);
            if byte_delta != 0 {
                if last_line != Some(line) {
                    breakpoints.push(LineBreakpoint { offset, line });
                    last_line = Some(line);
                }
                offset += usize::from(byte_delta);
            }
            line = line.saturating_add(u32::from(line_delta));
        }

        if last_line != Some(line) {
            breakpoints.push(LineBreakpoint { offset, line });
        }

        Self {
            first_line,
            breakpoints,
        }
    }

    #[must_use]
    pub fn first_line(&self) -> u32 {
        self.first_line
    }

    /// Breakpoints in strictly increasing offset order.
    #[must_use]
    pub fn breakpoints(&self) -> &[LineBreakpoint] {
        &self.breakpoints
    }

    /// Line of the instruction at `offset`.
    #[must_use]
    pub fn line_for_offset(&self, offset: usize) -> u32 {
        let idx = self.breakpoints.partition_point(|bp| bp.offset <= offset);
        match idx {
            0 => self.first_line,
            n => self.breakpoints[n - 1].line,
        }
    }
}
