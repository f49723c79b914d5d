//! Reader and writer for `.pyc` containers.
//!
//! Layout: magic (u16 LE) + `\r\n`, a 4-byte modification time, then one
//! marshalled code object. Only the 2.x marshal type codes are understood.

use super::code::{CodeUnit, CodeUnitParts, Constant};
use super::format::BytecodeFormat;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Size of the container header.
pub const HEADER_LEN: usize = 8;

/// Maximum nesting of marshalled containers.
pub const MAX_DEPTH: usize = 2000;

mod tag {
    pub const NULL: u8 = b'0';
    pub const NONE: u8 = b'N';
    pub const FALSE: u8 = b'F';
    pub const TRUE: u8 = b'T';
    pub const STOPITER: u8 = b'S';
    pub const ELLIPSIS: u8 = b'.';
    pub const INT: u8 = b'i';
    pub const INT64: u8 = b'I';
    pub const FLOAT: u8 = b'f';
    pub const BINARY_FLOAT: u8 = b'g';
    pub const COMPLEX: u8 = b'x';
    pub const BINARY_COMPLEX: u8 = b'y';
    pub const LONG: u8 = b'l';
    pub const STRING: u8 = b's';
    pub const INTERNED: u8 = b't';
    pub const STRINGREF: u8 = b'R';
    pub const TUPLE: u8 = b'(';
    pub const LIST: u8 = b'[';
    pub const DICT: u8 = b'{';
    pub const CODE: u8 = b'c';
    pub const UNICODE: u8 = b'u';
    pub const SET: u8 = b'<';
    pub const FROZENSET: u8 = b'>';
}

/// Parsed `.pyc` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PycHeader {
    pub magic: u16,
    pub mtime: u32,
}

impl PycHeader {
    /// Parse the first [`HEADER_LEN`] bytes of a container.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let Some(header) = bytes.get(..HEADER_LEN) else {
            return Err(Error::marshal(
                bytes.len(),
                format!("container shorter than {HEADER_LEN}-byte header"),
            ));
        };
        if &header[2..4] != b"\r\n" {
            return Err(Error::marshal(2, "missing \\r\\n after magic"));
        }
        Ok(Self {
            magic: u16::from_le_bytes([header[0], header[1]]),
            mtime: u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
        })
    }
}

/// Decode a `.pyc` container compiled for `format`.
///
/// The magic is checked before anything else is decoded.
pub fn load_pyc(bytes: &[u8], format: &BytecodeFormat) -> Result<CodeUnit> {
    let header = PycHeader::parse(bytes)?;
    format.check(header.magic)?;

    let mut reader = Reader::new(&bytes[HEADER_LEN..], HEADER_LEN, header.magic);
    match reader.value()? {
        Constant::Code(unit) => {
            Ok(Arc::try_unwrap(unit).unwrap_or_else(|shared| (*shared).clone()))
        }
        other => Err(Error::marshal(
            HEADER_LEN,
            format!("expected a code object, found {}", other.kind()),
        )),
    }
}

/// Encode `unit` as a `.pyc` container stamped with `mtime`.
///
/// Strings are always written inline; interning is not reproduced.
pub fn dump_pyc(unit: &CodeUnit, mtime: u32) -> Result<Vec<u8>> {
    let mut writer = Writer { out: Vec::new() };
    writer.out.extend_from_slice(&unit.format_marker().to_le_bytes());
    writer.out.extend_from_slice(b"\r\n");
    writer.out.extend_from_slice(&mtime.to_le_bytes());
    writer.code(unit)?;
    Ok(writer.out)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
    marker: u16,
    interned: Vec<Vec<u8>>,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], base: usize, marker: u16) -> Self {
        Self {
            data,
            pos: 0,
            base,
            marker,
            interned: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::marshal(self.base + self.pos, message)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.error(format!("unexpected end of data reading {n} bytes")))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(i64::from_le_bytes(buf))
    }

    fn f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(f64::from_le_bytes(buf))
    }

    fn len(&mut self) -> Result<usize> {
        let n = self.i32()?;
        usize::try_from(n).map_err(|_| self.error(format!("negative length {n}")))
    }

    fn text_float(&mut self) -> Result<f64> {
        let n = usize::from(self.byte()?);
        let raw = self.take(n)?;
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| self.error("invalid float literal"))
    }

    /// A byte string in any of its three encodings.
    fn raw_string(&mut self) -> Result<Vec<u8>> {
        let code = self.byte()?;
        match self.string_body(code) {
            Some(raw) => raw,
            None => Err(self.error(format!(
                "expected a string, found type {:?}",
                char::from(code)
            ))),
        }
    }

    fn string_body(&mut self, code: u8) -> Option<Result<Vec<u8>>> {
        match code {
            tag::STRING | tag::INTERNED | tag::STRINGREF => Some(self.string_of(code)),
            _ => None,
        }
    }

    fn string_of(&mut self, code: u8) -> Result<Vec<u8>> {
        let n = self.len()?;
        if code == tag::STRINGREF {
            return self
                .interned
                .get(n)
                .cloned()
                .ok_or_else(|| self.error(format!("string reference {n} out of range")));
        }
        let raw = self.take(n)?.to_vec();
        if code == tag::INTERNED {
            self.interned.push(raw.clone());
        }
        Ok(raw)
    }

    fn string(&mut self) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.raw_string()?).into_owned())
    }

    fn names_of(&self, value: Constant) -> Result<Vec<String>> {
        match value {
            Constant::Tuple(items) => items
                .into_iter()
                .map(|item| match item {
                    Constant::Str(s) | Constant::Unicode(s) => Ok(s),
                    other => Err(self.error(format!("expected a name, found {}", other.kind()))),
                })
                .collect(),
            other => Err(self.error(format!("expected a tuple of names, found {}", other.kind()))),
        }
    }

    /// Decode one object.
    ///
    /// Containers are kept on an explicit stack, so nesting costs heap
    /// rather than native stack and [`MAX_DEPTH`] holds on any thread.
    fn value(&mut self) -> Result<Constant> {
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            if stack.len() >= MAX_DEPTH {
                return Err(self.error(format!("nesting deeper than {MAX_DEPTH}")));
            }
            let mut finished = match self.open()? {
                Step::Value(value) => Some(value),
                Step::Frame(frame) => {
                    stack.push(frame);
                    None
                }
            };

            // Hand finished values to their parents until one still wants more.
            loop {
                if let Some(value) = finished.take() {
                    let Some(top) = stack.last_mut() else {
                        return Ok(value);
                    };
                    top.accept(value);
                }
                let Some(top) = stack.last_mut() else { break };
                finished = self.close(top)?;
                if finished.is_none() {
                    break;
                }
                stack.pop();
            }
        }
    }

    /// Read a type code and either a whole scalar or a container header.
    fn open(&mut self) -> Result<Step> {
        let code = self.byte()?;
        if let Some(raw) = self.string_body(code) {
            return Ok(Step::Value(Constant::Str(
                String::from_utf8_lossy(&raw?).into_owned(),
            )));
        }

        let value = match code {
            tag::NONE => Constant::None,
            tag::FALSE => Constant::Bool(false),
            tag::TRUE => Constant::Bool(true),
            tag::STOPITER => Constant::StopIteration,
            tag::ELLIPSIS => Constant::Ellipsis,
            tag::INT => Constant::Int(i64::from(self.i32()?)),
            tag::INT64 => Constant::Int(self.i64()?),
            tag::FLOAT => Constant::Float(self.text_float()?),
            tag::BINARY_FLOAT => Constant::Float(self.f64()?),
            tag::COMPLEX => {
                let re = self.text_float()?;
                Constant::Complex(re, self.text_float()?)
            }
            tag::BINARY_COMPLEX => {
                let re = self.f64()?;
                Constant::Complex(re, self.f64()?)
            }
            tag::LONG => {
                let n = self.i32()?;
                let count = n.unsigned_abs() as usize;
                let raw = self.take(count.saturating_mul(2))?;
                Constant::Long {
                    negative: n < 0,
                    digits: raw
                        .chunks_exact(2)
                        .map(|d| u16::from_le_bytes([d[0], d[1]]))
                        .collect(),
                }
            }
            tag::UNICODE => {
                let n = self.len()?;
                Constant::Unicode(String::from_utf8_lossy(self.take(n)?).into_owned())
            }
            tag::TUPLE | tag::LIST | tag::SET | tag::FROZENSET => {
                let len = self.len()?;
                return Ok(Step::Frame(Frame::Items {
                    code,
                    len,
                    items: Vec::with_capacity(len.min(self.data.len() - self.pos)),
                }));
            }
            tag::DICT => {
                return Ok(Step::Frame(Frame::Dict {
                    entries: Vec::new(),
                    key: None,
                }))
            }
            tag::CODE => {
                let head = CodeHead {
                    argcount: self.i32()?,
                    nlocals: self.i32()?,
                    stacksize: self.i32()?,
                    flags: self.i32()?,
                    code: self.raw_string()?,
                    fields: Vec::with_capacity(CODE_FIELDS),
                };
                return Ok(Step::Frame(Frame::Code(Box::new(head))));
            }
            tag::NULL => return Err(self.error("unexpected NULL object")),
            other => {
                return Err(self.error(format!("unknown type code {:?}", char::from(other))));
            }
        };
        Ok(Step::Value(value))
    }

    /// The finished container, or `None` while `frame` expects more objects.
    fn close(&mut self, frame: &mut Frame) -> Result<Option<Constant>> {
        match frame {
            Frame::Items { code, len, items } => {
                if items.len() < *len {
                    return Ok(None);
                }
                let items = std::mem::take(items);
                Ok(Some(match *code {
                    tag::LIST => Constant::List(items),
                    tag::SET => Constant::Set(items),
                    tag::FROZENSET => Constant::FrozenSet(items),
                    _ => Constant::Tuple(items),
                }))
            }
            Frame::Dict { entries, key } => {
                if key.is_some() || self.data.get(self.pos) != Some(&tag::NULL) {
                    return Ok(None);
                }
                self.pos += 1;
                Ok(Some(Constant::Dict(std::mem::take(entries))))
            }
            Frame::Code(head) => {
                if head.fields.len() < CODE_FIELDS {
                    return Ok(None);
                }
                let head = std::mem::take(&mut **head);
                Ok(Some(Constant::Code(Arc::new(self.code_tail(head)?))))
            }
        }
    }

    /// Finish a code object once its nested objects are decoded.
    fn code_tail(&mut self, head: CodeHead) -> Result<CodeUnit> {
        let mut fields = head.fields.into_iter();
        let mut next = || fields.next().unwrap_or(Constant::None);
        let consts = match next() {
            Constant::Tuple(items) => items,
            other => {
                return Err(self.error(format!("expected constants tuple, found {}", other.kind())))
            }
        };
        let names = self.names_of(next())?;
        let varnames = self.names_of(next())?;
        let freevars = self.names_of(next())?;
        let cellvars = self.names_of(next())?;
        let filename = self.string()?;
        let name = self.string()?;
        let first_line = self.i32()?;
        let first_line = u32::try_from(first_line)
            .map_err(|_| self.error(format!("negative first line {first_line}")))?;
        let lnotab = self.raw_string()?;

        Ok(CodeUnit::from_parts(CodeUnitParts {
            format_marker: self.marker,
            argcount: head.argcount,
            nlocals: head.nlocals,
            stacksize: head.stacksize,
            flags: head.flags,
            code: head.code,
            consts,
            names,
            varnames,
            freevars,
            cellvars,
            filename,
            name,
            first_line,
            lnotab,
        }))
    }
}

/// Objects a code object holds: consts, names, varnames, freevars, cellvars.
const CODE_FIELDS: usize = 5;

enum Step {
    Value(Constant),
    Frame(Frame),
}

/// A container whose members are still being decoded.
enum Frame {
    Items {
        code: u8,
        len: usize,
        items: Vec<Constant>,
    },
    Dict {
        entries: Vec<(Constant, Constant)>,
        key: Option<Constant>,
    },
    Code(Box<CodeHead>),
}

impl Frame {
    fn accept(&mut self, value: Constant) {
        match self {
            Self::Items { items, .. } => items.push(value),
            Self::Dict { entries, key } => match key.take() {
                Some(k) => entries.push((k, value)),
                None => *key = Some(value),
            },
            Self::Code(head) => head.fields.push(value),
        }
    }
}

#[derive(Default)]
struct CodeHead {
    argcount: i32,
    nlocals: i32,
    stacksize: i32,
    flags: i32,
    code: Vec<u8>,
    fields: Vec<Constant>,
}

struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn len(&mut self, n: usize) -> Result<()> {
        let n = i32::try_from(n)
            .map_err(|_| Error::marshal(self.out.len(), format!("length {n} too large")))?;
        self.out.extend_from_slice(&n.to_le_bytes());
        Ok(())
    }

    fn bytes(&mut self, raw: &[u8]) -> Result<()> {
        self.out.push(tag::STRING);
        self.len(raw.len())?;
        self.out.extend_from_slice(raw);
        Ok(())
    }

    fn names(&mut self, names: &[String]) -> Result<()> {
        self.out.push(tag::TUPLE);
        self.len(names.len())?;
        for name in names {
            self.bytes(name.as_bytes())?;
        }
        Ok(())
    }

    fn items(&mut self, code: u8, items: &[Constant]) -> Result<()> {
        self.out.push(code);
        self.len(items.len())?;
        items.iter().try_for_each(|item| self.value(item))
    }

    fn value(&mut self, value: &Constant) -> Result<()> {
        match value {
            Constant::None => self.out.push(tag::NONE),
            Constant::Bool(true) => self.out.push(tag::TRUE),
            Constant::Bool(false) => self.out.push(tag::FALSE),
            Constant::StopIteration => self.out.push(tag::STOPITER),
            Constant::Ellipsis => self.out.push(tag::ELLIPSIS),
            Constant::Int(v) => match i32::try_from(*v) {
                Ok(small) => {
                    self.out.push(tag::INT);
                    self.out.extend_from_slice(&small.to_le_bytes());
                }
                Err(_) => {
                    self.out.push(tag::INT64);
                    self.out.extend_from_slice(&v.to_le_bytes());
                }
            },
            Constant::Long { negative, digits } => {
                self.out.push(tag::LONG);
                let n = i32::try_from(digits.len())
                    .map_err(|_| Error::marshal(self.out.len(), "long too large"))?;
                let n = if *negative { -n } else { n };
                self.out.extend_from_slice(&n.to_le_bytes());
                for digit in digits {
                    self.out.extend_from_slice(&digit.to_le_bytes());
                }
            }
            Constant::Float(v) => {
                self.out.push(tag::BINARY_FLOAT);
                self.out.extend_from_slice(&v.to_le_bytes());
            }
            Constant::Complex(re, im) => {
                self.out.push(tag::BINARY_COMPLEX);
                self.out.extend_from_slice(&re.to_le_bytes());
                self.out.extend_from_slice(&im.to_le_bytes());
            }
            Constant::Str(s) => self.bytes(s.as_bytes())?,
            Constant::Unicode(s) => {
                self.out.push(tag::UNICODE);
                self.len(s.len())?;
                self.out.extend_from_slice(s.as_bytes());
            }
            Constant::Tuple(items) => self.items(tag::TUPLE, items)?,
            Constant::List(items) => self.items(tag::LIST, items)?,
            Constant::Set(items) => self.items(tag::SET, items)?,
            Constant::FrozenSet(items) => self.items(tag::FROZENSET, items)?,
            Constant::Dict(entries) => {
                self.out.push(tag::DICT);
                for (key, val) in entries {
                    self.value(key)?;
                    self.value(val)?;
                }
                self.out.push(tag::NULL);
            }
            Constant::Code(unit) => self.code(unit)?,
        }
        Ok(())
    }

    fn code(&mut self, unit: &CodeUnit) -> Result<()> {
        let parts = unit.parts();
        self.out.push(tag::CODE);
        for field in [parts.argcount, parts.nlocals, parts.stacksize, parts.flags] {
            self.out.extend_from_slice(&field.to_le_bytes());
        }
        self.bytes(&parts.code)?;
        self.items(tag::TUPLE, &parts.consts)?;
        self.names(&parts.names)?;
        self.names(&parts.varnames)?;
        self.names(&parts.freevars)?;
        self.names(&parts.cellvars)?;
        self.bytes(parts.filename.as_bytes())?;
        self.bytes(parts.name.as_bytes())?;
        let first_line = i32::try_from(parts.first_line)
            .map_err(|_| Error::marshal(self.out.len(), "first line too large"))?;
        self.out.extend_from_slice(&first_line.to_le_bytes());
        self.bytes(&parts.lnotab)
    }
}
