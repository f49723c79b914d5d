use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes, surfaced in JSON output and failure lists.
pub mod codes {
    pub const FILE_READ_ERROR: &str = "FILE_READ_ERROR";
    pub const COMPILE_ERROR: &str = "COMPILE_ERROR";
    pub const COMPILER_UNAVAILABLE: &str = "COMPILER_UNAVAILABLE";
    pub const UNSUPPORTED_BYTECODE_FORMAT: &str = "UNSUPPORTED_BYTECODE_FORMAT";
    pub const TRUNCATED_INSTRUCTION: &str = "TRUNCATED_INSTRUCTION";
    pub const INVALID_OPERAND: &str = "INVALID_OPERAND";
    pub const INVALID_CONSTANT: &str = "INVALID_CONSTANT";
    pub const MARSHAL_ERROR: &str = "MARSHAL_ERROR";
    pub const CONFIG_READ_ERROR: &str = "CONFIG_READ_ERROR";
    pub const CONFIG_PARSE_ERROR: &str = "CONFIG_PARSE_ERROR";
    pub const IO_ERROR: &str = "IO_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Core error type for compage operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to compile {path}: {message}")]
    Compile { path: PathBuf, message: String },

    #[error("Compiler '{program}' could not be started: {source}")]
    CompilerUnavailable {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported bytecode format: {0}")]
    UnsupportedBytecodeFormat(String),

    #[error("Truncated instruction at offset {offset} (buffer length {len})")]
    TruncatedInstruction { offset: usize, len: usize },

    #[error("Operand {index} at offset {offset} is outside the {table} table")]
    InvalidOperand {
        offset: usize,
        index: usize,
        table: &'static str,
    },

    #[error("Unexpected constant at offset {offset}: {detail}")]
    InvalidConstant { offset: usize, detail: String },

    #[error("Malformed marshal data at byte {position}: {message}")]
    Marshal { position: usize, message: String },

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub(crate) fn marshal(position: usize, message: impl Into<String>) -> Self {
        Self::Marshal {
            position,
            message: message.into(),
        }
    }

    /// Stable code for this error (see [`codes`]).
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => codes::IO_ERROR,
            Self::FileRead { .. } => codes::FILE_READ_ERROR,
            Self::Compile { .. } => codes::COMPILE_ERROR,
            Self::CompilerUnavailable { .. } => codes::COMPILER_UNAVAILABLE,
            Self::UnsupportedBytecodeFormat(_) => codes::UNSUPPORTED_BYTECODE_FORMAT,
            Self::TruncatedInstruction { .. } => codes::TRUNCATED_INSTRUCTION,
            Self::InvalidOperand { .. } => codes::INVALID_OPERAND,
            Self::InvalidConstant { .. } => codes::INVALID_CONSTANT,
            Self::Marshal { .. } => codes::MARSHAL_ERROR,
            Self::ConfigRead { .. } => codes::CONFIG_READ_ERROR,
            Self::ConfigParse { .. } => codes::CONFIG_PARSE_ERROR,
            Self::Other(_) => codes::INTERNAL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = Error::TruncatedInstruction { offset: 4, len: 5 };
        assert_eq!(err.code(), "TRUNCATED_INSTRUCTION");
        assert_eq!(
            err.to_string(),
            "Truncated instruction at offset 4 (buffer length 5)"
        );

        assert_eq!(Error::other("boom").code(), codes::INTERNAL_ERROR);
        assert_eq!(
            Error::UnsupportedBytecodeFormat("3.1".into()).code(),
            codes::UNSUPPORTED_BYTECODE_FORMAT
        );
    }

    #[test]
    fn test_compile_error_mentions_path() {
        let err = Error::Compile {
            path: PathBuf::from("pkg/broken.py"),
            message: "SyntaxError: invalid syntax".into(),
        };
        assert_eq!(err.code(), codes::COMPILE_ERROR);
        assert!(err.to_string().contains("pkg/broken.py"));
    }

    #[test]
    fn test_io_from() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code(), codes::IO_ERROR);
    }
}
