use std::{io, path::PathBuf};

use nom::error::{ErrorKind, ParseError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Parser result threaded through every class-file decoder.
pub type PResult<'a, T> = nom::IResult<&'a [u8], T, ClassFormatError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed class file: {0}")]
    ClassFormat(#[from] ClassFormatError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupted archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("zip entry '{entry}' tries to escape target directory {}", archive.display())]
    ZipSlip { archive: PathBuf, entry: String },

    #[error("no class link registered for {0}")]
    MissingLink(String),

    #[error("failed to save units: {}", failed_units.join(", "))]
    Save { failed_units: Vec<String> },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFormatError {
    #[error("unexpected end of data ({remaining} bytes left)")]
    Truncated { remaining: usize },

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: usize },

    #[error("constant pool index {index} is not a {expected}")]
    BadConstant { index: u16, expected: &'static str },

    #[error("illegal opcode {opcode:#04x} at bytecode offset {offset}")]
    IllegalOpcode { opcode: u8, offset: usize },

    #[error("switch at offset {offset} declares an impossible case count")]
    BadSwitch { offset: usize },

    #[error("instruction at offset {offset} runs past the declared code length {code_length}")]
    CodeOverrun { offset: usize, code_length: usize },

    #[error("jump from offset {from} to {to} does not land on an instruction")]
    BadJumpTarget { from: usize, to: i64 },

    #[error("malformed modified UTF-8 constant")]
    BadUtf8,

    #[error("invalid descriptor or signature '{0}'")]
    InvalidDescriptor(String),

    #[error("attribute {name} declares {declared} bytes but decodes {actual}")]
    AttributeLength {
        name: String,
        declared: usize,
        actual: usize,
    },

    #[error("trailing {0} bytes after class file end")]
    TrailingData(usize),

    #[error("parser failed: {kind:?} ({remaining} bytes left)")]
    Syntax { kind: ErrorKind, remaining: usize },
}

impl ParseError<&[u8]> for ClassFormatError {
    fn from_error_kind(input: &[u8], kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Eof | ErrorKind::Complete => ClassFormatError::Truncated {
                remaining: input.len(),
            },
            _ => ClassFormatError::Syntax {
                kind,
                remaining: input.len(),
            },
        }
    }

    fn append(_: &[u8], _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl ParseError<&str> for ClassFormatError {
    fn from_error_kind(input: &str, _: ErrorKind) -> Self {
        ClassFormatError::InvalidDescriptor(input.to_string())
    }

    fn append(_: &str, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl From<nom::Err<ClassFormatError>> for ClassFormatError {
    fn from(err: nom::Err<ClassFormatError>) -> Self {
        match err {
            nom::Err::Incomplete(_) => ClassFormatError::Truncated { remaining: 0 },
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
        }
    }
}

impl From<nom::Err<ClassFormatError>> for Error {
    fn from(err: nom::Err<ClassFormatError>) -> Self {
        Error::ClassFormat(err.into())
    }
}

impl From<ClassFormatError> for nom::Err<ClassFormatError> {
    fn from(err: ClassFormatError) -> Self {
        nom::Err::Failure(err)
    }
}

/// Aborts the current parse with a structural violation.
pub(crate) fn fail<T>(err: ClassFormatError) -> std::result::Result<T, nom::Err<ClassFormatError>> {
    Err(nom::Err::Failure(err))
}
