//! Error vocabulary for the file-format writers (spec.md §7), bridging
//! `kdu-base`'s shared error kinds plus one writer-local kind for the
//! row-accumulator's ordering invariant.
use core::fmt::{Debug, Display, Formatter};

use kdu_base::errors::{ConfigError, FormatError, IoError};

/// The row accumulator received a `put()` out of the order spec.md §3
/// requires (`ScanlineBuffer`'s `next_x_tnum` invariant).
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RowError {
    UnexpectedTileColumn { row: usize, expected: usize, got: usize },
    RowOverrun { row: usize, declared_rows: usize }
}

impl Display for RowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnexpectedTileColumn { row, expected, got } => {
                write!(f, "row {row}: expected tile column {expected}, got {got}")
            }
            Self::RowOverrun { row, declared_rows } => {
                write!(f, "row {row} exceeds the declared image height of {declared_rows}")
            }
        }
    }
}

/// Unifies every error kind a [`crate::writer::LineSink`] can produce,
/// the same shape as the teacher's facade error aggregating per-format
/// errors (see DESIGN.md).
#[derive(Debug)]
pub enum WriteError {
    Config(ConfigError),
    Format(FormatError),
    Io(IoError),
    Row(RowError)
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Format(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "{e}"),
            Self::Row(e) => write!(f, "{e}")
        }
    }
}

impl From<ConfigError> for WriteError {
    fn from(value: ConfigError) -> Self {
        WriteError::Config(value)
    }
}

impl From<FormatError> for WriteError {
    fn from(value: FormatError) -> Self {
        WriteError::Format(value)
    }
}

impl From<IoError> for WriteError {
    fn from(value: IoError) -> Self {
        WriteError::Io(value)
    }
}

impl From<RowError> for WriteError {
    fn from(value: RowError) -> Self {
        WriteError::Row(value)
    }
}

impl From<kdu_base::bytestream::ZByteIoError> for WriteError {
    fn from(value: kdu_base::bytestream::ZByteIoError) -> Self {
        match value {
            kdu_base::bytestream::ZByteIoError::Io(msg) => {
                WriteError::Io(IoError::Io(std::io::Error::other(msg)))
            }
            kdu_base::bytestream::ZByteIoError::NotEnoughSpace { .. } => {
                WriteError::Io(IoError::Static("short write to output stream"))
            }
        }
    }
}
