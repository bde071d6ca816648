//! Errors this binary's own glue code can raise: bad argument text, input
//! that doesn't match the declared geometry, and an unrecognised output
//! extension. Everything from the library crates underneath is wrapped
//! rather than re-described.
use std::fmt::{Debug, Display, Formatter};

use kdu_base::errors::ConfigError;
use kdu_imageio::WriteError;

#[derive(Debug)]
pub enum CliError {
    InvalidFprec { spec: String },
    InvalidFilter { name: String },
    InvalidDirection { name: String },
    /// The input file's byte length doesn't match `width * height * 4`.
    InputSizeMismatch { expected: usize, got: usize },
    /// The `-o` extension isn't one this binary knows how to dispatch.
    UnknownOutputExtension { extension: String },
    /// `-fprec ...F<e>` was given for a writer that doesn't carry a
    /// float sample format (only TIFF does).
    FloatPrecisionNotSupported { writer: &'static str },
    Io(std::io::Error),
    Config(ConfigError),
    Write(WriteError)
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFprec { spec } => write!(f, "invalid -fprec value {spec:?}"),
            Self::InvalidFilter { name } => write!(f, "invalid -filter value {name:?}"),
            Self::InvalidDirection { name } => write!(f, "invalid -direction value {name:?}"),
            Self::InputSizeMismatch { expected, got } => {
                write!(f, "input is {got} bytes, expected {expected} for the declared width/height")
            }
            Self::UnknownOutputExtension { extension } => {
                write!(f, "no writer recognises output extension {extension:?}")
            }
            Self::FloatPrecisionNotSupported { writer } => {
                write!(f, "-fprec's F<e> float re-interpretation is only supported by the tiff writer, not {writer}")
            }
            Self::Io(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "{e}"),
            Self::Write(e) => write!(f, "{e}")
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        CliError::Io(value)
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        CliError::Config(value)
    }
}

impl From<WriteError> for CliError {
    fn from(value: WriteError) -> Self {
        CliError::Write(value)
    }
}
