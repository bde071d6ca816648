//! Shared error vocabulary.
//!
//! Each crate in this family defines its own error enum scoped to its own
//! failure modes and bridges it into these shared kinds with `From`, the
//! same pattern the rest of the corpus uses to aggregate per-format errors
//! into a facade error type.
use core::fmt::{Debug, Display, Formatter};

/// Precision forcing or representation is inconsistent with the source
/// line's actual representation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    /// Float re-interpretation was requested on a line that does not carry
    /// absolute integers (see `LineBuffer::is_absolute`).
    NotAbsoluteInteger,
    /// Signed float output was requested at a precision below 2 bits.
    SignedFloatPrecisionTooLow { precision: u32 },
    /// `align_lsbs` pushed the effective upshift negative; see DESIGN.md for
    /// why this variant is reserved rather than currently constructed.
    NegativeUpshift { requested: i32 },
    /// An exponent width that does not fit within `1..=min(P-1, 31)`.
    InvalidExponentWidth { exponent_bits: u32, precision: u32 }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotAbsoluteInteger => {
                write!(f, "float re-interpretation requires an absolute integer line")
            }
            Self::SignedFloatPrecisionTooLow { precision } => {
                write!(f, "signed float output requires precision >= 2, got {precision}")
            }
            Self::NegativeUpshift { requested } => {
                write!(f, "lsb alignment would require a negative upshift ({requested})")
            }
            Self::InvalidExponentWidth {
                exponent_bits,
                precision
            } => {
                write!(
                    f,
                    "exponent width {exponent_bits} does not fit precision {precision}"
                )
            }
        }
    }
}

/// File-format-specific constraints violated.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormatError {
    /// PPM/PAM requested with components of differing dimensions.
    ComponentDimensionMismatch,
    /// PPM/PAM requested with components of differing sign.
    ComponentSignMismatch,
    /// RAW requested at a precision above 32 bits.
    PrecisionTooWide { precision: u32, max: u32 },
    /// TIFF strip would exceed the classic-TIFF size limit without BigTIFF.
    StripTooLargeWithoutBigTiff { strip_bytes: u64 },
    /// An unsupported colour interpretation for this writer.
    UnsupportedColour
}

impl Display for FormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ComponentDimensionMismatch => {
                write!(f, "components have differing dimensions")
            }
            Self::ComponentSignMismatch => write!(f, "components have differing sign"),
            Self::PrecisionTooWide { precision, max } => {
                write!(f, "precision {precision} exceeds maximum of {max} bits")
            }
            Self::StripTooLargeWithoutBigTiff { strip_bytes } => {
                write!(
                    f,
                    "strip of {strip_bytes} bytes exceeds classic TIFF limits; enable BigTIFF"
                )
            }
            Self::UnsupportedColour => write!(f, "unsupported colour interpretation for this writer")
        }
    }
}

/// A write to the underlying output stream failed.
#[derive(Debug)]
pub enum IoError {
    Static(&'static str),
    /// Wraps `std::io::Error` when built with the `std` feature.
    #[cfg(feature = "std")]
    Io(std::io::Error)
}

impl Display for IoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Static(s) => write!(f, "{s}"),
            #[cfg(feature = "std")]
            Self::Io(e) => write!(f, "{e}")
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for IoError {
    fn from(value: std::io::Error) -> Self {
        IoError::Io(value)
    }
}

/// A non-fatal condition per spec.md §7: logged, never aborts.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LogicError {
    /// A writer was dropped before every declared row was presented.
    IncompleteRows { rows_written: usize, rows_declared: usize },
    /// Signed data was silently re-centred to an unsigned byte range.
    SignedDataRecentred,
    /// An unusual colour interpretation was written as RGB with a warning.
    UnusualColourAsRgb
}

impl Display for LogicError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::IncompleteRows {
                rows_written,
                rows_declared
            } => write!(
                f,
                "writer dropped after {rows_written} of {rows_declared} declared rows"
            ),
            Self::SignedDataRecentred => write!(f, "signed data re-centred to unsigned byte range"),
            Self::UnusualColourAsRgb => write!(f, "unusual colour interpretation written as RGB")
        }
    }
}

/// Accumulates [`LogicError`] warnings over a writer's lifetime.
///
/// Every warning is also logged through [`crate::warn!`] at the point it is
/// raised (spec.md §7: "emitted to a diagnostic sink but never abort"); this
/// accumulator is the sink a caller can drain at `close()` without needing a
/// logging backend installed, since `log` is feature-gated here.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Diagnostics {
    warnings: alloc::vec::Vec<LogicError>
}

impl Diagnostics {
    pub const fn new() -> Self {
        Diagnostics {
            warnings: alloc::vec::Vec::new()
        }
    }

    pub fn push(&mut self, warning: LogicError) {
        crate::log::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogicError> {
        self.warnings.iter()
    }

    pub fn into_vec(self) -> alloc::vec::Vec<LogicError> {
        self.warnings
    }
}

#[cfg(test)]
mod diagnostics_tests {
    use super::*;

    #[test]
    fn push_accumulates_and_logs() {
        let mut diag = Diagnostics::new();
        assert!(diag.is_empty());
        diag.push(LogicError::SignedDataRecentred);
        assert_eq!(diag.iter().count(), 1);
        assert_eq!(diag.into_vec(), alloc::vec![LogicError::SignedDataRecentred]);
    }
}
