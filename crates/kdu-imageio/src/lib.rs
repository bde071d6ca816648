//! File-format writers that consume decoded wavelet line buffers (spec.md
//! §4.7, component C7): BMP, PGM, PPM, RAW, and TIFF, sharing the
//! [`writer::RowAccumulator`] row-buffer algorithm and the [`writer::LineSink`]
//! trait rather than a common base class (see the REDESIGN FLAG note on
//! `writer`).
pub mod bmp;
pub mod errors;
pub mod pgm;
pub mod ppm;
pub mod raw;
pub mod tiff;
pub mod writer;

pub use bmp::BmpWriter;
pub use errors::{RowError, WriteError};
pub use pgm::PgmWriter;
pub use ppm::PpmWriter;
pub use raw::RawWriter;
pub use tiff::{TiffDirectory, TiffMetadata, TiffOptions, TiffWriter};
pub use writer::{
    LineSink, OutputComponent, ResolutionHint, RowAccumulator, ScanlineBuffer, resolve_colour, source_value_at,
    whole_bytes_for_precision
};
