//! The common row-accumulator algorithm shared by every file-format writer
//! (spec.md §3 `OutputComponent`/`ScanlineBuffer`, §4.7's row-buffer
//! algorithm), plus the `LineSink` trait every writer variant implements.
//!
//! Per the REDESIGN FLAG in spec.md §9 ("deep class hierarchies for
//! writers"), there is no `kdu_image_out`-style polymorphic base: writers
//! are a sum type (one variant per format, see `kdu-cli`'s dispatch) that
//! share this `RowAccumulator` by composition, not by inheriting from a
//! common base class.
use kdu_base::colour::ColourInterpretation;
use kdu_base::precision::Precision;
use kdu_base::sample_buffer::{LineBuffer, SampleKind};
use kdu_transfer::SourceValue;

use crate::errors::{RowError, WriteError};

/// Read sample `i` out of a line buffer's valid region and classify it as
/// the [`SourceValue`] kind [`kdu_transfer::transfer_sample`] expects.
///
/// `I16` buffers carry either exact integers or `KDU_FIX_POINT` fixed-point
/// fractions depending on [`LineBuffer::is_absolute`]; `I32` buffers are
/// always exact integers; `F32` buffers are the nominal `[-0.5, 0.5)`
/// signed fraction the irreversible path produces.
pub fn source_value_at(buf: &LineBuffer, i: usize) -> SourceValue {
    match buf.kind() {
        SampleKind::I16 => {
            let v = buf.valid_i16()[i] as i32;
            if buf.is_absolute() {
                SourceValue::Int(v as i64)
            } else {
                SourceValue::Int16Fixed(v)
            }
        }
        SampleKind::I32 => SourceValue::Int(buf.valid_i32()[i] as i64),
        SampleKind::F32 => SourceValue::Float(buf.valid_f32()[i])
    }
}

/// Bytes needed to hold one sample at `precision`, for the formats that can
/// only store whole bytes per sample (PGM/PPM/BMP).
pub fn whole_bytes_for_precision(precision: Precision) -> usize {
    if precision.get() <= 8 { 1 } else { 2 }
}

/// Pixel density a writer stamps into its header, in pixels per metre.
/// Shared between BMP (`XPelsPerMeter`/`YPelsPerMeter`) and TIFF
/// (`X_RESOLUTION`/`Y_RESOLUTION`) rather than each format re-deriving its
/// own default. 72 dpi converts to roughly 2835 pixels/metre.
#[derive(Copy, Clone, Debug)]
pub struct ResolutionHint {
    pub x_pels_per_metre: f64,
    pub y_pels_per_metre: f64
}

impl Default for ResolutionHint {
    fn default() -> Self {
        ResolutionHint {
            x_pels_per_metre: 2835.0,
            y_pels_per_metre: 2835.0
        }
    }
}

/// A byte buffer sized for one complete image row, tracking how many
/// samples have been filled so far and which tile column is expected next
/// (spec.md §3 `ScanlineBuffer`).
#[derive(Debug)]
pub struct ScanlineBuffer {
    pub bytes:            Vec<u8>,
    pub row_index:        usize,
    pub accessed_samples: usize,
    pub next_x_tnum:      usize
}

impl ScanlineBuffer {
    fn new(row_bytes: usize, row_index: usize) -> Self {
        ScanlineBuffer {
            bytes: vec![0u8; row_bytes],
            row_index,
            accessed_samples: 0,
            next_x_tnum: 0
        }
    }

    fn reset(&mut self, row_index: usize) {
        self.bytes.iter_mut().for_each(|b| *b = 0);
        self.row_index = row_index;
        self.accessed_samples = 0;
        self.next_x_tnum = 0;
    }
}

/// Per-image-component writer state (spec.md §3 `OutputComponent`).
#[derive(Debug, Clone, Copy)]
pub struct OutputComponent {
    pub width:               usize,
    pub height:              usize,
    pub orig_precision:      Precision,
    pub signed:              bool,
    pub forced_precision:    Option<Precision>,
    pub align_lsb:           bool,
    /// `0` if the component is written as an integer; otherwise the forced
    /// floating-point exponent width.
    pub forced_exponent_bits: u32
}

impl OutputComponent {
    pub fn effective_precision(&self) -> Precision {
        self.forced_precision.unwrap_or(self.orig_precision)
    }

    pub fn is_float(&self) -> bool {
        self.forced_exponent_bits != 0
    }
}

/// Assembles samples delivered tile-column-by-tile-column into complete
/// scanlines, committing each row (via `take_complete_row`) in top-to-bottom
/// order as soon as every tile column of every component has filled it.
///
/// One accumulator serves an entire image (all components interleaved into
/// one row buffer); writers whose on-disk layout interleaves components
/// (PPM/BMP/interleaved TIFF) drive it with a per-pixel byte stride that
/// already spans every component, while single-component writers (PGM)
/// drive it with a one-sample stride.
pub struct RowAccumulator {
    row_bytes:  usize,
    width:      usize,
    total_rows: usize,
    incomplete: Vec<ScanlineBuffer>,
    free:       Vec<ScanlineBuffer>,
    rows_committed: usize
}

impl RowAccumulator {
    pub fn new(row_bytes: usize, width_samples: usize, total_rows: usize) -> Self {
        RowAccumulator {
            row_bytes,
            width: width_samples,
            total_rows,
            incomplete: Vec::new(),
            free: Vec::new(),
            rows_committed: 0
        }
    }

    pub fn rows_committed(&self) -> usize {
        self.rows_committed
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Insert `sample_bytes` (already packed output bytes, `byte_stride *
    /// sample_count` long) for `sample_count` samples of row `row_index`,
    /// at the tile column `tile_col`. Returns the row's bytes once every
    /// sample of the row has been supplied (spec.md §4.7's row-buffer
    /// algorithm: "when every component of every tile column in the row is
    /// present, the scanline is committed").
    pub fn put(
        &mut self, row_index: usize, tile_col: usize, sample_bytes: &[u8], sample_count: usize,
        byte_stride: usize
    ) -> Result<Option<Vec<u8>>, RowError> {
        if row_index >= self.total_rows {
            return Err(RowError::RowOverrun {
                row: row_index,
                declared_rows: self.total_rows
            });
        }
        let pos = self.incomplete.iter().position(|s| s.row_index == row_index);
        let mut scan = match pos {
            Some(i) => self.incomplete.remove(i),
            None => {
                if tile_col != 0 {
                    return Err(RowError::UnexpectedTileColumn {
                        row: row_index,
                        expected: 0,
                        got: tile_col
                    });
                }
                match self.free.pop() {
                    Some(mut reused) => {
                        reused.reset(row_index);
                        reused
                    }
                    None => ScanlineBuffer::new(self.row_bytes, row_index)
                }
            }
        };

        if scan.next_x_tnum != tile_col {
            let expected = scan.next_x_tnum;
            self.incomplete.push(scan);
            return Err(RowError::UnexpectedTileColumn {
                row: row_index,
                expected,
                got: tile_col
            });
        }

        let offset = scan.accessed_samples * byte_stride;
        scan.bytes[offset..offset + sample_bytes.len()].copy_from_slice(sample_bytes);
        scan.accessed_samples += sample_count;
        scan.next_x_tnum += 1;

        if scan.accessed_samples >= self.width {
            self.rows_committed += 1;
            let bytes = core::mem::take(&mut scan.bytes);
            self.free.push(scan);
            Ok(Some(bytes))
        } else {
            self.incomplete.push(scan);
            Ok(None)
        }
    }

    /// True if every declared row has been committed; used by `close()` to
    /// decide whether an incomplete-rows warning is due (spec.md §7
    /// `LogicError::IncompleteRows`).
    pub fn is_complete(&self) -> bool {
        self.rows_committed >= self.total_rows
    }
}

/// Common shape every concrete writer exposes (spec.md §6, §9's REDESIGN
/// FLAG trait-plus-composition replacement for a polymorphic base class).
pub trait LineSink {
    /// Declare how many tile columns each row will be assembled from,
    /// before any `put()` call. Writers that do not tile may ignore this.
    fn declare_tile_columns(&mut self, _tile_columns: usize) {}

    /// Hand one component's worth of one row's tile column to the writer.
    /// `row_index` and `tile_col` must arrive in non-decreasing,
    /// left-to-right, top-to-bottom order per spec.md §4.7; an out-of-order
    /// call surfaces as [`crate::errors::RowError`].
    fn put(
        &mut self, comp: usize, row_index: usize, tile_col: usize,
        samples: &kdu_base::sample_buffer::LineBuffer
    ) -> Result<(), WriteError>;

    /// Close the writer, returning any non-fatal [`kdu_base::errors::LogicError`]
    /// warnings accumulated over its lifetime (spec.md §7: these never abort).
    fn close(self) -> Result<kdu_base::errors::Diagnostics, WriteError>;
}

/// How a writer should lay out its components on disk; used by concrete
/// writers to pick a `ColourInterpretation` or fall back to RGB with a
/// warning, per spec.md §7 `LogicError::UnusualColourAsRgb`.
pub fn resolve_colour(requested: ColourInterpretation, num_components: usize) -> (ColourInterpretation, bool) {
    if requested.num_components() == num_components || requested == ColourInterpretation::Unknown {
        (requested, false)
    } else {
        // Mismatched component count for the requested interpretation:
        // fall back to RGB/greyscale as spec.md §7 prescribes, with a
        // non-fatal warning surfaced by the caller.
        match num_components {
            1 => (ColourInterpretation::BlackIsZero, true),
            3 => (ColourInterpretation::Rgb, true),
            _ => (ColourInterpretation::Unknown, true)
        }
    }
}
