//! PPM (portable pixmap) writer: three interleaved RGB components, matching
//! spec.md §8 scenario S2.
//!
//! Unlike [`crate::pgm::PgmWriter`], a row here is only complete once every
//! component has supplied it, and components may arrive a whole plane at a
//! time (all of component 0's rows, then all of component 1's, ...) rather
//! than interleaved row-by-row. Completed rows are therefore held until
//! they can be flushed in increasing row order rather than written
//! immediately, the same "write in row order regardless of arrival order"
//! requirement spec.md §4.7 places on every writer.
use std::collections::BTreeMap;

use kdu_base::bytestream::{ZWriter, ZWriterTrait};
use kdu_base::errors::FormatError;
use kdu_base::sample_buffer::LineBuffer;
use kdu_transfer::{AlignMode, DestWidth, TransferParams, transfer_sample};

use crate::errors::{RowError, WriteError};
use crate::writer::{OutputComponent, LineSink, source_value_at};

const COMPONENTS: usize = 3;

struct PendingRow {
    bytes: Vec<u8>,
    seen:  [bool; COMPONENTS]
}

pub struct PpmWriter<T: ZWriterTrait> {
    writer:           ZWriter<T>,
    components:       [OutputComponent; COMPONENTS],
    bytes_per_sample: usize,
    width:            usize,
    total_rows:       usize,
    pending:          BTreeMap<usize, PendingRow>,
    next_row_to_flush: usize
}

impl<T: ZWriterTrait> PpmWriter<T> {
    pub fn new(sink: T, components: [OutputComponent; COMPONENTS]) -> Result<Self, WriteError> {
        let (width, height) = (components[0].width, components[0].height);
        if components.iter().any(|c| c.width != width || c.height != height) {
            return Err(FormatError::ComponentDimensionMismatch.into());
        }
        if components.iter().any(|c| c.signed != components[0].signed) {
            return Err(FormatError::ComponentSignMismatch.into());
        }
        let precision = components.iter().map(|c| c.effective_precision().get()).max().unwrap();
        if precision > 16 {
            return Err(FormatError::PrecisionTooWide { precision, max: 16 }.into());
        }
        // Precisions above 8 bits are silently reduced to 8 (spec.md §4.6):
        // PPM has no wide-sample variant, so this writer always emits one
        // byte per sample and a hardcoded `255` maxval (spec.md §4.7),
        // whatever the components' declared precision.
        let bytes_per_sample = 1;

        let mut writer = ZWriter::new(sink);
        let header = format!("P6\n{width} {height}\n255\n");
        writer.write_all(header.as_bytes())?;

        Ok(PpmWriter {
            writer,
            components,
            bytes_per_sample,
            width,
            total_rows: height,
            pending: BTreeMap::new(),
            next_row_to_flush: 0
        })
    }

    fn pack_component_row(&self, comp: usize, buf: &LineBuffer) -> Vec<u8> {
        let component = self.components[comp];
        let clamped = kdu_base::precision::Precision::new(component.effective_precision().get().min(8));
        let params = TransferParams {
            precision:          clamped,
            original_precision: component.orig_precision,
            signed:             component.signed,
            align:              if component.align_lsb { AlignMode::Lsb } else { AlignMode::Msb }
        };
        (0..buf.width())
            .map(|i| transfer_sample(source_value_at(buf, i), &params, DestWidth::Byte).unwrap_or(0) as u8)
            .collect()
    }

    fn flush_ready_rows(&mut self) -> Result<(), WriteError> {
        while let Some(row) = self.pending.get(&self.next_row_to_flush) {
            if !row.seen.iter().all(|&s| s) {
                break;
            }
            let row = self.pending.remove(&self.next_row_to_flush).unwrap();
            self.writer.write_all(&row.bytes)?;
            self.next_row_to_flush += 1;
        }
        Ok(())
    }
}

impl<T: ZWriterTrait> PpmWriter<T> {
    /// Like [`LineSink::close`], but also hands back the sink, so a caller
    /// that owns an in-memory sink (e.g. a test's `Vec<u8>`) can inspect the
    /// bytes that were written.
    pub fn finish(self) -> Result<(T, kdu_base::errors::Diagnostics), WriteError> {
        let mut diagnostics = kdu_base::errors::Diagnostics::new();
        if self.next_row_to_flush < self.total_rows {
            diagnostics.push(kdu_base::errors::LogicError::IncompleteRows {
                rows_written:  self.next_row_to_flush,
                rows_declared: self.total_rows
            });
        }
        Ok((self.writer.inner(), diagnostics))
    }
}

impl<T: ZWriterTrait> LineSink for PpmWriter<T> {
    fn put(&mut self, comp: usize, row_index: usize, _tile_col: usize, samples: &LineBuffer) -> Result<(), WriteError> {
        if row_index >= self.total_rows {
            return Err(RowError::RowOverrun {
                row: row_index,
                declared_rows: self.total_rows
            }
            .into());
        }
        let packed = self.pack_component_row(comp, samples);
        let stride = COMPONENTS * self.bytes_per_sample;
        let row = self.pending.entry(row_index).or_insert_with(|| PendingRow {
            bytes: vec![0u8; self.width * stride],
            seen:  [false; COMPONENTS]
        });
        for pixel in 0..self.width {
            let src = pixel * self.bytes_per_sample;
            let dst = pixel * stride + comp * self.bytes_per_sample;
            row.bytes[dst..dst + self.bytes_per_sample]
                .copy_from_slice(&packed[src..src + self.bytes_per_sample]);
        }
        row.seen[comp] = true;
        self.flush_ready_rows()
    }

    fn close(self) -> Result<kdu_base::errors::Diagnostics, WriteError> {
        self.finish().map(|(_, diagnostics)| diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use kdu_base::precision::Precision;
    use kdu_base::sample_buffer::SampleKind;

    use super::*;

    fn comp(width: usize, height: usize, precision: u32) -> OutputComponent {
        OutputComponent {
            width,
            height,
            orig_precision: Precision::new(precision),
            signed: false,
            forced_precision: None,
            align_lsb: false,
            forced_exponent_bits: 0
        }
    }

    fn line(values: &[i32], precision: Precision) -> LineBuffer {
        let mut buf = LineBuffer::new(SampleKind::I32, values.len(), 0, true, precision);
        buf.valid_i32_mut().copy_from_slice(values);
        buf
    }

    #[test]
    fn header_matches_netpbm_p6_layout() {
        let c = comp(2, 1, 8);
        let writer = PpmWriter::new(Vec::new(), [c, c, c]).unwrap();
        let header = String::from_utf8(writer.writer.inner()).unwrap();
        assert_eq!(header, "P6\n2 1\n255\n");
    }

    #[test]
    fn s2_components_interleave_regardless_of_arrival_order() {
        let c = comp(2, 1, 8);
        let mut writer = PpmWriter::new(Vec::new(), [c, c, c]).unwrap();
        let red = line(&[10, 20], c.orig_precision);
        let green = line(&[30, 40], c.orig_precision);
        let blue = line(&[50, 60], c.orig_precision);
        // supply out of component order: green, blue, then red.
        writer.put(1, 0, 0, &green).unwrap();
        writer.put(2, 0, 0, &blue).unwrap();
        writer.put(0, 0, 0, &red).unwrap();
        let bytes = writer.writer.inner();
        let pixels = &bytes[bytes.len() - 6..];
        assert_eq!(pixels, &[10, 30, 50, 20, 40, 60]);
    }

    #[test]
    fn rows_flush_only_once_fully_interleaved() {
        let c = comp(1, 2, 8);
        let mut writer = PpmWriter::new(Vec::new(), [c, c, c]).unwrap();
        let row0 = line(&[1], c.orig_precision);
        let row1 = line(&[2], c.orig_precision);
        writer.put(0, 1, 0, &row1).unwrap();
        writer.put(0, 0, 0, &row0).unwrap();
        // row 0 still missing components 1 and 2; nothing should be flushed.
        let header_len = "P6\n1 2\n255\n".len();
        assert_eq!(writer.writer.inner_mut().len(), header_len);
    }
}
