//! PGM (portable greymap) writer: a single greyscale component, always one
//! byte per sample, matching spec.md §8 scenario S1.
use kdu_base::bytestream::{ZWriter, ZWriterTrait};
use kdu_base::errors::FormatError;
use kdu_base::precision::Precision;
use kdu_base::sample_buffer::LineBuffer;
use kdu_transfer::{AlignMode, DestWidth, TransferParams, transfer_sample};

use crate::errors::WriteError;
use crate::writer::{LineSink, OutputComponent, RowAccumulator, source_value_at};

/// PGM only ever has one component, so `new` takes it directly rather than
/// through `declare_tile_columns`/multi-component setup.
pub struct PgmWriter<T: ZWriterTrait> {
    writer:           ZWriter<T>,
    component:        OutputComponent,
    bytes_per_sample: usize,
    accumulator:      RowAccumulator
}

impl<T: ZWriterTrait> PgmWriter<T> {
    /// Precisions above 8 bits are silently reduced to 8 (spec.md §4.6):
    /// PGM has no wide-sample variant, so this writer always emits one
    /// byte per sample and a hardcoded `255` maxval (spec.md §4.7),
    /// whatever the component's declared precision.
    pub fn new(sink: T, component: OutputComponent) -> Result<Self, WriteError> {
        let precision = component.effective_precision().get();
        if precision > 16 {
            return Err(FormatError::PrecisionTooWide { precision, max: 16 }.into());
        }
        let bytes_per_sample = 1;

        let mut writer = ZWriter::new(sink);
        let header = format!("P5\n{} {}\n255\n", component.width, component.height);
        writer.write_all(header.as_bytes())?;

        let row_bytes = component.width * bytes_per_sample;
        Ok(PgmWriter {
            writer,
            component,
            bytes_per_sample,
            accumulator: RowAccumulator::new(row_bytes, component.width, component.height)
        })
    }

    fn pack_row(&self, buf: &LineBuffer) -> Vec<u8> {
        let clamped = Precision::new(self.component.effective_precision().get().min(8));
        let params = TransferParams {
            precision:          clamped,
            original_precision: self.component.orig_precision,
            signed:             self.component.signed,
            align:              if self.component.align_lsb { AlignMode::Lsb } else { AlignMode::Msb }
        };
        (0..buf.width())
            .map(|i| transfer_sample(source_value_at(buf, i), &params, DestWidth::Byte).unwrap_or(0) as u8)
            .collect()
    }
}

impl<T: ZWriterTrait> PgmWriter<T> {
    /// Like [`LineSink::close`], but also hands back the sink, so a caller
    /// that owns an in-memory sink (e.g. a test's `Vec<u8>`) can inspect the
    /// bytes that were written.
    pub fn finish(self) -> Result<(T, kdu_base::errors::Diagnostics), WriteError> {
        let mut diagnostics = kdu_base::errors::Diagnostics::new();
        if !self.accumulator.is_complete() {
            diagnostics.push(kdu_base::errors::LogicError::IncompleteRows {
                rows_written:  self.accumulator.rows_committed(),
                rows_declared: self.accumulator.total_rows()
            });
        }
        Ok((self.writer.inner(), diagnostics))
    }
}

impl<T: ZWriterTrait> LineSink for PgmWriter<T> {
    fn put(&mut self, comp: usize, row_index: usize, tile_col: usize, samples: &LineBuffer) -> Result<(), WriteError> {
        debug_assert_eq!(comp, 0, "pgm has exactly one component");
        let bytes = self.pack_row(samples);
        let stride = self.bytes_per_sample;
        if let Some(row) = self.accumulator.put(row_index, tile_col, &bytes, samples.width(), stride)? {
            self.writer.write_all(&row)?;
        }
        Ok(())
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

    #[test]
    fn header_matches_netpbm_p5_layout() {
        let writer = PgmWriter::new(Vec::new(), comp(4, 2, 8)).unwrap();
        let header = String::from_utf8(writer.writer.inner()).unwrap();
        assert_eq!(header, "P5\n4 2\n255\n");
    }

    #[test]
    fn s1_four_bit_samples_pack_as_a_left_shifted_byte() {
        let component = comp(4, 1, 4);
        let mut writer = PgmWriter::new(Vec::new(), component).unwrap();
        let mut line = LineBuffer::new(SampleKind::I32, 4, 0, true, component.orig_precision);
        line.valid_i32_mut().copy_from_slice(&[0, 5, 10, 15]);
        writer.put(0, 0, 0, &line).unwrap();
        let bytes = writer.writer.inner();
        let pixels = &bytes[bytes.len() - 4..];
        assert_eq!(pixels, &[0, 80, 160, 240]);
    }

    #[test]
    fn rejects_precision_above_sixteen_bits() {
        let err = PgmWriter::new(Vec::new(), comp(1, 1, 24)).unwrap_err();
        assert!(matches!(err, WriteError::Format(FormatError::PrecisionTooWide { precision: 24, max: 16 })));
    }
}
