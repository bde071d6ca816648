//! RAW writer: a single component, headerless, 1-4 bytes per sample in a
//! caller-chosen byte order. spec.md §4.7 rejects precisions above 32 bits
//! (the sample transfer layer's own ceiling) rather than defining a wider
//! packing.
use kdu_base::bytestream::{ZWriter, ZWriterTrait};
use kdu_base::errors::FormatError;
use kdu_base::precision::ByteEndian;
use kdu_base::sample_buffer::LineBuffer;
use kdu_transfer::{AlignMode, DestWidth, TransferParams, transfer_sample};

use crate::errors::WriteError;
use crate::writer::{LineSink, OutputComponent, RowAccumulator, source_value_at};

pub struct RawWriter<T: ZWriterTrait> {
    writer:           ZWriter<T>,
    component:        OutputComponent,
    bytes_per_sample: usize,
    endian:           ByteEndian,
    accumulator:      RowAccumulator
}

fn bytes_for_precision(precision: u32) -> usize {
    ((precision as usize) + 7) / 8
}

impl<T: ZWriterTrait> RawWriter<T> {
    pub fn new(sink: T, component: OutputComponent, endian: ByteEndian) -> Result<Self, WriteError> {
        let precision = component.effective_precision().get();
        if precision > 32 {
            return Err(FormatError::PrecisionTooWide { precision, max: 32 }.into());
        }
        let bytes_per_sample = bytes_for_precision(precision);
        let row_bytes = component.width * bytes_per_sample;
        Ok(RawWriter {
            writer: ZWriter::new(sink),
            component,
            bytes_per_sample,
            endian,
            accumulator: RowAccumulator::new(row_bytes, component.width, component.height)
        })
    }

    fn pack_row(&self, buf: &LineBuffer) -> Vec<u8> {
        let params = TransferParams {
            precision:          self.component.effective_precision(),
            original_precision: self.component.orig_precision,
            signed:             self.component.signed,
            align:              if self.component.align_lsb { AlignMode::Lsb } else { AlignMode::Msb }
        };
        let dest = if self.bytes_per_sample == 1 { DestWidth::Byte } else { DestWidth::Wide };
        let mut out = Vec::with_capacity(buf.width() * self.bytes_per_sample);
        for i in 0..buf.width() {
            let y = transfer_sample(source_value_at(buf, i), &params, dest).unwrap_or(0) as i64;
            let word = y as u32;
            let full = match self.endian {
                ByteEndian::LE => word.to_le_bytes(),
                ByteEndian::BE => word.to_be_bytes()
            };
            match self.endian {
                ByteEndian::LE => out.extend_from_slice(&full[..self.bytes_per_sample]),
                ByteEndian::BE => out.extend_from_slice(&full[4 - self.bytes_per_sample..])
            }
        }
        out
    }
}

impl<T: ZWriterTrait> RawWriter<T> {
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

impl<T: ZWriterTrait> LineSink for RawWriter<T> {
    fn put(&mut self, comp: usize, row_index: usize, tile_col: usize, samples: &LineBuffer) -> Result<(), WriteError> {
        debug_assert_eq!(comp, 0, "raw writer handles one component per instance");
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
