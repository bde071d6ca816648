//! BMP writer: classic `BITMAPFILEHEADER`/`BITMAPINFOHEADER` output, 8-bit
//! greyscale with a linear palette or 24-bit BGR, matching spec.md §8
//! scenario S3.
//!
//! BMP rows are stored bottom-up, which this layer's callers present
//! top-down; rather than require a seekable sink to rewrite the file
//! backwards, every row is held until [`BmpWriter::close`] and then emitted
//! in reverse order in one pass.
use kdu_base::bytestream::{ZWriter, ZWriterTrait};
use kdu_base::errors::FormatError;
use kdu_base::sample_buffer::LineBuffer;
use kdu_transfer::{AlignMode, DestWidth, TransferParams, transfer_sample};

use crate::errors::WriteError;
use crate::writer::{LineSink, OutputComponent, ResolutionHint, source_value_at};

const FILE_HEADER_SIZE: u32 = 14;
const INFO_HEADER_SIZE: u32 = 40;
const GREY_PALETTE_SIZE: u32 = 256 * 4;

pub struct BmpWriter<T: ZWriterTrait> {
    sink:          Option<T>,
    components:    Vec<OutputComponent>,
    width:         usize,
    height:        usize,
    row_stride:    usize,
    padded_stride: usize,
    resolution:    ResolutionHint,
    rows:          Vec<Option<Vec<u8>>>
}

impl<T: ZWriterTrait> BmpWriter<T> {
    pub fn new(sink: T, components: Vec<OutputComponent>) -> Result<Self, WriteError> {
        Self::with_resolution(sink, components, ResolutionHint::default())
    }

    pub fn with_resolution(
        sink: T, components: Vec<OutputComponent>, resolution: ResolutionHint
    ) -> Result<Self, WriteError> {
        let count = components.len();
        if count != 1 && count != 3 {
            return Err(FormatError::UnsupportedColour.into());
        }
        let (width, height) = (components[0].width, components[0].height);
        if components.iter().any(|c| c.width != width || c.height != height) {
            return Err(FormatError::ComponentDimensionMismatch.into());
        }
        let precision = components.iter().map(|c| c.effective_precision().get()).max().unwrap();
        if precision > 8 {
            return Err(FormatError::PrecisionTooWide { precision, max: 8 }.into());
        }

        let row_stride = width * count;
        let padded_stride = (row_stride + 3) & !3;

        Ok(BmpWriter {
            sink: Some(sink),
            components,
            width,
            height,
            row_stride,
            padded_stride,
            resolution,
            rows: vec![None; height]
        })
    }

    fn pack_row(&self, comp: usize, buf: &LineBuffer) -> Vec<u8> {
        let component = self.components[comp];
        let params = TransferParams {
            precision:          component.effective_precision(),
            original_precision: component.orig_precision,
            signed:             component.signed,
            align:              if component.align_lsb { AlignMode::Lsb } else { AlignMode::Msb }
        };
        (0..buf.width())
            .map(|i| transfer_sample(source_value_at(buf, i), &params, DestWidth::Byte).unwrap_or(0) as u8)
            .collect()
    }

    fn write_header(&self, writer: &mut ZWriter<T>) -> Result<(), WriteError> {
        let is_grey = self.components.len() == 1;
        let palette_size = if is_grey { GREY_PALETTE_SIZE } else { 0 };
        let data_offset = FILE_HEADER_SIZE + INFO_HEADER_SIZE + palette_size;
        let image_size = (self.padded_stride * self.height) as u32;
        let file_size = data_offset + image_size;

        writer.write_all(b"BM")?;
        writer.write_u32_le(file_size)?;
        writer.write_u32_le(0)?;
        writer.write_u32_le(data_offset)?;

        writer.write_u32_le(INFO_HEADER_SIZE)?;
        writer.write_u32_le(self.width as u32)?;
        writer.write_u32_le(self.height as u32)?;
        writer.write_u16_le(1)?;
        writer.write_u16_le(if is_grey { 8 } else { 24 })?;
        writer.write_u32_le(0)?;
        writer.write_u32_le(image_size)?;
        writer.write_u32_le(self.resolution.x_pels_per_metre.round() as u32)?;
        writer.write_u32_le(self.resolution.y_pels_per_metre.round() as u32)?;
        writer.write_u32_le(0)?;
        writer.write_u32_le(0)?;

        if is_grey {
            for level in 0u32..256 {
                let b = level as u8;
                writer.write_all(&[b, b, b, 0])?;
            }
        }
        Ok(())
    }
}

impl<T: ZWriterTrait> BmpWriter<T> {
    /// Like [`LineSink::close`], but also hands back the sink, so a caller
    /// that owns an in-memory sink (e.g. a test's `Vec<u8>`) can inspect the
    /// bytes that were written.
    pub fn finish(mut self) -> Result<(T, kdu_base::errors::Diagnostics), WriteError> {
        let sink = self.sink.take().expect("sink taken exactly once");
        let mut writer = ZWriter::new(sink);
        self.write_header(&mut writer)?;

        let mut diagnostics = kdu_base::errors::Diagnostics::new();
        let missing = self.rows.iter().filter(|r| r.is_none()).count();
        if missing > 0 {
            diagnostics.push(kdu_base::errors::LogicError::IncompleteRows {
                rows_written:  self.height - missing,
                rows_declared: self.height
            });
        }

        let pad = vec![0u8; self.padded_stride - self.row_stride];
        for row in self.rows.iter().rev() {
            match row {
                Some(bytes) => writer.write_all(bytes)?,
                None => writer.write_all(&vec![0u8; self.row_stride])?
            }
            if !pad.is_empty() {
                writer.write_all(&pad)?;
            }
        }
        Ok((writer.inner(), diagnostics))
    }
}

impl<T: ZWriterTrait> LineSink for BmpWriter<T> {
    fn put(&mut self, comp: usize, row_index: usize, _tile_col: usize, samples: &LineBuffer) -> Result<(), WriteError> {
        let packed = self.pack_row(comp, samples);
        let ncomp = self.components.len();
        let row = self.rows[row_index].get_or_insert_with(|| vec![0u8; self.row_stride]);
        if ncomp == 1 {
            row.copy_from_slice(&packed);
        } else {
            // BGR byte order: component 0 is red, 1 green, 2 blue.
            let dest_offset = 2 - comp;
            for (pixel, &sample) in packed.iter().enumerate() {
                row[pixel * 3 + dest_offset] = sample;
            }
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

    fn comp(width: usize, height: usize) -> OutputComponent {
        OutputComponent {
            width,
            height,
            orig_precision: Precision::new(8),
            signed: false,
            forced_precision: None,
            align_lsb: false,
            forced_exponent_bits: 0
        }
    }

    fn line(values: &[i32]) -> LineBuffer {
        let mut buf = LineBuffer::new(SampleKind::I32, values.len(), 0, true, Precision::new(8));
        buf.valid_i32_mut().copy_from_slice(values);
        buf
    }

    #[test]
    fn header_declares_file_and_data_offset() {
        let writer = BmpWriter::new(Vec::new(), vec![comp(2, 1); 3]).unwrap();
        assert_eq!(writer.row_stride, 6);
        assert_eq!(writer.padded_stride, 8);

        let mut header_writer = ZWriter::new(Vec::new());
        writer.write_header(&mut header_writer).unwrap();
        let header = header_writer.inner();
        assert_eq!(&header[0..2], b"BM");
        let data_offset = u32::from_le_bytes(header[10..14].try_into().unwrap());
        assert_eq!(data_offset, FILE_HEADER_SIZE + INFO_HEADER_SIZE);
        let bitcount = u16::from_le_bytes(header[28..30].try_into().unwrap());
        assert_eq!(bitcount, 24);
    }

    #[test]
    fn default_resolution_is_72dpi_in_pixels_per_metre() {
        let writer = BmpWriter::new(Vec::new(), vec![comp(2, 1); 3]).unwrap();
        let mut header_writer = ZWriter::new(Vec::new());
        writer.write_header(&mut header_writer).unwrap();
        let header = header_writer.inner();
        let x_ppm = u32::from_le_bytes(header[38..42].try_into().unwrap());
        let y_ppm = u32::from_le_bytes(header[42..46].try_into().unwrap());
        assert_eq!(x_ppm, 2835);
        assert_eq!(y_ppm, 2835);
    }

    #[test]
    fn with_resolution_overrides_the_default() {
        let hint = ResolutionHint {
            x_pels_per_metre: 3780.0,
            y_pels_per_metre: 3780.0
        };
        let writer = BmpWriter::with_resolution(Vec::new(), vec![comp(2, 1); 3], hint).unwrap();
        let mut header_writer = ZWriter::new(Vec::new());
        writer.write_header(&mut header_writer).unwrap();
        let header = header_writer.inner();
        let x_ppm = u32::from_le_bytes(header[38..42].try_into().unwrap());
        assert_eq!(x_ppm, 3780);
    }

    #[test]
    fn rgb_rows_pack_into_bgr_order() {
        let mut writer = BmpWriter::new(Vec::new(), vec![comp(2, 1); 3]).unwrap();
        writer.put(0, 0, 0, &line(&[1, 2])).unwrap(); // red
        writer.put(1, 0, 0, &line(&[3, 4])).unwrap(); // green
        writer.put(2, 0, 0, &line(&[5, 6])).unwrap(); // blue
        // row_stride bytes are BGR-per-pixel: pixel0 = [5,3,1], pixel1 = [6,4,2].
        assert_eq!(writer.rows[0].as_deref(), Some([5u8, 3, 1, 6, 4, 2].as_slice()));
    }

    #[test]
    fn close_emits_rows_bottom_up_with_padding() {
        let mut writer = BmpWriter::new(Vec::new(), vec![comp(2, 2); 3]).unwrap();
        writer.put(0, 0, 0, &line(&[1, 2])).unwrap();
        writer.put(1, 0, 0, &line(&[3, 4])).unwrap();
        writer.put(2, 0, 0, &line(&[5, 6])).unwrap();
        writer.put(0, 1, 0, &line(&[11, 12])).unwrap();
        writer.put(1, 1, 0, &line(&[13, 14])).unwrap();
        writer.put(2, 1, 0, &line(&[15, 16])).unwrap();

        let top_row = writer.rows[0].clone().unwrap();
        let bottom_row = writer.rows[1].clone().unwrap();
        assert_ne!(top_row, bottom_row);
        // padded_stride (8) exceeds row_stride (6): two pad bytes per row.
        assert_eq!(writer.padded_stride - writer.row_stride, 2);
    }
}
