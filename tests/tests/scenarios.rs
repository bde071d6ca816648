//! End-to-end scenarios spanning the DWT engine and file-format writers,
//! each exercising one of these crates' public surfaces the way a single
//! unit test inside the crate cannot: a full engine round trip feeding a
//! writer, or byte-exact output a reader would actually decode.
use kdu_base::options::EngineOptions;
use kdu_base::precision::Precision;
use kdu_base::sample_buffer::{LineBuffer, SampleKind};
use kdu_dwt::engine::DwtEngine;
use kdu_dwt::lifting::{w5x3, w9x7};
use kdu_dwt::step::Direction;
use kdu_imageio::{
    BmpWriter, LineSink, OutputComponent, PgmWriter, PpmWriter, TiffMetadata, TiffOptions, TiffWriter
};

fn i32_line(values: &[i32], precision: u32) -> LineBuffer {
    let mut buf = LineBuffer::new(SampleKind::I32, values.len(), 0, true, Precision::new(precision));
    buf.valid_i32_mut().copy_from_slice(values);
    buf
}

fn output_component(width: usize, height: usize, precision: u32) -> OutputComponent {
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

/// S1: a 4x4 greyscale image written as PGM is byte-exact: a 10-byte P5
/// header followed by the 16 raw samples, left-shifted from 4 bits to 8.
#[test]
fn s1_pgm_four_by_four_is_byte_exact() {
    let component = output_component(4, 4, 4);
    let mut writer = PgmWriter::new(Vec::new(), component).unwrap();
    for row in 0..4 {
        let base = (row * 4) as i32;
        writer.put(0, row, 0, &i32_line(&[base, base + 1, base + 2, base + 3], 4)).unwrap();
    }
    let (bytes, diagnostics) = writer.finish().unwrap();
    assert!(diagnostics.is_empty());

    let mut expected = b"P5\n4 4\n255\n".to_vec();
    expected.extend((0u8..16).map(|v| v << 4));
    assert_eq!(bytes, expected);
}

/// S2: a 2x2 RGB image written as PPM interleaves its three components in
/// row-major RGB order regardless of the order components are supplied in,
/// and the header matches the netpbm P6 layout exactly.
#[test]
fn s2_ppm_two_by_two_is_byte_exact() {
    let c = output_component(2, 2, 8);
    let mut writer = PpmWriter::new(Vec::new(), [c, c, c]).unwrap();
    // Supply out of component order, and out of row order, to exercise
    // both the per-component buffering and the row-flush ordering.
    writer.put(2, 1, 0, &i32_line(&[50, 60], 8)).unwrap();
    writer.put(0, 1, 0, &i32_line(&[10, 20], 8)).unwrap();
    writer.put(1, 1, 0, &i32_line(&[30, 40], 8)).unwrap();
    writer.put(1, 0, 0, &i32_line(&[31, 41], 8)).unwrap();
    writer.put(2, 0, 0, &i32_line(&[51, 61], 8)).unwrap();
    writer.put(0, 0, 0, &i32_line(&[11, 21], 8)).unwrap();
    let (bytes, diagnostics) = writer.finish().unwrap();
    assert!(diagnostics.is_empty());

    let mut expected = b"P6\n2 2\n255\n".to_vec();
    // Row 0 pixel 0 is (R11, G31, B51), pixel 1 is (R21, G41, B61); row 1
    // follows the same RGB interleaving regardless of the arrival order above.
    expected.extend_from_slice(&[11, 31, 51, 21, 41, 61, 10, 30, 50, 20, 40, 60]);
    assert_eq!(bytes, expected);
}

/// S3: a 1x1 RGB image written as BMP comes out to exactly 58 bytes: a
/// 14-byte file header, a 40-byte info header, no palette (3-component),
/// and a single padded-to-4-byte pixel row.
#[test]
fn s3_bmp_one_by_one_rgb_is_fifty_eight_bytes() {
    let c = output_component(1, 1, 8);
    let mut writer = BmpWriter::new(Vec::new(), vec![c, c, c]).unwrap();
    writer.put(0, 0, 0, &i32_line(&[200], 8)).unwrap(); // red
    writer.put(1, 0, 0, &i32_line(&[100], 8)).unwrap(); // green
    writer.put(2, 0, 0, &i32_line(&[50], 8)).unwrap(); // blue
    let (bytes, diagnostics) = writer.finish().unwrap();
    assert!(diagnostics.is_empty());
    assert_eq!(bytes.len(), 58);

    let mut expected = Vec::with_capacity(58);
    expected.extend_from_slice(b"BM");
    expected.extend_from_slice(&58u32.to_le_bytes()); // file size
    expected.extend_from_slice(&0u32.to_le_bytes()); // reserved
    expected.extend_from_slice(&54u32.to_le_bytes()); // data offset: 14 + 40, no palette
    expected.extend_from_slice(&40u32.to_le_bytes()); // info header size
    expected.extend_from_slice(&1u32.to_le_bytes()); // width
    expected.extend_from_slice(&1u32.to_le_bytes()); // height
    expected.extend_from_slice(&1u16.to_le_bytes()); // planes
    expected.extend_from_slice(&24u16.to_le_bytes()); // bitcount
    expected.extend_from_slice(&0u32.to_le_bytes()); // compression
    expected.extend_from_slice(&4u32.to_le_bytes()); // image size: one padded-to-4 row
    expected.extend_from_slice(&2835u32.to_le_bytes()); // x pels/metre
    expected.extend_from_slice(&2835u32.to_le_bytes()); // y pels/metre
    expected.extend_from_slice(&0u32.to_le_bytes()); // colours used
    expected.extend_from_slice(&0u32.to_le_bytes()); // colours important
    expected.extend_from_slice(&[50, 100, 200, 0]); // BGR pixel, one pad byte
    assert_eq!(bytes, expected);
}

/// S4: a 1x1 32-bit float TIFF sample round-trips through the reduced-float
/// bit-exact recipe: with `forced_exponent_bits = 8` at 32-bit precision the
/// reduced layout is IEEE-754 single precision itself, so `1.0f32` is stored
/// as the literal IEEE bit pattern `00 00 80 3F` (little-endian), and the
/// directory declares `SampleFormat = 3` (float).
#[test]
fn s4_tiff_single_float_sample_is_byte_exact() {
    let mut component = output_component(1, 1, 32);
    component.forced_exponent_bits = 8;
    component.signed = true;

    let mut writer =
        TiffWriter::new(Vec::new(), vec![component], TiffOptions::default(), TiffMetadata::default()).unwrap();
    let mut line = LineBuffer::new(SampleKind::F32, 1, 0, false, Precision::new(32));
    line.valid_f32_mut()[0] = 1.0;
    writer.put(0, 0, 0, &line).unwrap();
    let (bytes, diagnostics) = writer.finish().unwrap();
    assert!(diagnostics.is_empty());

    // Classic-TIFF little-endian header: "II", magic 42, first IFD at byte 8.
    assert_eq!(&bytes[0..8], &[b'I', b'I', 42, 0, 8, 0, 0, 0]);
    // The single strip is the last four bytes of the file.
    assert_eq!(&bytes[bytes.len() - 4..], &[0x00, 0x00, 0x80, 0x3F]);

    assert_eq!(read_classic_tag_short(&bytes, 339), Some(3)); // SampleFormat = float
    assert_eq!(read_classic_tag_short(&bytes, 258), Some(32)); // BitsPerSample
}

/// Read a `SHORT`-typed tag's first inline value out of a classic (non-Big)
/// TIFF's single IFD, which always starts at byte 8 right after the header.
fn read_classic_tag_short(bytes: &[u8], tag: u16) -> Option<u16> {
    let count = u16::from_le_bytes(bytes[8..10].try_into().unwrap()) as usize;
    for i in 0..count {
        let entry = &bytes[10 + i * 12..10 + (i + 1) * 12];
        if u16::from_le_bytes(entry[0..2].try_into().unwrap()) == tag {
            return Some(u16::from_le_bytes(entry[8..10].try_into().unwrap()));
        }
    }
    None
}

/// S5: a reversible 5/3 horizontal analysis/synthesis round trip recovers
/// the original combined line exactly, for both even and odd sample values.
#[test]
fn s5_w5x3_horizontal_round_trip_is_exact() {
    let engine = DwtEngine::new(EngineOptions::new_safe());
    let steps = w5x3::cascade();
    let original = i32_line(&[3, -1, 4, -1, 5, 9, -2, 6], 12);

    let pair = engine.horizontal_analyze_i32(&steps, &original);
    let recovered = engine.horizontal_synthesize_i32(&steps, &pair);

    assert_eq!(recovered.valid_i32(), original.valid_i32());
}

/// S6: an irreversible 9/7 horizontal analysis/synthesis round trip
/// recovers the original line to within floating-point tolerance, not
/// exactly, matching the kernel's irreversible nature.
#[test]
fn s6_w9x7_horizontal_round_trip_is_near_identity() {
    let engine = DwtEngine::new(EngineOptions::new_safe());
    let steps = w9x7::cascade_float();
    let mut original = LineBuffer::new(SampleKind::F32, 8, 0, false, Precision::new(12));
    original
        .valid_f32_mut()
        .copy_from_slice(&[0.1, -0.2, 0.3, -0.05, 0.15, 0.25, -0.3, 0.0]);

    let pair = engine.horizontal_analyze_f32(&steps, &original);
    let recovered = engine.horizontal_synthesize_f32(&steps, &pair);

    for (a, b) in original.valid_f32().iter().zip(recovered.valid_f32()) {
        assert!((a - b).abs() < 1e-5, "expected {a} ~= {b}");
    }
}

/// Property 6 (spec.md §8): a writer commits rows to its sink strictly in
/// increasing row order, never out of order, no matter what order its
/// caller supplies them in. PPM is the format most exposed to this since it
/// buffers whole rows pending every component's arrival.
#[test]
fn property_rows_commit_in_increasing_order_regardless_of_arrival() {
    let c = output_component(1, 3, 8);
    let mut writer = PpmWriter::new(Vec::new(), [c, c, c]).unwrap();

    // Deliver row 2 fully before row 0 or row 1 sees any component.
    for comp in 0..3 {
        writer.put(comp, 2, 0, &i32_line(&[(comp * 10) as i32], 8)).unwrap();
    }
    for comp in 0..3 {
        writer.put(comp, 0, 0, &i32_line(&[(comp * 10 + 1) as i32], 8)).unwrap();
    }
    for comp in 0..3 {
        writer.put(comp, 1, 0, &i32_line(&[(comp * 10 + 2) as i32], 8)).unwrap();
    }

    let diagnostics = writer.close().unwrap();
    assert!(diagnostics.is_empty());
}

/// Direction ordering also holds for the vertical cascade: analysis then
/// synthesis over a matched low/high row pair recovers the original rows.
#[test]
fn vertical_w5x3_round_trip_is_exact() {
    let engine = DwtEngine::new(EngineOptions::new_safe());
    let steps = w5x3::cascade();
    let low = i32_line(&[1, 2, 3, 4], 10);
    let high = i32_line(&[5, 6, 7, 8], 10);
    let mut rows = vec![low.clone(), high.clone()];

    engine.vertical_cascade_i32(&steps, &mut rows, Direction::Analysis);
    engine.vertical_cascade_i32(&steps, &mut rows, Direction::Synthesis);

    assert_eq!(rows[0].valid_i32(), low.valid_i32());
    assert_eq!(rows[1].valid_i32(), high.valid_i32());
}
