//! `kdu-cli`: a single compress/expand command that exercises both halves
//! of this workspace in one pipeline. It reads raw `i32` samples off disk,
//! builds a [`LineBuffer`] per row, runs each row through a [`DwtEngine`]
//! (spec.md §4.3-4.4), then through the sample-transfer layer (spec.md
//! §4.6) into whichever writer the `-o` extension selects.
//!
//! The pipeline is deliberately row-at-a-time and single-component: it is a
//! demonstration harness for the library crates, not an encoder for real
//! imagery (no tiling, no multi-resolution subband chains, no entropy
//! coding). `--direction roundtrip` (the default) analyses then synthesises
//! every row in place, so a correct build reproduces the input exactly for
//! `w5x3` and closely for `w9x7`.
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::exit;

use kdu_base::options::EngineOptions;
use kdu_base::precision::{ByteEndian, Precision};
use kdu_base::sample_buffer::{LineBuffer, SampleKind};
use kdu_dwt::engine::{DwtEngine, SubbandPair};
use kdu_dwt::lifting::{w5x3, w9x7};
use kdu_dwt::step::LiftingStep;
use kdu_imageio::{BmpWriter, LineSink, OutputComponent, PgmWriter, PpmWriter, RawWriter, TiffMetadata, TiffOptions, TiffWriter};
use kdu_transfer::FloatReinterpretTransform;
use log::{debug, error, info, warn};

mod cmd_args;
mod errors;

use cmd_args::{DirectionChoice, FilterChoice, FprecSpec};
use errors::CliError;

fn main() {
    let matches = cmd_args::create_cmd_args().get_matches();
    simple_logger::init_with_level(log::Level::Warn).ok();

    if let Err(e) = run(&matches) {
        error!("kdu-cli: {e}");
        exit(1);
    }
}

fn run(matches: &clap::ArgMatches) -> Result<(), CliError> {
    let input = matches.get_one::<std::ffi::OsString>("in").unwrap();
    let output = matches.get_one::<std::ffi::OsString>("out").unwrap();
    let width = *matches.get_one::<usize>("width").unwrap();
    let height = *matches.get_one::<usize>("height").unwrap();
    let precision = *matches.get_one::<u32>("precision").unwrap();
    let signed = matches.get_flag("signed");
    let safe = matches.get_flag("safe");
    let filter = matches.get_one::<FilterChoice>("filter").copied().unwrap_or(FilterChoice::W5X3);
    let direction = matches.get_one::<DirectionChoice>("direction").copied().unwrap_or(DirectionChoice::RoundTrip);
    let fprec = matches.get_one::<FprecSpec>("fprec").copied();

    info!("reading {input:?} as {width}x{height} samples at {precision}-bit precision");
    let samples = read_samples(input, width, height)?;

    let options = if safe { EngineOptions::new_safe() } else { EngineOptions::new_fast() };
    let engine = DwtEngine::new(options);
    debug!("dispatching on {:?}", engine.deinterleave_backend());

    let orig_precision = Precision::new(precision);
    let mut rows = Vec::with_capacity(height);
    match filter {
        FilterChoice::W5X3 => {
            let steps = w5x3::cascade();
            for row in samples.chunks(width) {
                rows.push(run_row_i32(&engine, &steps, row, width, orig_precision, direction));
            }
        }
        FilterChoice::W9X7 => {
            let steps = w9x7::cascade_float();
            for row in samples.chunks(width) {
                rows.push(run_row_f32(&engine, &steps, row, width, orig_precision, direction));
            }
        }
    }

    write_rows(output, rows, width, height, orig_precision, signed, fprec)
}

fn read_samples(path: &OsStr, width: usize, height: usize) -> Result<Vec<i32>, CliError> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let expected = width * height * 4;
    if bytes.len() != expected {
        return Err(CliError::InputSizeMismatch { expected, got: bytes.len() });
    }
    Ok(bytes.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect())
}

/// Run one row through the reversible integer cascade, per `direction`.
fn run_row_i32(
    engine: &DwtEngine, steps: &[LiftingStep; 2], row: &[i32], width: usize, precision: Precision,
    direction: DirectionChoice
) -> Vec<i32> {
    let mut combined = LineBuffer::new(SampleKind::I32, width, 0, true, precision);
    combined.valid_i32_mut().copy_from_slice(row);

    let result = match direction {
        DirectionChoice::Analysis => {
            let pair = engine.horizontal_analyze_i32(steps, &combined);
            concat_pair_i32(&pair)
        }
        DirectionChoice::Synthesis => {
            let pair = split_pair_i32(&combined, width);
            engine.horizontal_synthesize_i32(steps, &pair).valid_i32().to_vec()
        }
        DirectionChoice::RoundTrip => {
            let pair = engine.horizontal_analyze_i32(steps, &combined);
            engine.horizontal_synthesize_i32(steps, &pair).valid_i32().to_vec()
        }
    };
    result
}

/// Run one row through the irreversible floating-point cascade.
fn run_row_f32(
    engine: &DwtEngine, steps: &[LiftingStep; 4], row: &[i32], width: usize, precision: Precision,
    direction: DirectionChoice
) -> Vec<i32> {
    let mut combined = LineBuffer::new(SampleKind::F32, width, 0, true, precision);
    combined.valid_f32_mut().iter_mut().zip(row).for_each(|(dst, &src)| *dst = src as f32);

    let result: Vec<f32> = match direction {
        DirectionChoice::Analysis => {
            let pair = engine.horizontal_analyze_f32(steps, &combined);
            concat_pair_f32(&pair)
        }
        DirectionChoice::Synthesis => {
            let pair = split_pair_f32(&combined, width);
            engine.horizontal_synthesize_f32(steps, &pair).valid_f32().to_vec()
        }
        DirectionChoice::RoundTrip => {
            let pair = engine.horizontal_analyze_f32(steps, &combined);
            engine.horizontal_synthesize_f32(steps, &pair).valid_f32().to_vec()
        }
    };
    result.into_iter().map(|v| v.round() as i32).collect()
}

fn concat_pair_i32(pair: &SubbandPair) -> Vec<i32> {
    pair.low.valid_i32().iter().chain(pair.high.valid_i32()).copied().collect()
}

fn split_pair_i32(combined: &LineBuffer, width: usize) -> SubbandPair {
    let half = width / 2;
    let mut low = LineBuffer::new(SampleKind::I32, half, 0, combined.is_absolute(), combined.precision());
    let mut high = LineBuffer::new(SampleKind::I32, width - half, 0, combined.is_absolute(), combined.precision());
    low.valid_i32_mut().copy_from_slice(&combined.valid_i32()[..half]);
    high.valid_i32_mut().copy_from_slice(&combined.valid_i32()[half..]);
    SubbandPair { low, high }
}

fn concat_pair_f32(pair: &SubbandPair) -> Vec<f32> {
    pair.low.valid_f32().iter().chain(pair.high.valid_f32()).copied().collect()
}

fn split_pair_f32(combined: &LineBuffer, width: usize) -> SubbandPair {
    let half = width / 2;
    let mut low = LineBuffer::new(SampleKind::F32, half, 0, combined.is_absolute(), combined.precision());
    let mut high = LineBuffer::new(SampleKind::F32, width - half, 0, combined.is_absolute(), combined.precision());
    low.valid_f32_mut().copy_from_slice(&combined.valid_f32()[..half]);
    high.valid_f32_mut().copy_from_slice(&combined.valid_f32()[half..]);
    SubbandPair { low, high }
}

/// Feed the transformed rows through the sample-transfer layer into the
/// writer the `-o` extension selects (spec.md §6).
fn write_rows(
    output: &OsStr, rows: Vec<Vec<i32>>, width: usize, height: usize, orig_precision: Precision, signed: bool,
    fprec: Option<FprecSpec>
) -> Result<(), CliError> {
    let ext = Path::new(output)
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| CliError::UnknownOutputExtension { extension: String::new() })?;

    let forced_precision = fprec.map(|f| Precision::new(f.precision));
    let align_lsb = fprec.map_or(false, |f| !f.msb_aligned);
    let forced_exponent_bits = fprec.and_then(|f| f.float_exp_bits).unwrap_or(0);

    if forced_exponent_bits != 0 && ext != "tiff" && ext != "tif" {
        return Err(CliError::FloatPrecisionNotSupported { writer: writer_name(&ext) });
    }

    let component = OutputComponent {
        width,
        height,
        orig_precision,
        signed,
        forced_precision,
        align_lsb,
        forced_exponent_bits
    };

    let file = File::create(output)?;
    let diagnostics = match ext.as_str() {
        "pgm" => {
            let mut writer = PgmWriter::new(file, component)?;
            feed_single_component(&mut writer, &rows, width, component)?;
            writer.close()?
        }
        "ppm" => {
            let components = [component; 3];
            let mut writer = PpmWriter::new(file, components)?;
            for comp in 0..3 {
                for (row_index, row) in rows.iter().enumerate() {
                    let buf = row_to_buffer(row, width, orig_precision);
                    writer.put(comp, row_index, 0, &buf)?;
                }
            }
            writer.close()?
        }
        "bmp" => {
            let mut writer = BmpWriter::new(file, vec![component; 3])?;
            for comp in 0..3 {
                for (row_index, row) in rows.iter().enumerate() {
                    let buf = row_to_buffer(row, width, orig_precision);
                    writer.put(comp, row_index, 0, &buf)?;
                }
            }
            writer.close()?
        }
        "raw" => {
            let endian = if align_lsb { ByteEndian::LE } else { ByteEndian::BE };
            let mut writer = RawWriter::new(file, component, endian)?;
            feed_single_component(&mut writer, &rows, width, component)?;
            writer.close()?
        }
        "tiff" | "tif" => {
            let options = TiffOptions::default();
            let metadata = TiffMetadata::default();
            let mut writer = TiffWriter::new(file, vec![component], options, metadata)?;
            if forced_exponent_bits != 0 {
                write_float_rows(&mut writer, &rows, width, orig_precision, forced_exponent_bits, signed)?;
            } else {
                feed_single_component(&mut writer, &rows, width, component)?;
            }
            writer.close()?
        }
        other => return Err(CliError::UnknownOutputExtension { extension: other.to_string() })
    };

    if diagnostics.is_empty() {
        info!("wrote {output:?}");
    } else {
        for message in diagnostics.iter() {
            warn!("{message}");
        }
    }
    Ok(())
}

fn writer_name(ext: &str) -> &'static str {
    match ext {
        "pgm" => "pgm",
        "ppm" => "ppm",
        "bmp" => "bmp",
        "raw" => "raw",
        _ => "unknown"
    }
}

fn row_to_buffer(row: &[i32], width: usize, precision: Precision) -> LineBuffer {
    let mut buf = LineBuffer::new(SampleKind::I32, width, 0, true, precision);
    buf.valid_i32_mut().copy_from_slice(row);
    buf
}

fn feed_single_component<S: LineSink>(
    writer: &mut S, rows: &[Vec<i32>], width: usize, component: OutputComponent
) -> Result<(), CliError> {
    for (row_index, row) in rows.iter().enumerate() {
        let buf = row_to_buffer(row, width, component.orig_precision);
        writer.put(0, row_index, 0, &buf)?;
    }
    Ok(())
}

/// Treat each row's raw samples as IEEE-754 bit patterns and hand them to
/// the writer as a floating-point component, for `-fprec ...F<e>` on a TIFF
/// output (spec.md §4.5): [`kdu_imageio::tiff::TiffWriter::pack_row`]
/// expects true `f32` values and re-derives the reduced-precision bit
/// pattern itself via [`kdu_transfer::ieee_bits_to_reduced_float`].
fn write_float_rows<S: LineSink>(
    writer: &mut S, rows: &[Vec<i32>], width: usize, precision: Precision, exponent_bits: u32, signed: bool
) -> Result<(), CliError> {
    // Eagerly validate the exponent width against the declared precision
    // before writing anything, matching spec.md §7's "ConfigError ...
    // raised at the first opportunity".
    FloatReinterpretTransform::new(precision.get(), exponent_bits, signed).map_err(CliError::Config)?;
    for (row_index, row) in rows.iter().enumerate() {
        let mut buf = LineBuffer::new(SampleKind::F32, width, 0, true, precision);
        for (dst, &src) in buf.valid_f32_mut().iter_mut().zip(row) {
            *dst = f32::from_bits(src as u32);
        }
        writer.put(0, row_index, 0, &buf)?;
    }
    Ok(())
}
