//! The multi-resolution analysis/synthesis loop (spec.md §2, §3
//! `SubbandPair`) that sequences interleave/deinterleave (C4) and the
//! lifting-step cascade (C3) into one full-line transform.
//!
//! Two independent directions are modelled, matching the "vertical step" /
//! "horizontal step" split in spec.md §4.3:
//!
//! - *Horizontal* transforms act within a single row: the row is split into
//!   its even/odd polyphase components (deinterleave), the step cascade runs
//!   across that pair using offset-indexed taps, and for synthesis the
//!   recovered pair is interleaved back into one row.
//! - *Vertical* transforms act across a small window of whole row buffers
//!   (one [`LineBuffer`] per row): no deinterleave is needed since distinct
//!   rows are already separate buffers: the cascade reads whole neighbouring
//!   rows as its taps.
//!
//! Both directions share the same step-parity rule (spec.md §3: even step
//! index updates the odd-indexed half from the even-indexed half, odd steps
//! the reverse) and the same boundary policy: taps that fall outside the
//! valid region are supplied by whole-sample symmetric extension into the
//! buffer's padding, consuming up to [`LiftingStep::horizontal_extension`]
//! samples of it.
use kdu_base::fixed_point::{round_shift, saturating_pack_i16};
use kdu_base::options::EngineOptions;
use kdu_base::precision::SampleKind;
use kdu_base::sample_buffer::{LineBuffer, ALIGN};

use crate::dispatch::DeinterleaveBackend;
use crate::interleave;
use crate::step::{Direction, KernelId, LiftingStep};

/// Two adjacent-resolution subband line buffers, low-pass and high-pass,
/// whose interleaving yields the next higher resolution line (spec.md §3).
#[derive(Debug, Clone)]
pub struct SubbandPair {
    pub low:  LineBuffer,
    pub high: LineBuffer
}

/// Sequences the lifting-step cascade over whole lines or row windows.
///
/// Selects its deinterleave backend once at construction from
/// [`EngineOptions`]'s capability flags (the REDESIGN FLAG in spec.md §9:
/// a capability table chosen at initialisation, not per-call dispatch).
pub struct DwtEngine {
    options:      EngineOptions,
    deinterleave: DeinterleaveBackend
}

impl DwtEngine {
    pub fn new(options: EngineOptions) -> Self {
        let deinterleave = DeinterleaveBackend::select(&options);
        DwtEngine { options, deinterleave }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Whole-sample symmetric extension into a 32-bit buffer's padding:
    /// `x[-n] = x[n]`, `x[width-1+n] = x[width-1-n]`, mirroring about the
    /// first/last valid sample without repeating it. Only the first `ext`
    /// samples of padding on each side are populated; `ext` is capped at
    /// [`ALIGN`] since padding never holds more.
    fn extend_symmetric_i32(buf: &mut LineBuffer, ext: usize) {
        let ext = ext.min(ALIGN);
        let width = buf.width();
        let padded = buf.padded_i32_mut();
        for i in 1..=ext {
            let left_src = padded[ALIGN + i.min(width.saturating_sub(1))];
            padded[ALIGN - i] = left_src;
            let right_src_idx = ALIGN + width - 1 - i.min(width.saturating_sub(1));
            padded[ALIGN + width - 1 + i] = padded[right_src_idx];
        }
    }

    fn extend_symmetric_f32(buf: &mut LineBuffer, ext: usize) {
        let ext = ext.min(ALIGN);
        let width = buf.width();
        let padded = buf.padded_f32_mut();
        for i in 1..=ext {
            let left_src = padded[ALIGN + i.min(width.saturating_sub(1))];
            padded[ALIGN - i] = left_src;
            let right_src_idx = ALIGN + width - 1 - i.min(width.saturating_sub(1));
            padded[ALIGN + width - 1 + i] = padded[right_src_idx];
        }
    }

    /// Run the reversible-integer cascade across a deinterleaved pair,
    /// alternating which half is source and which is destination by step
    /// parity, honouring `dir` both for the sign and (on synthesis) for
    /// running the steps in reverse order (spec.md §3: "step order is fixed
    /// and irreversible").
    fn run_cascade_i32(steps: &[LiftingStep], low: &mut LineBuffer, high: &mut LineBuffer, dir: Direction) {
        let ordered: Vec<&LiftingStep> = match dir {
            Direction::Analysis => steps.iter().collect(),
            Direction::Synthesis => steps.iter().rev().collect()
        };
        for step in ordered {
            let (src, dst) = if step.step_index % 2 == 0 {
                (&mut *low, &mut *high)
            } else {
                (&mut *high, &mut *low)
            };
            Self::extend_symmetric_i32(src, step.horizontal_extension);
            let n = dst.width();
            let ic0 = step.ic[0] as i64;
            let ns = step.support_start;
            let sign = dir.sign();
            let src_padded = src.padded_i32();
            let dst_padded = dst.padded_i32_mut();
            for k in 0..n {
                let i0 = (ALIGN as isize + k as isize + ns) as usize;
                let mut sum = 0i64;
                for t in 0..step.support_len {
                    sum += ic0 * src_padded[i0 + t] as i64;
                }
                let delta = round_shift(sum, step.downshift);
                dst_padded[ALIGN + k] = (dst_padded[ALIGN + k] as i64 + sign * delta) as i32;
            }
        }
    }

    /// Run the irreversible-float cascade, same shape as
    /// [`Self::run_cascade_i32`] but with float coefficients and no
    /// rounding shift.
    fn run_cascade_f32(steps: &[LiftingStep], low: &mut LineBuffer, high: &mut LineBuffer, dir: Direction) {
        let ordered: Vec<&LiftingStep> = match dir {
            Direction::Analysis => steps.iter().collect(),
            Direction::Synthesis => steps.iter().rev().collect()
        };
        for step in ordered {
            let (src, dst) = if step.step_index % 2 == 0 {
                (&mut *low, &mut *high)
            } else {
                (&mut *high, &mut *low)
            };
            Self::extend_symmetric_f32(src, step.horizontal_extension);
            let n = dst.width();
            let c0 = step.coeffs[0];
            let ns = step.support_start;
            let sign = dir.sign_f32();
            let src_padded = src.padded_f32();
            let dst_padded = dst.padded_f32_mut();
            for k in 0..n {
                let i0 = (ALIGN as isize + k as isize + ns) as usize;
                let mut sum = 0.0f32;
                for t in 0..step.support_len {
                    sum += c0 * src_padded[i0 + t];
                }
                dst_padded[ALIGN + k] += sign * sum;
            }
        }
    }

    /// Horizontal-direction analysis: split one combined-resolution line
    /// into its low/high subband pair and run the reversible step cascade.
    pub fn horizontal_analyze_i32(&self, steps: &[LiftingStep], combined: &LineBuffer) -> SubbandPair {
        let pairs = combined.width() / 2;
        let mut low = LineBuffer::new(
            SampleKind::I32,
            pairs,
            combined.start_col() / 2,
            combined.is_absolute(),
            combined.precision()
        );
        let mut high = LineBuffer::new(
            SampleKind::I32,
            pairs,
            combined.start_col() / 2,
            combined.is_absolute(),
            combined.precision()
        );
        interleave::deinterleave_32(combined.valid_i32(), low.valid_i32_mut(), high.valid_i32_mut(), pairs);
        Self::run_cascade_i32(steps, &mut low, &mut high, Direction::Analysis);
        SubbandPair { low, high }
    }

    /// Horizontal-direction synthesis: undo the reversible step cascade and
    /// interleave the resulting pair back into one combined line.
    pub fn horizontal_synthesize_i32(&self, steps: &[LiftingStep], pair: &SubbandPair) -> LineBuffer {
        let mut low = pair.low.clone();
        let mut high = pair.high.clone();
        Self::run_cascade_i32(steps, &mut low, &mut high, Direction::Synthesis);

        let pairs = low.width();
        let mut combined = LineBuffer::new(
            SampleKind::I32,
            pairs * 2,
            low.start_col() * 2,
            low.is_absolute(),
            low.precision()
        );
        interleave::interleave_32(low.valid_i32(), high.valid_i32(), combined.valid_i32_mut(), pairs);
        combined
    }

    pub fn horizontal_analyze_f32(&self, steps: &[LiftingStep], combined: &LineBuffer) -> SubbandPair {
        let pairs = combined.width() / 2;
        let mut low = LineBuffer::new(
            SampleKind::F32,
            pairs,
            combined.start_col() / 2,
            combined.is_absolute(),
            combined.precision()
        );
        let mut high = LineBuffer::new(
            SampleKind::F32,
            pairs,
            combined.start_col() / 2,
            combined.is_absolute(),
            combined.precision()
        );
        interleave::deinterleave_f32(combined.valid_f32(), low.valid_f32_mut(), high.valid_f32_mut(), pairs);
        Self::run_cascade_f32(steps, &mut low, &mut high, Direction::Analysis);
        SubbandPair { low, high }
    }

    pub fn horizontal_synthesize_f32(&self, steps: &[LiftingStep], pair: &SubbandPair) -> LineBuffer {
        let mut low = pair.low.clone();
        let mut high = pair.high.clone();
        Self::run_cascade_f32(steps, &mut low, &mut high, Direction::Synthesis);

        let pairs = low.width();
        let mut combined = LineBuffer::new(
            SampleKind::F32,
            pairs * 2,
            low.start_col() * 2,
            low.is_absolute(),
            low.precision()
        );
        interleave::interleave_f32(low.valid_f32(), high.valid_f32(), combined.valid_f32_mut(), pairs);
        combined
    }

    /// Vertical-direction transform over a window of whole row buffers: no
    /// deinterleave is needed (rows are already distinct buffers); `rows`
    /// alternates low/high by index in the same way a deinterleaved pair
    /// would, and is updated in place.
    pub fn vertical_cascade_i32(&self, steps: &[LiftingStep], rows: &mut [LineBuffer], dir: Direction) {
        // Split the window into even/odd-indexed row sets and reuse the
        // pairwise cascade on each adjacent low/high pair; for a two-row
        // window (the common case: one subband row of each parity) this is
        // exactly `run_cascade_i32`.
        assert!(rows.len() % 2 == 0, "vertical window must hold matched low/high row pairs");
        for pair in rows.chunks_exact_mut(2) {
            let (low, high) = pair.split_at_mut(1);
            Self::run_cascade_i32(steps, &mut low[0], &mut high[0], dir);
        }
    }

    pub fn vertical_cascade_f32(&self, steps: &[LiftingStep], rows: &mut [LineBuffer], dir: Direction) {
        assert!(rows.len() % 2 == 0, "vertical window must hold matched low/high row pairs");
        for pair in rows.chunks_exact_mut(2) {
            let (low, high) = pair.split_at_mut(1);
            Self::run_cascade_f32(steps, &mut low[0], &mut high[0], dir);
        }
    }

    /// The deinterleave backend this engine selected at construction.
    pub fn deinterleave_backend(&self) -> DeinterleaveBackend {
        self.deinterleave
    }
}

/// Saturating-pack an ATK-kernel accumulator down to 16 bits, exposed here
/// since the engine's cascade runners are the only callers that need it
/// (spec.md §4.3: ATK steps saturate before combining with `dst_in`).
#[inline]
pub(crate) fn atk_pack(acc: i64) -> i16 {
    saturating_pack_i16(acc as i32)
}

#[allow(unused_imports)]
use KernelId as _KernelIdReexportCheck;

#[cfg(test)]
mod tests {
    use kdu_base::precision::Precision;

    use super::*;
    use crate::lifting::w5x3;

    fn line_from(values: &[i32], precision: u32) -> LineBuffer {
        let mut buf = LineBuffer::new(SampleKind::I32, values.len(), 0, true, Precision::new(precision));
        buf.valid_i32_mut().copy_from_slice(values);
        buf
    }

    #[test]
    fn horizontal_w5x3_analysis_then_synthesis_is_identity() {
        let engine = DwtEngine::new(EngineOptions::new_safe());
        let steps = w5x3::cascade();
        let input = line_from(&[0, 1, 2, 3, 4, 5, 6, 7], 16);

        let pair = engine.horizontal_analyze_i32(&steps, &input);
        let reconstructed = engine.horizontal_synthesize_i32(&steps, &pair);

        assert_eq!(reconstructed.valid_i32(), input.valid_i32());
    }

    #[test]
    fn horizontal_w5x3_round_trip_on_odd_precision_values() {
        let engine = DwtEngine::new(EngineOptions::new_fast());
        let steps = w5x3::cascade();
        let input = line_from(&[100, -37, 256, 12, -8000, 4095, -1, 1], 14);

        let pair = engine.horizontal_analyze_i32(&steps, &input);
        let reconstructed = engine.horizontal_synthesize_i32(&steps, &pair);

        assert_eq!(reconstructed.valid_i32(), input.valid_i32());
    }

    #[test]
    fn vertical_w5x3_round_trip_matches_horizontal() {
        let steps = w5x3::cascade();
        let low = line_from(&[10, 20, 30, 40], 16);
        let high = line_from(&[1, -2, 3, -4], 16);
        let mut rows = vec![low.clone(), high.clone()];
        let engine = DwtEngine::new(EngineOptions::new_safe());

        engine.vertical_cascade_i32(&steps, &mut rows, Direction::Analysis);
        engine.vertical_cascade_i32(&steps, &mut rows, Direction::Synthesis);

        assert_eq!(rows[0].valid_i32(), low.valid_i32());
        assert_eq!(rows[1].valid_i32(), high.valid_i32());
    }

    fn line_from_f32(values: &[f32]) -> LineBuffer {
        let mut buf = LineBuffer::new(SampleKind::F32, values.len(), 0, false, Precision::new(32));
        buf.valid_f32_mut().copy_from_slice(values);
        buf
    }

    #[test]
    fn horizontal_w9x7_round_trip_is_near_identity() {
        let engine = DwtEngine::new(EngineOptions::new_safe());
        let steps = crate::lifting::w9x7::cascade_float();
        let values = vec![100.0f32; 16];
        let input = line_from_f32(&values);

        let pair = engine.horizontal_analyze_f32(&steps, &input);
        let reconstructed = engine.horizontal_synthesize_f32(&steps, &pair);

        for (a, b) in input.valid_f32().iter().zip(reconstructed.valid_f32().iter()) {
            assert!((a - b).abs() < 1e-5, "expected {a} ~= {b}");
        }
    }
}
