//! The arbitrary transform kernel (ATK) general case (spec.md §4.3).
//!
//! Unlike W5X3/W9X7, an ATK step's taps are not assumed symmetric: support
//! length `Ls` is 1-4 on the accelerated path (pair-wise for `Ls in {1,2}`,
//! two pairs for `Ls in {3,4}`) and unbounded on the scalar path used here.
//! The combination rule also differs: the weighted sum is accumulated in
//! 32 bits, rounded, shifted, and saturating-packed to 16 bits *before*
//! being combined with `dst_in`, rather than added in full precision.

use kdu_base::fixed_point::{round_shift, saturating_pack_i16};

use crate::step::{Direction, KernelId, LiftingStep};

/// Build a reversible ATK step from explicit per-tap integer coefficients.
///
/// `support_len` may exceed 4; only `Ls in 1..=4` is accelerated elsewhere
/// in this crate (spec.md §3), the scalar path here has no such limit.
pub fn reversible_step(
    step_index: usize, support_start: isize, ic: Vec<i32>, downshift: u32
) -> LiftingStep {
    let support_len = ic.len();
    LiftingStep {
        step_index,
        support_start,
        support_len,
        ic,
        downshift,
        second_downshift: 0,
        integer_portion: 0,
        coeffs: vec![],
        horizontal_extension: support_len.saturating_sub(1),
        kernel: KernelId::Atk,
        add_shorts_first: false
    }
}

pub fn irreversible_step(step_index: usize, support_start: isize, coeffs: Vec<f32>) -> LiftingStep {
    let support_len = coeffs.len();
    LiftingStep {
        step_index,
        support_start,
        support_len,
        ic: vec![],
        downshift: 0,
        second_downshift: 0,
        integer_portion: 0,
        coeffs,
        horizontal_extension: support_len.saturating_sub(1),
        kernel: KernelId::Atk,
        add_shorts_first: false
    }
}

/// Scalar vertical step for the reversible ATK path: accumulate in 32 bits,
/// round-shift, saturating-pack to 16 bits, then combine with `dst_in`.
pub fn vertical_step_i16(
    step: &LiftingStep, srcs: &[&[i16]], dst_in: &[i16], dst_out: &mut [i16], n: usize,
    dir: Direction
) {
    let sign = dir.sign();
    for k in 0..n {
        let mut acc: i64 = 0;
        for (t, src) in srcs.iter().enumerate() {
            acc += step.ic[t] as i64 * src[k] as i64;
        }
        let shifted = round_shift(acc, step.downshift);
        let packed = saturating_pack_i16(shifted as i32);
        dst_out[k] = (dst_in[k] as i64 + sign * packed as i64) as i16;
    }
}

/// Scalar vertical step for the irreversible float ATK path.
pub fn vertical_step_f32(
    step: &LiftingStep, srcs: &[&[f32]], dst_in: &[f32], dst_out: &mut [f32], n: usize,
    dir: Direction
) {
    let sign = dir.sign_f32();
    for k in 0..n {
        let mut acc = 0.0f32;
        for (t, src) in srcs.iter().enumerate() {
            acc += step.coeffs[t] * src[k];
        }
        dst_out[k] = dst_in[k] + sign * acc;
    }
}
