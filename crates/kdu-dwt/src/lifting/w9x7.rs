//! The irreversible Daubechies 9/7 wavelet (spec.md §4.3).
//!
//! Coefficients are taken verbatim from the Kakadu `x86_dwt_local.h`
//! `W97_FACT_{0..3}` constants (see DESIGN.md), which is also where the
//! two fixed-point quantisation rules below are grounded:
//!
//! - `lambda_s = round(remainder_s * 2^15)` for steps 0, 2, 3, where
//!   `remainder_s = W97_FACT_s - integer_portion_s`.
//! - step 1 quantises at `2^16` instead of `2^15` (it needs the extra bit of
//!   precision because its coefficient magnitude is small), and its
//!   fixed-point application shifts right by 16 and then by a further 3
//!   (instead of once by 15), matching spec.md §4.3.
//! - steps 0 and 2 carry an exact integer coefficient part (`-2` and `+1`
//!   respectively) which is added unshifted; steps 1 and 3 have none.

use kdu_base::fixed_point::round_shift;

use crate::step::{Direction, KernelId, LiftingStep};

/// The four real-valued coefficients of the 9/7 filter, in step order.
pub const W97_FACT: [f32; 4] = [-1.586_134_342, -0.052_980_118, 0.882_911_075, 0.443_506_852];

/// Integer portion absorbed by the 16-bit fixed-point path at each step.
const INTEGER_PORTION: [i32; 4] = [-2, 0, 1, 0];

fn quantise(step_index: usize) -> (i32, u32, u32) {
    let remainder = W97_FACT[step_index] - INTEGER_PORTION[step_index] as f32;
    if step_index == 1 {
        let lambda = (remainder * 65536.0).round() as i32;
        (lambda, 16, 3)
    } else {
        let lambda = (remainder * 32768.0).round() as i32;
        (lambda, 15, 0)
    }
}

/// Build the four-step irreversible float cascade (used for `f32` lines).
pub fn cascade_float() -> [LiftingStep; 4] {
    core::array::from_fn(|s| LiftingStep {
        step_index:          s,
        support_start:       0,
        support_len:         2,
        ic:                  vec![],
        downshift:           0,
        second_downshift:    0,
        integer_portion:     0,
        coeffs:              vec![W97_FACT[s], W97_FACT[s]],
        horizontal_extension: 1,
        kernel:              KernelId::W9X7,
        add_shorts_first:    false
    })
}

/// Build the four-step 16-bit fixed-point cascade (reversible-storage
/// approximation used when the engine is asked to keep 9/7 in integer
/// line buffers, e.g. for bit-exact SIMD differential testing).
pub fn cascade_fixed16() -> [LiftingStep; 4] {
    core::array::from_fn(|s| {
        let (lambda, shift1, shift2) = quantise(s);
        LiftingStep {
            step_index:          s,
            support_start:       0,
            support_len:         2,
            ic:                  vec![lambda, lambda],
            downshift:           shift1,
            second_downshift:    shift2,
            integer_portion:     INTEGER_PORTION[s],
            coeffs:              vec![],
            horizontal_extension: 1,
            kernel:              KernelId::W9X7,
            add_shorts_first:    true
        }
    })
}

/// Scalar float vertical step.
pub fn vertical_step_f32(
    step: &LiftingStep, src0: &[f32], src1: &[f32], dst_in: &[f32], dst_out: &mut [f32], n: usize,
    dir: Direction
) {
    let c = step.coeffs[0];
    let sign = dir.sign_f32();
    for k in 0..n {
        dst_out[k] = dst_in[k] + sign * c * (src0[k] + src1[k]);
    }
}

/// Scalar 16-bit fixed-point vertical step, implementing the two-stage
/// shift for step 1 and the integer-portion addition for steps 0 and 2.
pub fn vertical_step_fixed16(
    step: &LiftingStep, src0: &[i32], src1: &[i32], dst_in: &[i32], dst_out: &mut [i32], n: usize,
    dir: Direction
) {
    let lambda = step.ic[0] as i64;
    let sign = dir.sign();
    for k in 0..n {
        let raw_sum = src0[k] as i64 + src1[k] as i64;
        let mut delta = round_shift(lambda * raw_sum, step.downshift);
        if step.second_downshift > 0 {
            delta = round_shift(delta, step.second_downshift);
        }
        delta += step.integer_portion as i64 * raw_sum;
        dst_out[k] = (dst_in[k] as i64 + sign * delta) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_single_step_analysis_then_synthesis_is_exact_identity() {
        // A single step's synthesis is the algebraic inverse of its analysis
        // as long as the taps it reads (src0, src1) are untouched between
        // the two calls; the full four-step cascade's round-trip through a
        // real two-subband signal is covered by the engine-level scenario
        // tests (spec.md S6).
        let steps = cascade_float();
        let src0 = [10.0f32, -20.0, 30.5, -5.25];
        let src1 = [1.0f32, 2.0, -3.5, 4.0];
        let dst_in = [100.0f32, 100.0, 100.0, 100.0];

        for step in &steps {
            let mut forward = [0.0f32; 4];
            vertical_step_f32(step, &src0, &src1, &dst_in, &mut forward, 4, Direction::Analysis);
            let mut back = [0.0f32; 4];
            vertical_step_f32(step, &src0, &src1, &forward, &mut back, 4, Direction::Synthesis);
            for (a, b) in dst_in.iter().zip(back.iter()) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn lambda_quantisation_matches_documented_rule() {
        let (l0, s0, s0b) = quantise(0);
        assert_eq!(s0, 15);
        assert_eq!(s0b, 0);
        assert_eq!(l0, ((-1.586_134_342f32 + 2.0) * 32768.0).round() as i32);

        let (l1, s1, s1b) = quantise(1);
        assert_eq!(s1, 16);
        assert_eq!(s1b, 3);
        assert_eq!(l1, (-0.052_980_118f32 * 65536.0).round() as i32);
    }
}
