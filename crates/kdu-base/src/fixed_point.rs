//! Fixed-point arithmetic primitives.
//!
//! All functions here are total: they never panic and never report an
//! error, matching the "kernels never fail" contract the rest of this
//! family of crates relies on. Invalid precisions are clipped by
//! [`Precision::new`](crate::precision::Precision::new) before they reach
//! these routines.

use crate::precision::{ByteEndian, Precision};

/// Round `(x + r) >> d`, rounding half up toward positive infinity.
///
/// This is the rounding rule every reversible lifting step in this crate
/// uses: `R = 1 << (D - 1)`, added before the arithmetic shift. It
/// is deliberately NOT IEEE round-to-nearest-even.
#[inline(always)]
pub fn round_shift(x: i64, d: u32) -> i64 {
    if d == 0 {
        return x;
    }
    let r = 1i64 << (d - 1);
    (x + r) >> d
}

/// Saturating pack from a wider accumulator down to the signed 16-bit range.
///
/// Clips rather than wrapping, the edge policy every lifting kernel here
/// that narrows back to 16 bits relies on.
#[inline(always)]
pub fn saturating_pack_i16(x: i32) -> i16 {
    x.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Clip `x` to the range implied by precision `p` and signedness.
///
/// Unsigned ranges are `[0, 2^P - 1]`; signed ranges are
/// `[-2^(P-1), 2^(P-1) - 1]`.
#[inline]
pub fn clip_to_precision(x: i64, p: Precision, signed: bool) -> i64 {
    if signed {
        let (lo, hi) = p.signed_range();
        x.clamp(lo, hi)
    } else {
        x.clamp(0, p.unsigned_max() as i64)
    }
}

/// Reverse the byte order of a 32-bit word.
///
/// Probes host endianness once and returns immediately when it already
/// matches the target order, rather than swapping unconditionally.
#[inline]
pub fn swap_u32_to(word: u32, target: ByteEndian) -> u32 {
    let host_le = crate::precision::host_is_le();
    let host_order_is_target = matches!(
        (host_le, target),
        (true, ByteEndian::LE) | (false, ByteEndian::BE)
    );
    if host_order_is_target {
        word
    } else {
        word.swap_bytes()
    }
}

/// In-place 32-bit word byte-swap over a buffer of native-endian words,
/// only touching the buffer when the host order differs from `target`.
pub fn swap_u32_slice_to(words: &mut [u32], target: ByteEndian) {
    let host_le = crate::precision::host_is_le();
    let host_order_is_target = matches!(
        (host_le, target),
        (true, ByteEndian::LE) | (false, ByteEndian::BE)
    );
    if host_order_is_target {
        return;
    }
    for w in words.iter_mut() {
        *w = w.swap_bytes();
    }
}
