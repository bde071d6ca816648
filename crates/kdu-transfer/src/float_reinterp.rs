//! Bit-exact repack between integer-encoded reduced-precision floats and
//! IEEE-754 single precision (spec.md §4.5, component C5).
//!
//! The recipe is the six-step one in spec.md §4.5: a reduced-precision
//! float with `E` exponent bits and `M = P-1-E` mantissa bits is packed
//! into a `P`-bit word (sign at bit `P-1`, exponent at bits `[M, M+E)`,
//! mantissa at bits `[0, M)`), and this module repacks it to/from a true
//! `f32`. This resolves to explicit `to_bits`/`from_bits` conversions per
//! the REDESIGN FLAG in spec.md §9 (no type-punning union).
use kdu_base::errors::ConfigError;

fn validate(precision: u32, exponent_bits: u32) -> Result<u32, ConfigError> {
    let max_e = precision.saturating_sub(1).min(31);
    if exponent_bits < 1 || exponent_bits > max_e {
        return Err(ConfigError::InvalidExponentWidth {
            exponent_bits,
            precision
        });
    }
    Ok(precision - 1 - exponent_bits)
}

struct Geometry {
    m:          u32,
    exp_off:    i64,
    exp_max:    i64,
    pre_adjust: i64,
    mag_max:    i64
}

fn geometry(precision: u32, exponent_bits: u32) -> Result<Geometry, ConfigError> {
    let m = validate(precision, exponent_bits)?;
    let exp_off = (1i64 << (exponent_bits - 1)) - 1;
    let exp_max = core::cmp::min(254 + exp_off - 127, 2 * exp_off);
    let pre_adjust = core::cmp::max(0, exp_off - 127) << m;
    let mag_max = ((exp_max + 1) << m) - 1;
    Ok(Geometry {
        m,
        exp_off,
        exp_max,
        pre_adjust,
        mag_max
    })
}

/// Convert a `precision`-bit integer word holding a reduced-precision float
/// (sign bit at `precision - 1`, `exponent_bits`-wide exponent below it,
/// the rest mantissa) into the bit pattern of an IEEE-754 `f32`.
///
/// `signed` selects whether `raw_word`'s sign convention already has the
/// sign bit in place (`true`), or is an all-positive magnitude that first
/// needs the level-shift of step 1 to bring it into that convention
/// (`false`).
pub fn reduced_float_to_ieee_bits(
    raw_word: u32, precision: u32, exponent_bits: u32, signed: bool
) -> Result<u32, ConfigError> {
    let geo = geometry(precision, exponent_bits)?;
    let sign_mask = 1u32 << (precision - 1);
    let full_mask = if precision >= 32 {
        u32::MAX
    } else {
        (1u32 << precision) - 1
    };

    // Step 1: unsigned level shift.
    let word = if signed {
        raw_word & full_mask
    } else {
        raw_word.wrapping_add(sign_mask) & full_mask
    };

    let sign = word & sign_mask;
    let mut magnitude = (word & !sign_mask) as i64;

    // Step 2: clip to [pre_adjust, mag_max].
    magnitude = magnitude.clamp(geo.pre_adjust, geo.mag_max);
    // Step 3: subtract pre_adjust.
    magnitude -= geo.pre_adjust;

    // Step 4: align the combined exponent/mantissa field onto IEEE's.
    let shift = 23i32 - geo.m as i32;
    let ieee_mag = if shift >= 0 {
        (magnitude as u64) << shift
    } else {
        (magnitude as u64) >> (-shift)
    };

    // Step 5: reinstate the sign bit.
    let mut bits = ieee_mag as u32 & 0x7fff_ffff;
    if sign != 0 {
        bits |= 0x8000_0000;
    }
    let mut value = f32::from_bits(bits);

    // Step 6: realise denormals as normals when the source bias is tighter
    // than IEEE's.
    if geo.exp_off < 127 {
        value *= 2f32.powi((127 - geo.exp_off) as i32);
    }
    Ok(value.to_bits())
}

/// The inverse of [`reduced_float_to_ieee_bits`]: given the bit pattern of
/// an IEEE-754 `f32`, recover the `precision`-bit reduced-precision word
/// that would have produced it (spec.md §8 property 4).
pub fn ieee_bits_to_reduced_float(
    ieee_bits: u32, precision: u32, exponent_bits: u32, signed: bool
) -> Result<u32, ConfigError> {
    let geo = geometry(precision, exponent_bits)?;
    let full_mask = if precision >= 32 {
        u32::MAX
    } else {
        (1u32 << precision) - 1
    };

    let mut value = f32::from_bits(ieee_bits);
    if geo.exp_off < 127 {
        value /= 2f32.powi((127 - geo.exp_off) as i32);
    }
    let bits = value.to_bits();
    let sign = bits & 0x8000_0000;
    let ieee_mag = bits & 0x7fff_ffff;

    let shift = 23i32 - geo.m as i32;
    let mut magnitude: i64 = if shift >= 0 {
        (ieee_mag as u64 >> shift) as i64
    } else {
        ((ieee_mag as u64) << (-shift)) as i64
    };
    magnitude += geo.pre_adjust;
    magnitude = magnitude.clamp(geo.pre_adjust, geo.mag_max);

    let sign_mask = 1u32 << (precision - 1);
    let mut word = magnitude as u32 & !sign_mask;
    if sign != 0 {
        word |= sign_mask;
    }
    if !signed {
        word = word.wrapping_sub(sign_mask);
    }
    Ok(word & full_mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_round_trip_is_identity_for_representable_values() {
        // P=16, E=5 (a typical half-precision-ish split), signed source.
        for raw in [0i64, 1, -1, 100, -100, 2000, -2000] {
            let word = (raw as i64 & 0xFFFF) as u32;
            let ieee = reduced_float_to_ieee_bits(word, 16, 5, true).unwrap();
            let back = ieee_bits_to_reduced_float(ieee, 16, 5, true).unwrap();
            assert_eq!(back, word, "raw={raw}");
        }
    }

    #[test]
    fn unsigned_round_trip_is_identity_for_representable_values() {
        for word in [0u32, 1, 100, 1000, 65535] {
            let ieee = reduced_float_to_ieee_bits(word, 16, 5, false).unwrap();
            let back = ieee_bits_to_reduced_float(ieee, 16, 5, false).unwrap();
            assert_eq!(back, word);
        }
    }

    #[test]
    fn exponent_width_must_fit_precision() {
        assert!(reduced_float_to_ieee_bits(0, 8, 8, true).is_err());
        assert!(reduced_float_to_ieee_bits(0, 8, 0, true).is_err());
        assert!(reduced_float_to_ieee_bits(0, 8, 7, true).is_ok());
    }

    #[test]
    fn reduced_bias_equal_to_ieee_bias_needs_no_denormal_rescale() {
        // exp_off == 127 requires E = 9, precision >= 11.
        let word = reduced_float_to_ieee_bits(0, 12, 9, true).unwrap();
        assert_eq!(f32::from_bits(word), 0.0);
    }
}
