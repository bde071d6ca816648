//! The consumer-facing `SampleTransform` handle (spec.md §6): `forward`/
//! `inverse` over a whole [`LineBuffer`], sitting next to
//! [`kdu_imageio::LineSink`]'s `put`/`close` as the two polymorphic handles
//! external collaborators wrap the core with.
//!
//! The concrete instance here realises spec.md §4.5's float
//! re-interpretation (component C5): `forward` repacks an absolute-integer
//! line's bit pattern into IEEE-754 singles in place, `inverse` undoes it.
//! Other transfer directions (C6's clip/scale/shift) are one-shot and
//! per-sample rather than line-wide in-place rewrites, so they are exposed
//! as the free function [`crate::transfer_sample`] instead of through this
//! trait.
use kdu_base::errors::ConfigError;
use kdu_base::sample_buffer::LineBuffer;

use crate::float_reinterp::{ieee_bits_to_reduced_float, reduced_float_to_ieee_bits};

/// A reversible, in-place transform over one [`LineBuffer`] (spec.md §6).
pub trait SampleTransform {
    /// Encode: integer line samples become re-interpreted float bit patterns.
    fn forward(&self, line: &mut LineBuffer) -> Result<(), ConfigError>;
    /// Decode: the inverse of [`Self::forward`].
    fn inverse(&self, line: &mut LineBuffer) -> Result<(), ConfigError>;
}

/// Bit-exact repack between an absolute-integer [`LineBuffer`] and IEEE-754
/// singles, with `E` exponent bits and `P - 1 - E` mantissa bits (spec.md
/// §4.5). Construction validates the exponent width eagerly, matching
/// spec.md §7's "ConfigError ... raised at the first opportunity".
#[derive(Copy, Clone, Debug)]
pub struct FloatReinterpretTransform {
    precision:     u32,
    exponent_bits: u32,
    signed:        bool
}

impl FloatReinterpretTransform {
    pub fn new(precision: u32, exponent_bits: u32, signed: bool) -> Result<Self, ConfigError> {
        if signed && precision < 2 {
            return Err(ConfigError::SignedFloatPrecisionTooLow { precision });
        }
        let max_e = precision.saturating_sub(1).min(31);
        if exponent_bits < 1 || exponent_bits > max_e {
            return Err(ConfigError::InvalidExponentWidth {
                exponent_bits,
                precision
            });
        }
        Ok(FloatReinterpretTransform {
            precision,
            exponent_bits,
            signed
        })
    }
}

impl SampleTransform for FloatReinterpretTransform {
    fn forward(&self, line: &mut LineBuffer) -> Result<(), ConfigError> {
        if !line.is_absolute() {
            return Err(ConfigError::NotAbsoluteInteger);
        }
        for sample in line.valid_i32_mut() {
            let bits = reduced_float_to_ieee_bits(*sample as u32, self.precision, self.exponent_bits, self.signed)?;
            *sample = bits as i32;
        }
        Ok(())
    }

    fn inverse(&self, line: &mut LineBuffer) -> Result<(), ConfigError> {
        for sample in line.valid_i32_mut() {
            let word = ieee_bits_to_reduced_float(*sample as u32, self.precision, self.exponent_bits, self.signed)?;
            *sample = word as i32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kdu_base::precision::Precision;
    use kdu_base::sample_buffer::SampleKind;

    use super::*;

    fn line(values: &[i32]) -> LineBuffer {
        let mut buf = LineBuffer::new(SampleKind::I32, values.len(), 0, true, Precision::new(16));
        buf.valid_i32_mut().copy_from_slice(values);
        buf
    }

    #[test]
    fn forward_then_inverse_is_identity_on_absolute_lines() {
        let transform = FloatReinterpretTransform::new(16, 5, true).unwrap();
        let mut buf = line(&[0, 1, -1, 100, -100, 2000]);
        let original = buf.valid_i32().to_vec();

        transform.forward(&mut buf).unwrap();
        transform.inverse(&mut buf).unwrap();

        assert_eq!(buf.valid_i32(), original.as_slice());
    }

    #[test]
    fn forward_rejects_non_absolute_lines() {
        let transform = FloatReinterpretTransform::new(16, 5, true).unwrap();
        let mut buf = LineBuffer::new(SampleKind::I32, 1, 0, false, Precision::new(16));
        assert_eq!(transform.forward(&mut buf), Err(ConfigError::NotAbsoluteInteger));
    }

    #[test]
    fn construction_validates_exponent_width_eagerly() {
        assert!(FloatReinterpretTransform::new(8, 8, true).is_err());
        assert!(FloatReinterpretTransform::new(8, 0, true).is_err());
    }
}
