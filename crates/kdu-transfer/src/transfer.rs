//! Sample transfer: precision, sign, alignment-mode and bit-packing control
//! between source line-buffer samples and packed output words (spec.md
//! §4.6, component C6, Tables A and B).
use kdu_base::errors::ConfigError;
use kdu_base::precision::{Precision, KDU_FIX_POINT};

/// Whether a `P`-bit sample's bits occupy the most- or least-significant
/// positions of the storage word (spec.md glossary).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AlignMode {
    Msb,
    Lsb
}

/// Whether the packed value is destined for a single output byte or a
/// wider integer word; selects which row of spec.md §4.6's shift rule
/// applies.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DestWidth {
    Byte,
    Wide
}

/// The source representation a sample is being transferred from.
#[derive(Copy, Clone, Debug)]
pub enum SourceValue {
    /// A 16-bit fixed-point fraction with an implicit `KDU_FIX_POINT`
    /// binary point (`LineBuffer::is_absolute() == false`).
    Int16Fixed(i32),
    /// An exact integer magnitude at `original_precision` bits.
    Int(i64),
    /// A true (or re-interpreted, per [`crate::float_reinterp`]) IEEE float,
    /// nominally in `[-0.5, 0.5)`.
    Float(f32)
}

/// Parameters that drive clipping, scaling, and shifting for one transfer.
#[derive(Copy, Clone, Debug)]
pub struct TransferParams {
    /// Target output precision `P`.
    pub precision:          Precision,
    /// Original/native precision of the source samples `B`.
    pub original_precision: Precision,
    pub signed:             bool,
    pub align:              AlignMode
}

impl TransferParams {
    fn p(&self) -> u32 {
        self.precision.get()
    }

    fn b(&self) -> u32 {
        self.original_precision.get()
    }

    fn min_pb(&self) -> u32 {
        self.p().min(self.b())
    }

    /// Table A: clipping bounds `[x_min, x_max]`.
    fn clip_bounds(&self) -> (f64, f64) {
        let (p, b) = (self.p() as i32, self.b() as i32);
        match self.align {
            AlignMode::Msb => {
                let min_pb = self.min_pb() as i32;
                (-0.5, 0.5 - 2f64.powi(-min_pb))
            }
            AlignMode::Lsb if self.signed => {
                let scale = 2f64.powi(p - b);
                (-0.5 * scale, 0.5 * scale - 2f64.powi(-b))
            }
            AlignMode::Lsb => {
                let scale = 2f64.powi(p - b);
                (-0.5, scale - 0.5 - 2f64.powi(-b))
            }
        }
    }

    /// Table B: scale `alpha` and bias `beta`.
    fn scale_bias(&self, value: &SourceValue) -> (f64, f64) {
        match (value, self.align) {
            (SourceValue::Float(_), AlignMode::Msb) => {
                let alpha = 2f64.powi(self.min_pb() as i32);
                (alpha, if self.signed { 0.0 } else { 0.5 * alpha })
            }
            (SourceValue::Float(_), AlignMode::Lsb) => {
                let alpha = 2f64.powi(self.b() as i32);
                (alpha, if self.signed { 0.0 } else { 0.5 * alpha })
            }
            (SourceValue::Int16Fixed(_), _) => {
                let alpha = 2f64.powi(KDU_FIX_POINT as i32);
                (alpha, if self.signed { 0.0 } else { 2f64.powi(KDU_FIX_POINT as i32 - 1) })
            }
            (SourceValue::Int(_), _) => {
                let n = self.b() as i32;
                let alpha = 2f64.powi(n);
                (alpha, if self.signed { 0.0 } else { 2f64.powi(n - 1) })
            }
        }
    }

    /// spec.md §4.6 item 3's shift rule: `S` for byte output depends on
    /// alignment mode; for wide (multi-byte integer) output it is zero in
    /// lsb mode and `P - min(P,B)` in msb mode.
    fn shift(&self, dest: DestWidth) -> i32 {
        match (self.align, dest) {
            (AlignMode::Msb, DestWidth::Byte) => 8 - self.min_pb() as i32,
            (AlignMode::Lsb, DestWidth::Byte) => 8 - self.p() as i32,
            (AlignMode::Lsb, DestWidth::Wide) => 0,
            (AlignMode::Msb, DestWidth::Wide) => self.p() as i32 - self.min_pb() as i32
        }
    }

    /// Normalise a [`SourceValue`] to the nominal `f64` domain the clip
    /// bounds are expressed in: a signed fraction of full scale, centred on
    /// zero.
    ///
    /// `Int16Fixed` and `Float` line-buffer samples are already centred
    /// signed quantities by construction (spec.md §3's DC level shift keeps
    /// unsigned components centred for the whole DWT pipeline). A plain
    /// `Int` sample, though, is the caller-facing exact magnitude — for an
    /// unsigned component this transfer layer is itself the point where the
    /// inverse DC level shift is undone, so the centring subtraction has to
    /// happen here before the fraction is formed.
    fn as_f64(&self, value: SourceValue) -> f64 {
        match value {
            SourceValue::Int16Fixed(v) => v as f64 / 2f64.powi(KDU_FIX_POINT as i32),
            SourceValue::Int(v) => {
                let centred = if self.signed {
                    v as f64
                } else {
                    v as f64 - 2f64.powi(self.b() as i32 - 1)
                };
                centred / 2f64.powi(self.b() as i32)
            }
            SourceValue::Float(v) => v as f64
        }
    }
}

/// Transfer one sample through clipping, scale/bias, and shift, returning
/// the packed target value `y << S` (spec.md §4.6 steps 1-3).
pub fn transfer_sample(value: SourceValue, params: &TransferParams, dest: DestWidth) -> Result<i64, ConfigError> {
    if params.signed && params.p() < 2 {
        return Err(ConfigError::SignedFloatPrecisionTooLow { precision: params.p() });
    }
    let (x_min, x_max) = params.clip_bounds();
    let x = params.as_f64(value).clamp(x_min, x_max);
    let (alpha, beta) = params.scale_bias(&value);
    let y = (alpha * x + beta).round() as i64;
    let shift = params.shift(dest);
    Ok(if shift >= 0 { y << shift } else { y >> (-shift) })
}
