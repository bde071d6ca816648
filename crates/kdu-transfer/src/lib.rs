//! Float re-interpretation (spec.md §4.5, component C5) and sample transfer
//! (spec.md §4.6, component C6): the layer that turns decoded wavelet line
//! buffers into packed output samples at a caller-chosen precision,
//! signedness, alignment mode, and byte order.
//!
//! Unlike `kdu-base`, this crate always links `std`: the conversion recipes
//! in spec.md §4.5/§4.6 rest on floating-point transcendental functions
//! (`powi`) that `core` alone does not provide.

pub mod float_reinterp;
pub mod sample_transform;
pub mod transfer;

pub use float_reinterp::{ieee_bits_to_reduced_float, reduced_float_to_ieee_bits};
pub use sample_transform::{FloatReinterpretTransform, SampleTransform};
pub use transfer::{AlignMode, DestWidth, SourceValue, TransferParams, transfer_sample};
