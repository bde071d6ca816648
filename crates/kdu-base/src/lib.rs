//! Core vocabulary shared by every `kdu` crate.
//!
//! This crate provides:
//!
//! - Precision and element-kind types used by line buffers and lifting steps
//! - Fixed-point arithmetic primitives (rounded shifts, saturating packs, byte swap)
//! - The `LineBuffer` sample-buffer model
//! - Capability-aware engine options, mirroring how decoder/encoder options
//!   gate platform intrinsics elsewhere in this family of crates
//! - A `log`-or-noop macro facade so downstream crates never hard depend on
//!   a logging backend
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

#[cfg(not(feature = "log"))]
pub mod log;
#[cfg(feature = "log")]
pub use log;

pub mod colour;
pub mod errors;
pub mod fixed_point;
pub mod options;
pub mod precision;
pub mod sample_buffer;

pub mod bytestream;
