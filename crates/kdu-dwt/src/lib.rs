//! Reversible (5/3) and irreversible (9/7) DWT lifting-step engine (spec.md
//! §4.3-4.4, components C3 and C4), plus the multi-resolution
//! analysis/synthesis loop that sequences them (spec.md §2).
pub mod dispatch;
pub mod engine;
pub mod interleave;
pub mod lifting;
pub mod step;

pub use kdu_base::sample_buffer::{LineBuffer, ALIGN};
pub use step::{Direction, KernelId, LiftingStep};
