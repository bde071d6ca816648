//! Capability-aware dispatch table (REDESIGN FLAG, spec.md §9).
//!
//! The original chooses a SIMD kernel by macro-dispatching a function
//! pointer per lifting step during planning. Here, each [`crate::KernelId`]
//! is just an enum tag; a `Backend` is picked once, at
//! [`DeinterleaveBackend::select`] time, from [`kdu_base::options::EngineOptions`]'s
//! capability flags. Nothing downstream branches on CPU features again.
use kdu_base::options::EngineOptions;

/// Which deinterleave implementation the engine will call for the rest of
/// its lifetime. Selected once; never re-checked per line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeinterleaveBackend {
    Scalar,
    #[cfg(target_arch = "x86_64")]
    Sse2
}

impl DeinterleaveBackend {
    pub fn select(options: &EngineOptions) -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if options.use_sse2() && is_x86_feature_detected!("sse2") {
                return DeinterleaveBackend::Sse2;
            }
        }
        let _ = options;
        DeinterleaveBackend::Scalar
    }

    /// Run a 16-bit deinterleave through whichever backend was selected.
    pub fn deinterleave_16(
        self, src: &[i16], dst1: &mut [i16], dst2: &mut [i16], pairs: usize, downshift: u32
    ) {
        match self {
            DeinterleaveBackend::Scalar => {
                crate::interleave::deinterleave_16(src, dst1, dst2, pairs, downshift)
            }
            #[cfg(target_arch = "x86_64")]
            DeinterleaveBackend::Sse2 => unsafe {
                crate::interleave::sse2::deinterleave_16(src, dst1, dst2, pairs, downshift)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_options_always_select_scalar() {
        let opts = EngineOptions::new_safe();
        assert_eq!(DeinterleaveBackend::select(&opts), DeinterleaveBackend::Scalar);
    }

    #[test]
    fn selected_backend_matches_scalar_reference() {
        let opts = EngineOptions::new_fast();
        let backend = DeinterleaveBackend::select(&opts);

        let pairs = 17;
        let combined: Vec<i16> = (0..(pairs * 2) as i16).collect();
        let mut a1 = vec![0i16; pairs];
        let mut a2 = vec![0i16; pairs];
        backend.deinterleave_16(&combined, &mut a1, &mut a2, pairs, 0);

        let mut b1 = vec![0i16; pairs];
        let mut b2 = vec![0i16; pairs];
        crate::interleave::deinterleave_16(&combined, &mut b1, &mut b2, pairs, 0);

        assert_eq!(a1, b1);
        assert_eq!(a2, b2);
    }
}
