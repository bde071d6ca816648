//! Engine-wide configuration.
//!
//! `EngineFlags` is the capability set a dispatch table in `kdu-dwt` reads:
//! every SIMD back-end is gated by a flag here, chosen once when an
//! `EngineOptions` is built, rather than branched on per lifting step.
//! Modeled on `zune_core::options::decoder::DecoderFlags`.
use bitflags::bitflags;

bitflags! {
    /// Capability flags that gate which accelerated code paths the dispatch
    /// table in `kdu-dwt` is allowed to select.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct EngineFlags: u8 {
        /// Allow use of `unsafe` platform-specific intrinsics at all. Disabling
        /// this also disables every flag below it, regardless of their value.
        const USE_UNSAFE = 0b0000_0001;
        /// Whether we should use SSE2.
        const USE_SSE2   = 0b0000_0010;
        /// Whether we should use SSSE3.
        const USE_SSSE3  = 0b0000_0100;
        /// Whether we should use AVX2.
        const USE_AVX2   = 0b0000_1000;
        /// Whether we should use NEON.
        const USE_NEON   = 0b0001_0000;
    }
}

fn safe_flags() -> EngineFlags {
    EngineFlags::empty()
}

fn fast_flags() -> EngineFlags {
    EngineFlags::all()
}

impl Default for EngineFlags {
    fn default() -> Self {
        fast_flags()
    }
}

/// Options threaded through the DWT engine and the sample-transfer layer.
#[derive(Copy, Clone, Debug)]
pub struct EngineOptions {
    flags: EngineFlags
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            flags: EngineFlags::default()
        }
    }
}

impl EngineOptions {
    /// All intrinsics disabled; every kernel runs its scalar reference path.
    /// Useful for differential testing against the accelerated paths.
    pub fn new_safe() -> Self {
        EngineOptions {
            flags: safe_flags()
        }
    }

    /// Every compiled-in intrinsic enabled.
    pub fn new_fast() -> Self {
        EngineOptions {
            flags: fast_flags()
        }
    }

    pub fn flags(&self) -> EngineFlags {
        self.flags
    }

    pub fn set_flags(mut self, flags: EngineFlags) -> Self {
        self.flags = flags;
        self
    }

    /// True if `unsafe` intrinsics may be used at all, the gate every other
    /// capability flag below is conditioned on.
    pub const fn use_unsafe(&self) -> bool {
        self.flags.contains(EngineFlags::USE_UNSAFE)
    }

    pub fn use_sse2(&self) -> bool {
        self.flags.contains(EngineFlags::USE_UNSAFE | EngineFlags::USE_SSE2)
    }

    pub fn use_ssse3(&self) -> bool {
        self.flags.contains(EngineFlags::USE_UNSAFE | EngineFlags::USE_SSSE3)
    }

    pub fn use_avx2(&self) -> bool {
        self.flags.contains(EngineFlags::USE_UNSAFE | EngineFlags::USE_AVX2)
    }

    pub fn use_neon(&self) -> bool {
        self.flags.contains(EngineFlags::USE_UNSAFE | EngineFlags::USE_NEON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_options_disable_every_intrinsic() {
        let opts = EngineOptions::new_safe();
        assert!(!opts.use_sse2());
        assert!(!opts.use_avx2());
        assert!(!opts.use_neon());
    }

    #[test]
    fn use_unsafe_gates_every_other_flag() {
        let opts = EngineOptions::default().set_flags(EngineFlags::default() & !EngineFlags::USE_UNSAFE);
        assert!(!opts.use_sse2());
        assert!(!opts.use_avx2());
    }
}
