//! # Monotonic Clock & CPU Helpers
//!
//! Time for the shaping core comes from a single monotonic nanosecond clock
//! anchored at first use. Deadline stamps are *relative* (ns since a bucket's
//! epoch), so the absolute origin does not matter; what matters is that the
//! clock never runs backwards, which `std::time::Instant` guarantees.
//!
//! Also home to the small platform helpers the CAS retry loops lean on:
//! cache-line alignment to keep hot atomics from false sharing, and a CPU
//! relaxation hint for spins.

use std::sync::OnceLock;
use std::time::Instant;

// Anchor captured on the first call; all timestamps are elapsed ns since.
static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Current monotonic time in nanoseconds since the process anchor.
///
/// The first caller pins the anchor; every bucket epoch and deadline stamp
/// is derived from this one timeline.
#[inline(always)]
pub fn now_ns() -> u64 {
    ANCHOR.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Current monotonic time in microseconds since the process anchor.
///
/// Convenience for callers measuring disk latency around an I/O operation:
///
/// ```rust
/// use ioshape::now_us;
///
/// let start = now_us();
/// // ... the real I/O ...
/// let disk_latency_us = (now_us() - start) as u32;
/// ```
#[inline(always)]
pub fn now_us() -> u64 {
    now_ns() / 1_000
}

// Cache-line alignment per architecture; false sharing between the bucket
// and epoch words would put a CAS-invalidated line under every reader.

/// Cache-aligned wrapper keeping a hot atomic on its own cache line.
#[cfg(target_arch = "x86_64")]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(pub(crate) T);
#[cfg(target_arch = "aarch64")]
#[repr(C, align(128))]
pub(crate) struct CacheAligned<T>(pub(crate) T);
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(pub(crate) T);

impl<T> CacheAligned<T> {
    #[inline(always)]
    pub(crate) const fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CacheAligned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// CPU relaxation hint for CAS retry spins.
///
/// PAUSE on x86_64, YIELD-equivalent spin hints elsewhere. Retries in the
/// shaping core are expected contention, not errors; relaxing between them
/// lets the winning core publish before the loser re-reads.
#[inline(always)]
pub fn cpu_relax() {
    #[cfg(target_arch = "x86_64")]
    {
        #[cfg(any(target_feature = "sse2", target_feature = "sse"))]
        unsafe {
            std::arch::x86_64::_mm_pause();
        }
        #[cfg(not(any(target_feature = "sse2", target_feature = "sse")))]
        {
            std::hint::spin_loop();
        }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        std::hint::spin_loop();
    }
}
