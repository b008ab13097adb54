//! # Packed-Word Codecs
//!
//! Every piece of shared shaping state lives in a single 64-bit word so it
//! can be read and replaced with one atomic compare-and-swap. This module is
//! the pure, stateless layer that packs and unpacks those words.
//!
//! ## Word Layouts
//!
//! ```text
//!     bucket word (deadline state):
//!     ┌──────────────┬──────────────────────────────────────────┐
//!     │ tokens (16)  │           stamp (48, ns since epoch)     │
//!     └──────────────┴──────────────────────────────────────────┘
//!      63          48 47                                        0
//!
//!     control word (configuration):
//!     ┌──────────────────────────┬──────────────────────────────┐
//!     │        burst (32)        │   step (32, ns per token)    │
//!     └──────────────────────────┴──────────────────────────────┘
//!      63                      32 31                            0
//!
//!     latency word (EWMA pair, microseconds):
//!     ┌──────────────────────────┬──────────────────────────────┐
//!     │     disk latency (32)    │     shaping latency (32)     │
//!     └──────────────────────────┴──────────────────────────────┘
//!      63                      32 31                            0
//! ```
//!
//! Two values are reserved and never produced by normal packing:
//! - `step == 0` in the control word means shaping is disabled entirely.
//! - `stamp == 0` in the bucket word flags an epoch reset in progress.

/// Number of bits holding the deadline stamp in the bucket word.
///
/// 48 bits of nanoseconds gives roughly 78 hours of headroom before the
/// stamp must be folded back by an epoch reset.
pub(crate) const STAMP_BITS: u32 = 48;

/// Mask selecting the stamp field of a bucket word.
pub(crate) const STAMP_MASK: u64 = (1 << STAMP_BITS) - 1;

/// Number of bits holding the token step in the control word.
pub(crate) const STEP_BITS: u32 = 32;

/// Mask selecting the step field of a control word.
pub(crate) const STEP_MASK: u64 = (1 << STEP_BITS) - 1;

/// Number of bits of each latency sub-field.
pub(crate) const LATENCY_BITS: u32 = 32;

/// Mask selecting the shaping-latency field of a latency word.
pub(crate) const LATENCY_MASK: u64 = (1 << LATENCY_BITS) - 1;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Packs a token rate and burst size into a control word.
///
/// `step` is the rounded nanosecond gap between token arrivals, `1e9 / rate`.
/// The caller must not pass `rate == 0`; a disabled bucket is represented by
/// a whole-word zero, produced by [`crate::TokenBucket::set_rate`].
#[inline]
pub(crate) fn pack_control(rate: u64, burst: u64) -> u64 {
    debug_assert!(rate > 0, "rate 0 is the disabled state, not a step");
    let step = (NANOS_PER_SEC + rate / 2) / rate;
    (burst << STEP_BITS) | (step & STEP_MASK)
}

/// Nanoseconds between token arrivals. Zero means shaping is disabled.
#[inline]
pub(crate) fn control_step(control: u64) -> u64 {
    control & STEP_MASK
}

/// Maximum burst size encoded in a control word.
#[inline]
pub(crate) fn control_burst(control: u64) -> u64 {
    control >> STEP_BITS
}

/// Packs a deadline stamp and token count into a bucket word.
///
/// `stamp` is masked to its 48 bits; callers are responsible for checking
/// overflow *before* packing (an overflowing stamp must trigger an epoch
/// reset, never a silent wrap).
#[inline]
pub(crate) fn pack_bucket(stamp: u64, tokens: u64) -> u64 {
    (tokens << STAMP_BITS) | (stamp & STAMP_MASK)
}

/// Deadline stamp: ns between the epoch and the virtual finish time of the
/// last admitted operation.
#[inline]
pub(crate) fn bucket_stamp(bucket: u64) -> u64 {
    bucket & STAMP_MASK
}

/// Tokens available at the deadline.
#[inline]
pub(crate) fn bucket_tokens(bucket: u64) -> u64 {
    bucket >> STAMP_BITS
}

/// Packs the shaping/disk EWMA pair into a latency word.
#[inline]
pub(crate) fn pack_latency(shaping_us: u32, disk_us: u32) -> u64 {
    (shaping_us as u64) | ((disk_us as u64) << LATENCY_BITS)
}

/// Shaping-latency average, microseconds.
#[inline]
pub(crate) fn latency_shaping(latency: u64) -> u32 {
    (latency & LATENCY_MASK) as u32
}

/// Disk-latency average, microseconds.
#[inline]
pub(crate) fn latency_disk(latency: u64) -> u32 {
    (latency >> LATENCY_BITS) as u32
}
