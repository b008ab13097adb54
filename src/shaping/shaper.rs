//! # Per-Mount Shaper
//!
//! The pairing a shaped mount actually owns: one [`TokenBucket`] making
//! admission decisions and one [`MountStats`] pair recording their cost.
//! Created at mount time, shared behind an `Arc` by every operation in
//! flight, freed when the mount goes away.
//!
//! The two halves never talk to each other: the caller threads the
//! bucket's verdict into the statistics after the operation completes:
//!
//! ```text
//!     caller                         MountShaper
//!     ──────                         ───────────
//!     acquire() ───────────────────► bucket
//!        │ wait_ns / DROP
//!        ▼
//!     delay or reject, do the I/O
//!        │
//!        ▼
//!     complete(dir, result, disk) ─► stats
//! ```

use super::bucket::TokenBucket;
use super::config::ShaperConfig;
use super::stats::{Direction, MountStats, StatsReport};

/// Admission control and statistics for one shaped mount.
///
/// # Example
///
/// ```rust
/// use ioshape::{Direction, MountShaper, ShaperConfig, DROP};
///
/// let shaper = MountShaper::new(ShaperConfig::iops(1_000));
///
/// let verdict = shaper.acquire();
/// if verdict == DROP {
///     // reject the operation as a shaping rejection
/// } else {
///     // delay `verdict` nanoseconds, perform the I/O, measure the disk...
/// }
/// shaper.complete(Direction::Write, verdict, 85);
/// ```
#[derive(Debug)]
pub struct MountShaper {
    bucket: TokenBucket,
    stats: MountStats,
}

impl MountShaper {
    /// Builds the bucket/stats pair from a configuration.
    ///
    /// # Panics
    ///
    /// Panics when [`ShaperConfig::validate`] fails; use
    /// [`try_new`](Self::try_new) to handle the error instead.
    pub fn new(config: ShaperConfig) -> Self {
        Self::try_new(config).expect("invalid shaper configuration")
    }

    /// Builds the bucket/stats pair, surfacing configuration errors.
    pub fn try_new(config: ShaperConfig) -> Result<Self, &'static str> {
        config.validate()?;
        Ok(Self {
            bucket: TokenBucket::new(config.rate, config.burst, config.timeout_ns()),
            stats: MountStats::new(config.weight),
        })
    }

    /// Acquires one admission slot; see [`TokenBucket::acquire`].
    #[inline]
    pub fn acquire(&self) -> u64 {
        self.bucket.acquire()
    }

    /// Records a completed operation; see [`MountStats::update`].
    #[inline]
    pub fn complete(&self, direction: Direction, shaping_result: u64, disk_latency_us: u32) {
        self.stats.update(direction, shaping_result, disk_latency_us);
    }

    /// Reconfigures rate and burst; see [`TokenBucket::set_rate`].
    pub fn set_rate(&self, rate: u16, burst: u16) {
        self.bucket.set_rate(rate, burst);
    }

    /// Reconfigures the admission timeout; see [`TokenBucket::set_timeout`].
    pub fn set_timeout(&self, timeout_ns: u64) {
        self.bucket.set_timeout(timeout_ns);
    }

    /// The admission bucket.
    #[inline]
    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    /// The statistics pair.
    #[inline]
    pub fn stats(&self) -> &MountStats {
        &self.stats
    }

    /// Snapshot of both directions' statistics.
    pub fn report(&self) -> StatsReport {
        self.stats.report()
    }
}
