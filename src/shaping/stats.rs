//! # Shaping Statistics
//!
//! Per-mount, per-direction counters answering two questions: how often is
//! shaping interfering (delays, drops), and how much latency are shaping and
//! the disk each contributing (exponentially-weighted running averages).
//!
//! ```text
//!     One MountStats per shaped mount:
//!
//!     ┌──────────── read ────────────┐ ┌─────────── write ────────────┐
//!     │ delays  drops                │ │ delays  drops                │
//!     │ latency word (EWMA pair)     │ │ latency word (EWMA pair)     │
//!     └──────────────────────────────┘ └──────────────────────────────┘
//!                        shared weight (set once)
//! ```
//!
//! Counters are plain atomic increments. The latency pair shares one 64-bit
//! word updated through the same snapshot/CAS/retry discipline as the token
//! bucket, so both averages always move together and no reader ever sees a
//! half-updated pair.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::bucket::DROP;
use super::clock::cpu_relax;
use super::codec;

/// Full scale of the EWMA weight: `2^32 - 1`.
pub const WEIGHT_MASK: u64 = (1 << 32) - 1;

/// Weight giving old average and new sample equal influence.
pub const WEIGHT_EQUAL: u32 = 1 << 31;

/// Default weight: 20% of full scale, favoring long-term stability.
pub const DEFAULT_WEIGHT: u32 = ((WEIGHT_MASK * 20) / 100) as u32;

/// I/O direction a statistics sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Read-side statistics.
    Read,
    /// Write-side statistics.
    Write,
}

impl Direction {
    #[inline]
    fn index(self) -> usize {
        match self {
            Direction::Read => 0,
            Direction::Write => 1,
        }
    }
}

/// Weighted average step.
///
/// `new = (old * (WEIGHT_MASK - weight) + sample * weight) >> 32`. Computed
/// with wrapping arithmetic: drop-sized samples overflow 64 bits by design
/// and fold, exactly like the unsigned arithmetic this average came from.
#[inline]
fn ewma(weight: u32, old: u32, sample: u64) -> u32 {
    let keep = WEIGHT_MASK - weight as u64;
    ((old as u64)
        .wrapping_mul(keep)
        .wrapping_add(sample.wrapping_mul(weight as u64))
        >> 32) as u32
}

/// Lock-free shaping counters for a single I/O direction.
///
/// Mutated concurrently by every operation on the mount; read at any time
/// through the plain accessors.
#[derive(Debug, Default)]
pub struct RateStats {
    /// Operations delayed (or dropped) by shaping.
    delays: AtomicU32,
    /// Operations rejected outright by shaping.
    drops: AtomicU32,
    /// Packed `(disk, shaping)` EWMA pair, microseconds.
    latency: AtomicU64,
}

impl RateStats {
    fn new() -> Self {
        Self::default()
    }

    /// Folds one completed operation into this direction's statistics.
    ///
    /// `shaping_result` is the raw value returned by
    /// [`TokenBucket::acquire`](crate::TokenBucket::acquire): a wait in
    /// nanoseconds or [`DROP`]. A drop increments *both* counters (it is a
    /// nonzero shaping outcome as well as a rejection), and its sentinel
    /// magnitude flows into the shaping average unfiltered.
    ///
    /// The shaping sample is converted from nanoseconds to roughly
    /// microseconds by `>> 10`; dividing by 1024 instead of 1000 is a
    /// deliberate cheap approximation.
    pub fn update(&self, weight: u32, shaping_result: u64, disk_latency_us: u32) {
        if shaping_result == DROP {
            self.drops.fetch_add(1, Ordering::Relaxed);
        }
        if shaping_result != 0 {
            self.delays.fetch_add(1, Ordering::Relaxed);
        }

        // Weight zero freezes the averages; only the counters move.
        if weight == 0 {
            return;
        }

        let shaping_sample = shaping_result >> 10;
        let mut current = self.latency.load(Ordering::Relaxed);
        loop {
            let shaping_avg = ewma(weight, codec::latency_shaping(current), shaping_sample);
            let disk_avg = ewma(weight, codec::latency_disk(current), disk_latency_us as u64);
            match self.latency.compare_exchange_weak(
                current,
                codec::pack_latency(shaping_avg, disk_avg),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => {
                    current = actual;
                    cpu_relax();
                }
            }
        }
    }

    /// Number of operations shaping delayed or dropped.
    #[inline]
    pub fn delays(&self) -> u32 {
        self.delays.load(Ordering::Relaxed)
    }

    /// Number of operations shaping rejected.
    #[inline]
    pub fn drops(&self) -> u32 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Average shaping latency, microseconds.
    #[inline]
    pub fn shaping_latency_us(&self) -> u32 {
        codec::latency_shaping(self.latency.load(Ordering::Relaxed))
    }

    /// Average disk latency, microseconds.
    #[inline]
    pub fn disk_latency_us(&self) -> u32 {
        codec::latency_disk(self.latency.load(Ordering::Relaxed))
    }

    fn report(&self) -> DirectionReport {
        let latency = self.latency.load(Ordering::Relaxed);
        DirectionReport {
            delays: self.delays(),
            drops: self.drops(),
            shaping_latency_us: codec::latency_shaping(latency),
            disk_latency_us: codec::latency_disk(latency),
        }
    }
}

/// Read/write statistics pair for one mount, sharing a single EWMA weight.
///
/// # Example
///
/// ```rust
/// use ioshape::{Direction, MountStats, WEIGHT_EQUAL};
///
/// let stats = MountStats::new(WEIGHT_EQUAL);
///
/// // After each operation: the shaping result and the measured disk time.
/// stats.update(Direction::Read, 250_000, 180);
///
/// assert_eq!(stats.read().delays(), 1);
/// assert_eq!(stats.write().delays(), 0);
/// ```
#[derive(Debug)]
pub struct MountStats {
    directions: [RateStats; 2],
    weight: u32,
}

impl MountStats {
    /// Creates a zeroed statistics pair with the given EWMA weight.
    ///
    /// The weight is fixed for the lifetime of the pair: 0 freezes the
    /// averages, [`WEIGHT_EQUAL`] balances old and new, `u32::MAX` tracks
    /// the newest sample almost exclusively. Use the same weight scale
    /// consistently when comparing mounts.
    pub fn new(weight: u32) -> Self {
        Self {
            directions: [RateStats::new(), RateStats::new()],
            weight,
        }
    }

    /// Folds one completed operation into the given direction.
    #[inline]
    pub fn update(&self, direction: Direction, shaping_result: u64, disk_latency_us: u32) {
        self.directions[direction.index()].update(self.weight, shaping_result, disk_latency_us);
    }

    /// Statistics for one direction.
    #[inline]
    pub fn direction(&self, direction: Direction) -> &RateStats {
        &self.directions[direction.index()]
    }

    /// Read-side statistics.
    #[inline]
    pub fn read(&self) -> &RateStats {
        self.direction(Direction::Read)
    }

    /// Write-side statistics.
    #[inline]
    pub fn write(&self) -> &RateStats {
        self.direction(Direction::Write)
    }

    /// The shared EWMA weight.
    #[inline]
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Consistent-enough snapshot of both directions for reporting.
    pub fn report(&self) -> StatsReport {
        StatsReport {
            read: self.directions[0].report(),
            write: self.directions[1].report(),
        }
    }
}

/// Point-in-time snapshot of one direction's statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionReport {
    /// Operations delayed or dropped by shaping.
    pub delays: u32,
    /// Operations rejected by shaping.
    pub drops: u32,
    /// Average shaping latency, microseconds.
    pub shaping_latency_us: u32,
    /// Average disk latency, microseconds.
    pub disk_latency_us: u32,
}

/// Point-in-time snapshot of a mount's statistics, both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsReport {
    /// Read-side snapshot.
    pub read: DirectionReport,
    /// Write-side snapshot.
    pub write: DirectionReport,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shaping stats:\n\
             ├─ read:  {} delayed, {} dropped, shaping {}us, disk {}us\n\
             └─ write: {} delayed, {} dropped, shaping {}us, disk {}us",
            self.read.delays,
            self.read.drops,
            self.read.shaping_latency_us,
            self.read.disk_latency_us,
            self.write.delays,
            self.write.drops,
            self.write.shaping_latency_us,
            self.write.disk_latency_us,
        )
    }
}
