//! # ioshape - Lock-Free I/O Shaping for Rust
//!
//! Per-mount I/O rate limiting ("shaping") built on a lock-free,
//! deadline-based token bucket. Many concurrent callers obtain admission
//! decisions without ever blocking on a lock in the I/O hot path, and a
//! companion lock-free running average tracks what shaping and the disk are
//! each costing.
//!
//! ## What is I/O Shaping?
//!
//! Shaping approximates a target throughput by *delaying* or *rejecting*
//! operations instead of letting them race to the device. A shaped mount
//! gets a budget, say 200 operations per second with bursts of 400, and
//! every operation asks for admission before touching the disk.
//!
//! ## The Deadline Token Bucket
//!
//! Classic token buckets make threads wait for tokens to arrive. This
//! implementation instead computes the *virtual finish time* of each
//! operation and immediately returns how long the caller should wait:
//!
//! ```text
//!     acquire() outcomes:
//!
//!     tokens available now  ──► 0            (proceed immediately)
//!     tokens ahead          ──► wait in ns   (caller delays, then proceeds)
//!     wait beyond timeout   ──► DROP         (caller rejects the operation)
//! ```
//!
//! The bucket itself never sleeps, holds no queue, and takes no lock: all
//! shared state lives in single 64-bit words updated by compare-and-swap.
//!
//! ## Quick Start
//!
//! ```rust
//! use ioshape::{Direction, MountShaper, ShaperConfig, DROP};
//!
//! // 100 IOPS sustained, bursts of 200, default 5s admission timeout.
//! let shaper = MountShaper::new(ShaperConfig::iops(100));
//!
//! let verdict = shaper.acquire();
//! if verdict == DROP {
//!     // Shaping rejection: fail the operation, do not queue it.
//! } else {
//!     if verdict > 0 {
//!         std::thread::sleep(std::time::Duration::from_nanos(verdict));
//!     }
//!     // ... perform the real I/O and measure the disk ...
//! }
//! shaper.complete(Direction::Read, verdict, 0);
//! ```
//!
//! ## Shaping a Set of Mounts
//!
//! ```rust
//! use ioshape::{MountRegistry, ShaperConfig};
//!
//! let registry = MountRegistry::new(ShaperConfig::iops(500));
//!
//! let vm01 = registry.mount("/export/vm01");
//! let scratch = registry.mount_with("/export/scratch", ShaperConfig::unlimited());
//!
//! assert_eq!(vm01.acquire(), 0);
//! assert_eq!(scratch.acquire(), 0);
//!
//! registry.unmount("/export/vm01");
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────┐
//!                    │     Filesystem shim      │  (out of scope)
//!                    └──────────┬───────────────┘
//!                               │
//!                    ┌──────────▼───────────────┐
//!                    │      MountRegistry       │  path → shaper
//!                    └──────────┬───────────────┘
//!                               │
//!                    ┌──────────▼───────────────┐
//!                    │       MountShaper        │
//!                    ├─────────────┬────────────┤
//!                    │ TokenBucket │ MountStats │
//!                    │ (admission) │   (EWMA)   │
//!                    └─────────────┴────────────┘
//! ```
//!
//! ## Thread Safety
//!
//! Every type is safe to share via `Arc` and mutate from any number of
//! threads. `acquire()`, `complete()`, `set_rate()` and `set_timeout()`
//! may all race freely; contention is resolved by CAS retry, never by
//! blocking. No ordering is guaranteed between concurrent callers; only
//! the aggregate admission rate is bounded.
//!
//! ## Scope
//!
//! The crate returns *decisions*; it never sleeps, spawns no threads, and
//! keeps no global state. Intercepting filesystem operations, honoring the
//! returned delays, and wiring up a control channel are the embedding
//! shim's job.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_op_in_unsafe_fn)]

// Internal module
mod shaping;

// Public re-exports
pub use shaping::{
    cpu_relax, now_ns, now_us, Direction, DirectionReport, MountRegistry, MountShaper, MountStats,
    RateStats, RegistryStats, ShaperConfig, StatsReport, TokenBucket, DEFAULT_TIMEOUT_NS,
    DEFAULT_WEIGHT, DROP, WEIGHT_EQUAL, WEIGHT_MASK,
};

/// A mount shaper wrapped in `Arc` for sharing with in-flight operations.
///
/// # Example
/// ```rust
/// use ioshape::{MountShaper, ShaperConfig, SharedShaper};
/// use std::sync::Arc;
///
/// let shared: SharedShaper = Arc::new(MountShaper::new(ShaperConfig::iops(100)));
/// let clone = shared.clone();
/// std::thread::spawn(move || {
///     let _ = clone.acquire();
/// });
/// ```
pub type SharedShaper = std::sync::Arc<MountShaper>;

/// A mount registry wrapped in `Arc` for sharing across threads.
pub type SharedRegistry = std::sync::Arc<MountRegistry>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
pub const MSRV: &str = "1.70.0";

/// Prelude module for convenient imports.
///
/// ```rust
/// use ioshape::prelude::*;
///
/// let shaper = MountShaper::new(ShaperConfig::iops(100));
/// let verdict = shaper.acquire();
/// shaper.complete(Direction::Write, verdict, 0);
/// ```
pub mod prelude {
    //! Common imports for typical shaping use cases.

    pub use crate::{
        Direction, MountRegistry, MountShaper, MountStats, ShaperConfig, SharedRegistry,
        SharedShaper, StatsReport, TokenBucket, DROP,
    };
}

/// Builder for creating a [`MountShaper`] with validated configuration.
///
/// A fluent wrapper over [`ShaperConfig`]; the recommended way to construct
/// a shaper with non-default settings.
///
/// # Example
///
/// ```rust
/// use ioshape::ShaperBuilder;
/// use std::time::Duration;
///
/// let shaper = ShaperBuilder::new()
///     .rate(200)
///     .burst(400)
///     .timeout(Duration::from_millis(250))
///     .build();
///
/// assert_eq!(shaper.bucket().burst(), 400);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShaperBuilder {
    config: ShaperConfig,
}

impl ShaperBuilder {
    /// Creates a builder starting from the default (unshaped)
    /// configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the admission rate in operations per second; 0 disables
    /// shaping.
    pub fn rate(mut self, rate: u16) -> Self {
        self.config.rate = rate;
        self
    }

    /// Sets the burst size; raised to the rate at construction when
    /// smaller.
    pub fn burst(mut self, burst: u16) -> Self {
        self.config.burst = burst;
        self
    }

    /// Sets the admission timeout; `Duration::ZERO` selects the 5-second
    /// default.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the statistics EWMA weight.
    pub fn weight(mut self, weight: u32) -> Self {
        self.config.weight = weight;
        self
    }

    /// Builds the shaper.
    ///
    /// # Panics
    ///
    /// Panics on a configuration [`ShaperConfig::validate`] rejects; use
    /// [`try_build`](Self::try_build) to handle errors.
    pub fn build(self) -> MountShaper {
        MountShaper::new(self.config)
    }

    /// Builds the shaper, surfacing configuration errors.
    pub fn try_build(self) -> Result<MountShaper, &'static str> {
        MountShaper::try_new(self.config)
    }
}
