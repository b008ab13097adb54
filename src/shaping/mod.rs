//! # Shaping Module
//!
//! Internal implementation of the I/O shaping core and its mount-facing
//! surface.
//!
//! ## Module Structure
//!
//! ```text
//!     shaping/
//!     ├── mod.rs       (You are here - module organization)
//!     ├── codec.rs     (packed-word encode/decode, the leaf everything uses)
//!     ├── bucket.rs    (lock-free deadline token bucket)
//!     ├── stats.rs     (EWMA delay/drop/latency statistics)
//!     ├── config.rs    (construction parameters and validation)
//!     ├── shaper.rs    (bucket + stats pairing for one mount)
//!     ├── registry.rs  (concurrent path → shaper registry)
//!     └── clock.rs     (monotonic ns clock, cache/CPU helpers)
//! ```
//!
//! ## Dependency Flow
//!
//! ```text
//!     registry ──► shaper ──► bucket ──► codec
//!                    │          │          ▲
//!                    └──► stats ┴──────────┘
//!                               └──► clock
//! ```
//!
//! `bucket` and `stats` are deliberately independent of each other: the
//! caller carries the bucket's verdict into the statistics.

mod bucket;
mod clock;
mod codec;
mod config;
mod registry;
mod shaper;
mod stats;

/// Lock-free deadline token bucket and its admission constants.
pub use bucket::{TokenBucket, DEFAULT_TIMEOUT_NS, DROP};

/// Monotonic clock and spin helpers.
pub use clock::{cpu_relax, now_ns, now_us};

/// Construction parameters for a shaped mount.
pub use config::ShaperConfig;

/// Concurrent mount lifecycle surface.
pub use registry::{MountRegistry, RegistryStats};

/// Per-mount bucket/statistics pairing.
pub use shaper::MountShaper;

/// EWMA statistics and their weight scale.
pub use stats::{
    Direction, DirectionReport, MountStats, RateStats, StatsReport, DEFAULT_WEIGHT, WEIGHT_EQUAL,
    WEIGHT_MASK,
};
