//! # Shaper Configuration
//!
//! Construction parameters for a shaped mount: the admission rate and burst
//! for the token bucket, the admission timeout, and the EWMA weight for the
//! statistics pair.
//!
//! ```text
//!     ShaperConfig {
//!         rate: 200,                     ← operations per second (0 = off)
//!         burst: 400,                    ← back-to-back admissions allowed
//!         timeout: 5s,                   ← longest tolerated shaping delay
//!         weight: 20% of full scale,     ← statistics responsiveness
//!     }
//! ```
//!
//! Rate and burst are deliberately 16-bit: the packed control word reserves
//! more room, but per-mount I/O shaping has no use for rates above 65535/s
//! and the narrow types make misconfiguration unrepresentable.

use std::time::Duration;

use super::codec;
use super::stats::DEFAULT_WEIGHT;

/// Configuration for one shaped mount.
///
/// # Examples
///
/// ```rust
/// use ioshape::ShaperConfig;
/// use std::time::Duration;
///
/// // 100 IOPS sustained, bursts of 200, rejections after 250ms of backlog.
/// let config = ShaperConfig::iops(100).with_timeout(Duration::from_millis(250));
/// assert!(config.validate().is_ok());
///
/// // No shaping at all; statistics still collected.
/// let passthrough = ShaperConfig::unlimited();
/// assert_eq!(passthrough.rate, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaperConfig {
    /// Admission rate in operations per second; 0 disables shaping.
    pub rate: u16,

    /// Maximum burst size in operations. Raised to `rate` at construction
    /// when smaller, so one second of credit always fits.
    pub burst: u16,

    /// Longest shaping delay tolerated before an operation is rejected.
    /// `Duration::ZERO` selects the 5-second default.
    pub timeout: Duration,

    /// EWMA weight shared by the read and write statistics: 0 freezes the
    /// averages, `2^31` weighs old and new equally, `u32::MAX` tracks the
    /// newest sample.
    pub weight: u32,
}

impl Default for ShaperConfig {
    /// Shaping disabled, default timeout, stability-favoring weight.
    fn default() -> Self {
        Self {
            rate: 0,
            burst: 0,
            timeout: Duration::ZERO,
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl ShaperConfig {
    /// Creates a config with an explicit rate and burst.
    pub fn new(rate: u16, burst: u16) -> Self {
        Self {
            rate,
            burst,
            ..Default::default()
        }
    }

    /// Creates a config admitting `rate` operations per second with a burst
    /// of twice that, the usual headroom for bursty I/O.
    pub fn iops(rate: u16) -> Self {
        Self {
            rate,
            burst: rate.saturating_mul(2),
            ..Default::default()
        }
    }

    /// Creates a config that never delays or rejects anything.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Sets the burst size.
    pub fn with_burst(mut self, burst: u16) -> Self {
        self.burst = burst;
        self
    }

    /// Sets the admission timeout; `Duration::ZERO` selects the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the statistics EWMA weight.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// The timeout in nanoseconds, saturating on absurd durations.
    pub fn timeout_ns(&self) -> u64 {
        u64::try_from(self.timeout.as_nanos()).unwrap_or(u64::MAX)
    }

    /// The burst the bucket will actually use.
    pub fn effective_burst(&self) -> u16 {
        if self.rate > 0 {
            self.burst.max(self.rate)
        } else {
            self.burst
        }
    }

    /// Checks the configuration for values the shaping core cannot honor.
    ///
    /// # Errors
    ///
    /// A timeout beyond the 48-bit deadline horizon (about 78 hours) can
    /// never admit the waits it promises to tolerate and is rejected.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.timeout_ns() > codec::STAMP_MASK {
            return Err("timeout exceeds the deadline horizon (about 78 hours)");
        }
        Ok(())
    }
}
