//! # Deadline Token Bucket
//!
//! This module implements the admission-control core: a token bucket that
//! never blocks and never takes a lock. Instead of making threads wait for
//! discrete token arrivals, it computes the *virtual finish time* of each
//! operation, its deadline, and hands the wait back to the caller.
//!
//! ```text
//!     Deadline variant of the token bucket:
//!
//!     tokens available at deadline?          wait returned
//!     ┌────────────────────────────┐
//!     │ deadline in the past       │  take a token, deadline = now    0
//!     │ deadline ahead, tokens > 0 │  take a token, keep deadline     d
//!     │ deadline ahead, tokens = 0 │  deadline += step                d'
//!     │ wait would exceed timeout  │  reject, publish nothing         DROP
//!     └────────────────────────────┘
//! ```
//!
//! ## Shared State
//!
//! All mutable state is two 64-bit atomic words:
//!
//! - `bucket` packs `(stamp, tokens)`: the deadline and the tokens left at
//!   that deadline.
//! - `epoch` is the absolute monotonic origin the stamp is relative to,
//!   folded forward whenever the 48-bit stamp would overflow.
//!
//! Every mutation is a compare-and-swap against a full snapshot; a failed
//! CAS discards all local computation and re-reads. The single exception is
//! the epoch-reset winner's unconditional bucket store, described at the
//! reset path below.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::clock::{self, CacheAligned};
use super::codec;

/// Sentinel returned by [`TokenBucket::acquire`] when the computed wait
/// exceeds the configured timeout: the operation must be rejected rather
/// than delayed. Unambiguous against any legal wait, which is bounded by
/// the timeout and thus far below this magnitude.
pub const DROP: u64 = u64::MAX;

/// Default admission timeout: 5 seconds, in nanoseconds.
pub const DEFAULT_TIMEOUT_NS: u64 = 5_000_000_000;

/// Lock-free deadline-based token bucket, one per shaped mount.
///
/// `acquire()` returns how long the caller should delay the operation (in
/// nanoseconds, possibly zero), or [`DROP`] when the delay would exceed the
/// timeout. The bucket itself never sleeps and holds no queue; whether to
/// actually wait is entirely the caller's decision.
///
/// # Example
///
/// ```rust
/// use ioshape::{TokenBucket, DROP};
///
/// // 100 operations/sec, bursts of up to 200, default timeout.
/// let bucket = TokenBucket::new(100, 200, 0);
///
/// match bucket.acquire() {
///     DROP => { /* shaping rejection: fail the operation */ }
///     0 => { /* issue the I/O immediately */ }
///     wait_ns => { /* delay wait_ns, then issue the I/O */ let _ = wait_ns; }
/// }
/// ```
///
/// # Concurrency
///
/// Any number of threads may call [`acquire`](Self::acquire),
/// [`set_rate`](Self::set_rate) and [`set_timeout`](Self::set_timeout)
/// concurrently. Configuration lives in its own words, so a racing reader
/// observes at most one stale decision, never a torn value.
#[derive(Debug)]
pub struct TokenBucket {
    /// Packed `(stamp, tokens)`; the hot CAS word, alone on its cache line.
    bucket: CacheAligned<AtomicU64>,
    /// Monotonic origin (ns) the stamp is relative to.
    epoch: CacheAligned<AtomicU64>,
    /// Packed `(burst, step)`; read without CAS, staleness is benign.
    control: AtomicU64,
    /// Maximum tolerable wait (ns) before admission is refused.
    timeout: AtomicU64,
}

impl TokenBucket {
    /// Creates a bucket admitting `rate` operations per second with bursts
    /// of up to `burst` operations.
    ///
    /// `rate == 0` disables shaping (every acquire returns 0). A `burst`
    /// below a nonzero `rate` is raised to `rate`, so one second of credit
    /// always fits. `timeout_ns == 0` selects [`DEFAULT_TIMEOUT_NS`].
    ///
    /// The bucket starts full, with its deadline stamp at 1; stamp 0 is
    /// reserved to flag an epoch reset in progress.
    pub fn new(rate: u16, burst: u16, timeout_ns: u64) -> Self {
        let burst = if rate > 0 { burst.max(rate) } else { burst };
        let control = if rate == 0 {
            0
        } else {
            codec::pack_control(rate as u64, burst as u64)
        };
        Self {
            bucket: CacheAligned::new(AtomicU64::new(codec::pack_bucket(1, burst as u64))),
            epoch: CacheAligned::new(AtomicU64::new(clock::now_ns())),
            control: AtomicU64::new(control),
            timeout: AtomicU64::new(if timeout_ns != 0 {
                timeout_ns
            } else {
                DEFAULT_TIMEOUT_NS
            }),
        }
    }

    /// Acquires one admission slot.
    ///
    /// Returns the number of nanoseconds the caller should delay before
    /// issuing the operation (zero for immediate admission), or [`DROP`]
    /// when the delay would exceed the timeout, in which case no state was
    /// published and the operation must be rejected.
    ///
    /// Never blocks: contention is resolved by re-reading and retrying, and
    /// a rejected operation is never queued.
    pub fn acquire(&self) -> u64 {
        // Disabled buckets bypass the algorithm without touching the
        // deadline words at all.
        if codec::control_step(self.control.load(Ordering::Relaxed)) == 0 {
            return 0;
        }
        self.acquire_slow()
    }

    fn acquire_slow(&self) -> u64 {
        loop {
            let now = clock::now_ns();
            // The Acquire load of `bucket` orders the `epoch` load after it.
            // Load-bearing: a thread that pairs a fresh bucket with a stale
            // epoch computes an inflated lapse and publishes an oversized
            // deadline that every later thread inherits.
            let snapshot = self.bucket.0.load(Ordering::Acquire);
            let control = self.control.load(Ordering::Relaxed);
            let epoch = self.epoch.0.load(Ordering::Relaxed);

            let mut stamp = codec::bucket_stamp(snapshot);
            let mut tokens = codec::bucket_tokens(snapshot);
            let step = codec::control_step(control);
            let burst = codec::control_burst(control);

            // Shaping may have been disabled while we were looping.
            if step == 0 {
                return 0;
            }

            if now < epoch {
                // Epoch ahead of the clock: a reset landed between our two
                // loads, or the epoch was pushed past us by a racing
                // winner. Request a reset; CAS rather than store in case
                // another thread already did.
                let _ = self.bucket.0.compare_exchange(
                    snapshot,
                    0,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
                clock::cpu_relax();
                continue;
            }

            if stamp == 0 {
                // Reset in progress: race to move the epoch forward. Only
                // the CAS winner refills the bucket, and it does so with an
                // unconditional Release store, the one non-CAS mutation in
                // the protocol. Losing threads that already changed the
                // epoch cannot be allowed to CAS the bucket afterwards (a
                // stale refill over fresh deadlines), so the winner's
                // overwrite trades a possible brief burst for a delay that
                // would otherwise be unbounded.
                if self
                    .epoch
                    .0
                    .compare_exchange(epoch, now, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    debug!(epoch_ns = now, burst, "bucket epoch reset");
                    self.bucket
                        .0
                        .store(codec::pack_bucket(1, burst), Ordering::Release);
                }
                clock::cpu_relax();
                continue;
            }

            // Deadline in the past: credit the tokens that arrived since,
            // then bring the deadline up to now. +1 keeps a zero lapse from
            // colliding with the reset sentinel.
            let lapse = now - epoch + 1;
            if lapse > stamp {
                tokens = (tokens + (lapse - stamp) / step).min(burst);
                stamp = lapse;
            }

            // Take a token if there is one; otherwise the deadline moves to
            // the next token-arrival boundary.
            if tokens > 0 {
                tokens -= 1;
            } else {
                stamp = (stamp / step + 1) * step;
            }

            // A stamp past 48 bits cannot be published; fold the timeline
            // by forcing an epoch reset. Bounds reset cadence to roughly
            // 78 hours of continuous traffic.
            if stamp & !codec::STAMP_MASK != 0 {
                debug!(stamp, "deadline stamp overflow, requesting epoch reset");
                let _ = self.bucket.0.compare_exchange(
                    snapshot,
                    0,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
                clock::cpu_relax();
                continue;
            }

            let wait = stamp.saturating_sub(lapse);
            if wait > self.timeout.load(Ordering::Relaxed) {
                // Rejected operations are never queued: return without
                // publishing anything.
                return DROP;
            }

            match self.bucket.0.compare_exchange(
                snapshot,
                codec::pack_bucket(stamp, tokens),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return wait,
                // Lost the race: discard everything computed from the stale
                // snapshot and go around.
                Err(_) => clock::cpu_relax(),
            }
        }
    }

    /// Reconfigures the admission rate and burst size.
    ///
    /// `rate == 0` disables shaping entirely; a `burst` below a nonzero
    /// `rate` is raised to `rate`. Safe to call concurrently with in-flight
    /// [`acquire`](Self::acquire) calls: the control word is replaced in a
    /// single store, and racing acquirers observe either the old or the new
    /// configuration, never a mixture.
    pub fn set_rate(&self, rate: u16, burst: u16) {
        let control = if rate == 0 {
            0
        } else {
            codec::pack_control(rate as u64, burst.max(rate) as u64)
        };
        self.control.store(control, Ordering::Relaxed);
    }

    /// Reconfigures the admission timeout; zero restores
    /// [`DEFAULT_TIMEOUT_NS`].
    pub fn set_timeout(&self, timeout_ns: u64) {
        self.timeout.store(
            if timeout_ns != 0 {
                timeout_ns
            } else {
                DEFAULT_TIMEOUT_NS
            },
            Ordering::Relaxed,
        );
    }

    /// Nanoseconds between token arrivals; zero when shaping is disabled.
    #[inline]
    pub fn step_ns(&self) -> u64 {
        codec::control_step(self.control.load(Ordering::Relaxed))
    }

    /// Maximum burst size currently configured.
    #[inline]
    pub fn burst(&self) -> u64 {
        codec::control_burst(self.control.load(Ordering::Relaxed))
    }

    /// Current admission timeout in nanoseconds.
    #[inline]
    pub fn timeout_ns(&self) -> u64 {
        self.timeout.load(Ordering::Relaxed)
    }

    /// True when shaping is disabled (`rate == 0`).
    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.step_ns() == 0
    }

    /// Raw bucket word, for invariant checks in tests.
    #[cfg(test)]
    pub(crate) fn raw_bucket(&self) -> u64 {
        self.bucket.0.load(Ordering::Acquire)
    }

    /// Overwrites the deadline words, for driving rare paths in tests.
    #[cfg(test)]
    pub(crate) fn force_state(&self, bucket: u64, epoch: u64) {
        self.epoch.0.store(epoch, Ordering::Relaxed);
        self.bucket.0.store(bucket, Ordering::Release);
    }
}
