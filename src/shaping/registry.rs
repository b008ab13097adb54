//! # Mount Registry
//!
//! Concurrent registry mapping mount paths to their shapers. This is the
//! mount-lifecycle surface a filesystem shim drives: register a shaper when
//! a resource is mounted, look it up on every operation, drop it at unmount.
//!
//! ```text
//!     Mount lifecycle:
//!
//!     /export/vm01 ──┐
//!     /export/vm02 ──┼──► MountRegistry ──► Arc<MountShaper>
//!     /export/scratch┘         │
//!                              ▼
//!                       ┌──────────────┐
//!                       │   DashMap    │   path → shaper
//!                       └──────────────┘
//! ```
//!
//! There is no background eviction: unmount is an explicit event in this
//! domain, and a shaper's memory is released when the registry entry and
//! the last in-flight operation's `Arc` are both gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::config::ShaperConfig;
use super::shaper::MountShaper;
use super::stats::StatsReport;

/// Concurrent path-keyed collection of [`MountShaper`]s.
///
/// All operations are safe to call from any number of threads; lookups and
/// lifecycle changes never block each other beyond the map's sharding.
///
/// # Example
///
/// ```rust
/// use ioshape::{Direction, MountRegistry, ShaperConfig};
///
/// let registry = MountRegistry::new(ShaperConfig::iops(500));
///
/// let shaper = registry.mount("/export/vm01");
/// let verdict = shaper.acquire();
/// shaper.complete(Direction::Read, verdict, 120);
///
/// assert!(registry.unmount("/export/vm01"));
/// assert!(registry.is_empty());
/// ```
#[derive(Debug)]
pub struct MountRegistry {
    mounts: DashMap<String, Arc<MountShaper>>,
    default_config: ShaperConfig,
    total_mounted: AtomicU64,
    total_unmounted: AtomicU64,
}

impl MountRegistry {
    /// Creates an empty registry; `default_config` applies to mounts
    /// registered through [`mount`](Self::mount).
    ///
    /// # Panics
    ///
    /// Panics when `default_config` fails [`ShaperConfig::validate`].
    pub fn new(default_config: ShaperConfig) -> Self {
        default_config
            .validate()
            .expect("invalid default shaper configuration");
        Self {
            mounts: DashMap::new(),
            default_config,
            total_mounted: AtomicU64::new(0),
            total_unmounted: AtomicU64::new(0),
        }
    }

    /// Registers a mount with the registry's default configuration.
    pub fn mount(&self, path: &str) -> Arc<MountShaper> {
        self.mount_with(path, self.default_config)
    }

    /// Registers a mount with an explicit configuration.
    ///
    /// Idempotent: a path that is already registered keeps its existing
    /// shaper (and its accumulated statistics); the new configuration is
    /// ignored. Use [`set_rate`](Self::set_rate) /
    /// [`set_timeout`](Self::set_timeout) to reconfigure in place.
    ///
    /// # Panics
    ///
    /// Panics when `config` fails [`ShaperConfig::validate`].
    pub fn mount_with(&self, path: &str, config: ShaperConfig) -> Arc<MountShaper> {
        match self.mounts.entry(path.to_owned()) {
            Entry::Occupied(entry) => {
                debug!(path, "mount already shaped, reusing its shaper");
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => {
                let shaper = Arc::new(MountShaper::new(config));
                self.total_mounted.fetch_add(1, Ordering::Relaxed);
                info!(
                    path,
                    rate = config.rate,
                    burst = config.effective_burst(),
                    "mount shaped"
                );
                entry.insert(Arc::clone(&shaper));
                shaper
            }
        }
    }

    /// Drops a mount from the registry.
    ///
    /// Returns whether the path was registered. The shaper's memory is
    /// freed once in-flight operations release their clones of the `Arc`;
    /// there is no other teardown.
    pub fn unmount(&self, path: &str) -> bool {
        match self.mounts.remove(path) {
            Some(_) => {
                self.total_unmounted.fetch_add(1, Ordering::Relaxed);
                info!(path, "mount unshaped");
                true
            }
            None => {
                warn!(path, "unmount of a path that was never shaped");
                false
            }
        }
    }

    /// Looks up the shaper for a path.
    #[inline]
    pub fn get(&self, path: &str) -> Option<Arc<MountShaper>> {
        self.mounts.get(path).map(|entry| Arc::clone(entry.value()))
    }

    /// Reconfigures a mount's rate and burst in place. Returns whether the
    /// path was registered.
    pub fn set_rate(&self, path: &str, rate: u16, burst: u16) -> bool {
        match self.get(path) {
            Some(shaper) => {
                shaper.set_rate(rate, burst);
                debug!(path, rate, burst, "mount rate reconfigured");
                true
            }
            None => false,
        }
    }

    /// Reconfigures a mount's admission timeout in place. Returns whether
    /// the path was registered.
    pub fn set_timeout(&self, path: &str, timeout_ns: u64) -> bool {
        match self.get(path) {
            Some(shaper) => {
                shaper.set_timeout(timeout_ns);
                debug!(path, timeout_ns, "mount timeout reconfigured");
                true
            }
            None => false,
        }
    }

    /// Number of currently registered mounts.
    #[inline]
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    /// True when no mounts are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Statistics snapshot of every registered mount, for external
    /// reporting.
    pub fn report(&self) -> Vec<(String, StatsReport)> {
        self.mounts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().report()))
            .collect()
    }

    /// Registry lifecycle counters.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active: self.mounts.len(),
            total_mounted: self.total_mounted.load(Ordering::Relaxed),
            total_unmounted: self.total_unmounted.load(Ordering::Relaxed),
        }
    }
}

/// Lifecycle counters for a [`MountRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Mounts currently registered.
    pub active: usize,
    /// Mounts registered since the registry was created.
    pub total_mounted: u64,
    /// Mounts dropped since the registry was created.
    pub total_unmounted: u64,
}
