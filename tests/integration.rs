use ioshape::{
    Direction, MountRegistry, MountShaper, ShaperConfig, TokenBucket, DEFAULT_TIMEOUT_NS, DROP,
    WEIGHT_EQUAL,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn burst_of_fifteen_then_one_step_of_delay() {
    let start = Instant::now();
    let bucket = TokenBucket::new(10, 15, 0);
    assert_eq!(bucket.timeout_ns(), DEFAULT_TIMEOUT_NS);

    for _ in 0..15 {
        assert_eq!(bucket.acquire(), 0);
    }

    // The sixteenth admission waits for the first token boundary: 100ms
    // minus whatever wall time the batch consumed.
    let wait = bucket.acquire();
    let elapsed = start.elapsed().as_nanos() as u64;
    assert_ne!(wait, DROP);
    assert!(wait <= 100_000_000);
    assert!(wait + elapsed >= 90_000_000, "wait {wait} elapsed {elapsed}");
}

#[test]
fn a_drop_counts_as_both_drop_and_delay() {
    let shaper = MountShaper::new(ShaperConfig::new(10, 15));
    shaper.complete(Direction::Read, DROP, 0);

    let report = shaper.report();
    assert_eq!(report.read.drops, 1);
    assert_eq!(report.read.delays, 1);
    assert_eq!(report.write.drops, 0);
    assert_eq!(report.write.delays, 0);
}

#[test]
fn sustained_calls_at_or_under_rate_are_never_dropped() {
    let bucket = TokenBucket::new(1_000, 1_000, 0);

    // Pace below one token per step; the bucket should stay ahead of us
    // and settle at zero wait.
    let mut final_wait = u64::MAX;
    for _ in 0..50 {
        let wait = bucket.acquire();
        assert_ne!(wait, DROP);
        final_wait = wait;
        thread::sleep(Duration::from_millis(2));
    }
    assert!(final_wait <= 2 * bucket.step_ns());
}

#[test]
fn over_rate_calls_drop_and_admitted_waits_respect_the_timeout() {
    let timeout = 25_000_000; // 25ms
    let bucket = TokenBucket::new(100, 100, timeout);

    let mut drops = 0;
    for _ in 0..300 {
        let wait = bucket.acquire();
        if wait == DROP {
            drops += 1;
        } else {
            assert!(wait <= timeout, "admitted wait {wait} above the timeout");
        }
    }
    assert!(drops > 0, "300 back-to-back calls at 100/s must overflow 25ms");
}

#[test]
fn disabling_the_rate_admits_everything_immediately() {
    let bucket = TokenBucket::new(2, 2, 0);
    assert_eq!(bucket.acquire(), 0);
    assert_eq!(bucket.acquire(), 0);
    assert!(bucket.acquire() > 0, "burst exhausted, waits expected");

    bucket.set_rate(0, 2);
    for _ in 0..100 {
        assert_eq!(bucket.acquire(), 0);
    }
}

#[test]
fn concurrent_admissions_stay_rate_bounded() {
    const THREADS: usize = 8;
    const CALLS: usize = 2_000;

    let timeout = 100_000_000; // 100ms
    let burst = 1_000u64;
    let bucket = Arc::new(TokenBucket::new(1_000, 1_000, timeout));
    let admitted = Arc::new(AtomicU64::new(0));

    let started = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let bucket = Arc::clone(&bucket);
        let admitted = Arc::clone(&admitted);
        handles.push(thread::spawn(move || {
            for _ in 0..CALLS {
                let wait = bucket.acquire();
                if wait != DROP {
                    assert!(wait <= timeout);
                    admitted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    let elapsed = started.elapsed().as_nanos() as u64;

    // Tokens consumed are bounded by burst plus arrivals; deadline pushes
    // are bounded by the horizon the timeout allows. Together: nothing
    // close to the 16k raw calls may be admitted.
    let step = bucket.step_ns();
    let bound = burst + 2 * (elapsed + timeout) / step + 2;
    let admitted = admitted.load(Ordering::Relaxed);
    assert!(
        admitted <= bound,
        "admitted {admitted} exceeds rate bound {bound}"
    );
    assert!(admitted > 0);
}

#[test]
fn reconfiguration_races_with_acquires() {
    // Timeouts stay small throughout so deadlines can never run far ahead
    // of the clock; the post-churn admission below relies on that.
    let max_timeout = 20_000_000; // 20ms
    let bucket = Arc::new(TokenBucket::new(500, 500, max_timeout));
    let mut handles = Vec::new();

    for _ in 0..4 {
        let bucket = Arc::clone(&bucket);
        handles.push(thread::spawn(move || {
            for _ in 0..2_000 {
                let wait = bucket.acquire();
                assert!(wait == DROP || wait <= max_timeout);
            }
        }));
    }
    {
        let bucket = Arc::clone(&bucket);
        handles.push(thread::spawn(move || {
            for i in 0..500u64 {
                if i % 2 == 0 {
                    bucket.set_rate(0, 0);
                } else {
                    bucket.set_rate(500, 500);
                }
                bucket.set_timeout((1 + i % 3) * 1_000_000);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // The bucket must still function after the churn.
    bucket.set_rate(10, 10);
    bucket.set_timeout(0);
    let wait = bucket.acquire();
    assert!(wait != DROP && wait <= DEFAULT_TIMEOUT_NS);
}

#[test]
fn averages_converge_to_the_offered_load() {
    let shaper = MountShaper::new(ShaperConfig::iops(100).with_weight(WEIGHT_EQUAL));

    // Constant 102_400ns shaping delay (a sample of 100 after scaling) and
    // 300us of disk latency.
    for _ in 0..64 {
        shaper.complete(Direction::Write, 102_400, 300);
    }

    let write = shaper.report().write;
    assert!((98..=100).contains(&write.shaping_latency_us));
    assert!((298..=300).contains(&write.disk_latency_us));
    assert_eq!(write.delays, 64);
    assert_eq!(write.drops, 0);
}

#[test]
fn registry_drives_the_full_mount_lifecycle() {
    let registry = MountRegistry::new(ShaperConfig::iops(1_000));

    let vm = registry.mount("/export/vm01");
    let scratch = registry.mount_with("/export/scratch", ShaperConfig::unlimited());
    assert_eq!(registry.len(), 2);

    for _ in 0..10 {
        let verdict = vm.acquire();
        assert_ne!(verdict, DROP);
        vm.complete(Direction::Read, verdict, 150);

        assert_eq!(scratch.acquire(), 0);
        scratch.complete(Direction::Write, 0, 40);
    }

    let mut report = registry.report();
    report.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(report[0].0, "/export/scratch");
    assert_eq!(report[0].1.write.delays, 0);
    assert!(report[1].1.read.disk_latency_us > 0);

    assert!(registry.unmount("/export/vm01"));
    assert!(registry.unmount("/export/scratch"));
    assert_eq!(registry.stats().total_unmounted, 2);
}

#[test]
fn shapers_are_independent_per_mount() {
    let registry = MountRegistry::new(ShaperConfig::new(2, 2));
    let a = registry.mount("/export/a");
    let b = registry.mount("/export/b");

    // Exhausting one mount's burst must not cost the other anything.
    assert_eq!(a.acquire(), 0);
    assert_eq!(a.acquire(), 0);
    assert!(a.acquire() > 0);

    assert_eq!(b.acquire(), 0);
    assert_eq!(b.acquire(), 0);
}

#[test]
fn contended_stats_updates_count_exactly() {
    let shaper = Arc::new(MountShaper::new(ShaperConfig::iops(100)));
    let mut handles = Vec::new();

    for t in 0..4 {
        let shaper = Arc::clone(&shaper);
        handles.push(thread::spawn(move || {
            let dir = if t % 2 == 0 {
                Direction::Read
            } else {
                Direction::Write
            };
            for _ in 0..2_500 {
                shaper.complete(dir, 1_024, 25);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let report = shaper.report();
    assert_eq!(report.read.delays, 5_000);
    assert_eq!(report.write.delays, 5_000);
    assert_eq!(report.read.drops, 0);
    assert_eq!(report.write.drops, 0);
}
