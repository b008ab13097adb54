//! Basic shaping demo: one bucket, one statistics pair, a paced workload.
//!
//! Run with: cargo run --example basic

use ioshape::{Direction, MountStats, TokenBucket, DEFAULT_WEIGHT, DROP};
use std::thread;
use std::time::{Duration, Instant};

fn drive(bucket: &TokenBucket, stats: &MountStats, rounds: usize) {
    for i in 0..rounds {
        let started = Instant::now();
        let verdict = bucket.acquire();

        match verdict {
            DROP => println!("  op {i:2}: rejected by shaping"),
            0 => println!("  op {i:2}: admitted immediately"),
            wait => {
                println!("  op {i:2}: admitted after {:.1}ms", wait as f64 / 1e6);
                // Odd operations honor the delay, even ones skip it, to
                // show the deadline keeps the aggregate rate bounded
                // either way.
                if i % 2 == 1 {
                    thread::sleep(Duration::from_nanos(wait));
                }
            }
        }

        let disk_latency_us = started.elapsed().as_micros() as u32;
        let direction = if i % 2 == 1 {
            Direction::Write
        } else {
            Direction::Read
        };
        stats.update(direction, verdict, disk_latency_us);
    }
}

fn main() {
    println!("=== I/O Shaping Demo ===\n");

    let bucket = TokenBucket::new(10, 15, 0);
    let stats = MountStats::new(DEFAULT_WEIGHT);
    println!(
        "bucket: 10 ops/s, burst 15, step {}ms",
        bucket.step_ns() / 1_000_000
    );

    println!("\n--- Phase 1: burst, then steady shaping ---");
    drive(&bucket, &stats, 30);

    println!("\n--- Phase 2: reconfigured to 5 ops/s, burst 10 ---");
    bucket.set_rate(5, 10);
    thread::sleep(Duration::from_secs(1));
    drive(&bucket, &stats, 10);

    println!("\n{}", stats.report());
}
