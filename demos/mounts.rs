//! Multi-mount demo: a registry shaping several mounts independently.
//!
//! Run with: cargo run --example mounts

use ioshape::{Direction, MountRegistry, ShaperConfig, DROP};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    println!("=== Mount Registry Demo ===\n");

    let registry = Arc::new(MountRegistry::new(ShaperConfig::iops(200)));

    // Two shaped mounts and one passthrough.
    registry.mount("/export/vm01");
    registry.mount_with(
        "/export/vm02",
        ShaperConfig::new(50, 50).with_timeout(Duration::from_millis(40)),
    );
    registry.mount_with("/export/scratch", ShaperConfig::unlimited());

    let mut handles = Vec::new();
    for path in ["/export/vm01", "/export/vm02", "/export/scratch"] {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            let shaper = registry.get(path).expect("mounted above");
            let mut admitted = 0u32;
            let mut dropped = 0u32;

            for _ in 0..100 {
                let verdict = shaper.acquire();
                if verdict == DROP {
                    dropped += 1;
                } else {
                    admitted += 1;
                }
                shaper.complete(Direction::Read, verdict, 100);
            }
            (path, admitted, dropped)
        }));
    }

    for handle in handles {
        let (path, admitted, dropped) = handle.join().unwrap();
        println!("{path}: {admitted} admitted, {dropped} dropped");
    }

    println!("\nPer-mount statistics:");
    let mut report = registry.report();
    report.sort_by(|a, b| a.0.cmp(&b.0));
    for (path, stats) in report {
        println!("\n[{path}]\n{stats}");
    }

    registry.unmount("/export/vm01");
    registry.unmount("/export/vm02");
    registry.unmount("/export/scratch");
    let totals = registry.stats();
    println!(
        "\nregistry: {} active, {} mounted, {} unmounted",
        totals.active, totals.total_mounted, totals.total_unmounted
    );
}
