//! Debug binary for concurrent throughput measurements.
//!
//! Spawns a configurable number of threads, each mixing pushes and pops on
//! a shared multiqueue, and reports operations per second per policy.
//!
//! Run with:
//! ```bash
//! MQ_THREADS=8 MQ_OPS=1000000 cargo run --release --bin throughput
//! ```
//!
//! Environment variables:
//! - `MQ_THREADS`: worker thread count (default: available parallelism)
//! - `MQ_OPS`: operations per thread (default: 1_000_000)
//! - `MQ_STICKINESS`: policy stickiness (default: 8)

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_precision_loss)]

use std::env;
use std::thread;
use std::time::Instant;

use multiqueue::{Config, Min, MultiQueue, Permutation, Random, Stick, Swapping, Uniform};

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

struct Run {
    policy: &'static str,
    threads: usize,
    total_ops: usize,
    elapsed_secs: f64,
}

impl Run {
    fn report(&self) {
        let mops = self.total_ops as f64 / self.elapsed_secs / 1e6;
        println!(
            "{:<12} {:>2} threads  {:>10} ops  {:>8.3} s  {:>8.2} Mops/s",
            self.policy, self.threads, self.total_ops, self.elapsed_secs, mops
        );
    }
}

fn run_policy<P: Stick>(policy: &'static str, threads: usize, ops: usize, stickiness: u32) -> Run {
    let config = Config {
        c: 4,
        stickiness,
        ..Config::default()
    };
    let mq: MultiQueue<u64, Min, P> = MultiQueue::with_config(threads, config);

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..threads {
            let mut handle = mq.get_handle();
            scope.spawn(move || {
                for i in 0..ops {
                    // Two pushes per pop keeps the queues populated.
                    if i % 3 == 2 {
                        let _ = handle.try_pop();
                    } else {
                        handle.push((t * ops + i) as u64);
                    }
                }
            });
        }
    });
    Run {
        policy,
        threads,
        total_ops: threads * ops,
        elapsed_secs: start.elapsed().as_secs_f64(),
    }
}

fn main() {
    let threads = env_usize(
        "MQ_THREADS",
        thread::available_parallelism().map_or(4, usize::from),
    );
    let ops = env_usize("MQ_OPS", 1_000_000);
    let stickiness = u32::try_from(env_usize("MQ_STICKINESS", 8)).unwrap();

    println!("multiqueue throughput: {threads} threads, {ops} ops/thread, stickiness {stickiness}");
    run_policy::<Uniform>("uniform", threads, ops, stickiness).report();
    run_policy::<Random>("random", threads, ops, stickiness).report();
    run_policy::<Swapping>("swapping", threads, ops, stickiness).report();
    run_policy::<Permutation>("permutation", threads, ops, stickiness).report();
}
