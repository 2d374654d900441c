//! Benchmarks of the full multiqueue per stick policy using Divan.
//!
//! Single-handle costs only; for thread-scaling numbers use the
//! `throughput` binary.
//!
//! Run with: `cargo bench --bench multiqueue`

use divan::{Bencher, black_box};
use multiqueue::{Config, Min, MultiQueue, Permutation, Random, Stick, Swapping, Uniform};

fn main() {
    divan::main();
}

const OPS: u64 = 10_000;

fn bench_push_pop<P: Stick>(bencher: Bencher) {
    let config = Config {
        c: 4,
        stickiness: 8,
        ..Config::default()
    };
    bencher.bench_local(|| {
        let mq: MultiQueue<u64, Min, P> = MultiQueue::with_config(4, config);
        let mut handle = mq.get_handle();
        for key in 0..OPS {
            handle.push(black_box(key));
            if key % 2 == 1 {
                black_box(handle.try_pop());
            }
        }
    });
}

#[divan::bench_group]
mod push_pop {
    use super::{Bencher, Permutation, Random, Swapping, Uniform, bench_push_pop};

    #[divan::bench]
    fn uniform(bencher: Bencher) {
        bench_push_pop::<Uniform>(bencher);
    }

    #[divan::bench]
    fn random(bencher: Bencher) {
        bench_push_pop::<Random>(bencher);
    }

    #[divan::bench]
    fn swapping(bencher: Bencher) {
        bench_push_pop::<Swapping>(bencher);
    }

    #[divan::bench]
    fn permutation(bencher: Bencher) {
        bench_push_pop::<Permutation>(bencher);
    }
}

#[divan::bench_group]
mod stickiness {
    use super::{Bencher, Config, Min, MultiQueue, Random, black_box};

    /// Lower stickiness means more frequent redraws and colder caches.
    #[divan::bench(args = [1, 4, 16, 64])]
    fn random_policy(bencher: Bencher, stickiness: u32) {
        let config = Config {
            c: 4,
            stickiness,
            ..Config::default()
        };
        bencher.bench_local(|| {
            let mq: MultiQueue<u64, Min, Random> = MultiQueue::with_config(4, config);
            let mut handle = mq.get_handle();
            for key in 0..super::OPS {
                handle.push(black_box(key));
                if key % 2 == 1 {
                    black_box(handle.try_pop());
                }
            }
        });
    }
}
