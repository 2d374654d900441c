//! Stateless policy: fresh uniform draws on every operation.

use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::key::{KeyBits, KeyOrder, Keyed};
use crate::multiqueue::MultiQueue;
use crate::policy::{Stick, fast_range};

/// No stickiness: every push and pop draws new queue indices.
///
/// The simplest policy and the baseline for the others. Sampling is always
/// fresh, at the cost of a cold cache for the locked queue.
#[derive(Debug)]
pub struct Uniform {
    rng: Xoshiro256StarStar,
}

impl Stick for Uniform {
    type Shared = ();

    fn new_shared(_num_pqs: usize) -> Self::Shared {}

    fn attach(
        _id: usize,
        seed: u64,
        _num_pqs: usize,
        _stickiness: u32,
        _shared: &Self::Shared,
    ) -> Self {
        Self {
            rng: Xoshiro256StarStar::seed_from_u64(seed),
        }
    }

    fn push<V, O>(&mut self, mq: &MultiQueue<V, O, Self>, value: V)
    where
        V: Keyed,
        V::Key: KeyBits,
        O: KeyOrder<V::Key>,
    {
        let mut guard = loop {
            let index = fast_range(self.rng.next_u64(), mq.num_pqs());
            if let Some(guard) = mq.pq(index).try_lock() {
                break guard;
            }
            std::hint::spin_loop();
        };
        guard.push(value);
    }

    fn try_pop<V, O>(&mut self, mq: &MultiQueue<V, O, Self>) -> Option<V>
    where
        V: Keyed,
        V::Key: KeyBits,
        O: KeyOrder<V::Key>,
    {
        let num_pqs = mq.num_pqs();
        let order = mq.order();
        // Bounded retry: give up after 2*M candidate pairs without a
        // successful pop, which under quiescence means the sampled queues
        // were genuinely empty.
        for _ in 0..2 * num_pqs {
            let index = [
                fast_range(self.rng.next_u64(), num_pqs),
                fast_range(self.rng.next_u64(), num_pqs),
            ];
            let key = [
                mq.pq(index[0]).concurrent_top_key(),
                mq.pq(index[1]).concurrent_top_key(),
            ];
            let side = usize::from(order.better(&key[1], &key[0]));
            if O::is_sentinel(&key[side]) {
                continue;
            }
            if let Some(mut guard) = mq.pq(index[side]).try_lock() {
                if let Some(value) = guard.pop() {
                    return Some(value);
                }
            }
        }
        None
    }
}
