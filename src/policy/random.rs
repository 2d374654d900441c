//! Sticky random policy: two per-handle indices refreshed by rejection
//! sampling.

use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::key::{KeyBits, KeyOrder, Keyed};
use crate::multiqueue::MultiQueue;
use crate::policy::{Stick, fast_range};
use crate::tracing_helpers::trace_log;

/// Two sticky queue indices per handle, one preferred per push parity.
///
/// Each side keeps a use counter starting at the configured stickiness;
/// when it reaches zero, or when the sticky queue cannot be locked, the
/// side is redrawn uniformly at random. Pushes alternate between the two
/// sides so both stay warm.
#[derive(Debug)]
pub struct Random {
    rng: Xoshiro256StarStar,
    index: [usize; 2],
    use_count: [u32; 2],
    push_side: usize,
}

impl Stick for Random {
    type Shared = ();

    fn new_shared(_num_pqs: usize) -> Self::Shared {}

    fn attach(
        _id: usize,
        seed: u64,
        num_pqs: usize,
        stickiness: u32,
        _shared: &Self::Shared,
    ) -> Self {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let index = [
            fast_range(rng.next_u64(), num_pqs),
            fast_range(rng.next_u64(), num_pqs),
        ];
        Self {
            rng,
            index,
            use_count: [stickiness, stickiness],
            push_side: 0,
        }
    }

    fn push<V, O>(&mut self, mq: &MultiQueue<V, O, Self>, value: V)
    where
        V: Keyed,
        V::Key: KeyBits,
        O: KeyOrder<V::Key>,
    {
        let side = self.push_side;
        let sticky = if self.use_count[side] > 0 {
            mq.pq(self.index[side]).try_lock()
        } else {
            None
        };
        let mut guard = match sticky {
            Some(guard) => guard,
            None => loop {
                // Rejection sampling: redraw until a queue can be locked.
                let index = fast_range(self.rng.next_u64(), mq.num_pqs());
                if let Some(guard) = mq.pq(index).try_lock() {
                    trace_log!(side, old = self.index[side], new = index, "push redraw");
                    self.index[side] = index;
                    self.use_count[side] = mq.stickiness();
                    break guard;
                }
                std::hint::spin_loop();
            },
        };
        guard.push(value);
        drop(guard);
        self.use_count[side] -= 1;
        self.push_side = 1 - side;
    }

    fn try_pop<V, O>(&mut self, mq: &MultiQueue<V, O, Self>) -> Option<V>
    where
        V: Keyed,
        V::Key: KeyBits,
        O: KeyOrder<V::Key>,
    {
        let num_pqs = mq.num_pqs();
        for side in 0..2 {
            if self.use_count[side] == 0 {
                self.index[side] = fast_range(self.rng.next_u64(), num_pqs);
                self.use_count[side] = mq.stickiness();
            }
        }
        let order = mq.order();
        let mut key = [
            mq.pq(self.index[0]).concurrent_top_key(),
            mq.pq(self.index[1]).concurrent_top_key(),
        ];
        loop {
            let side = usize::from(order.better(&key[1], &key[0]));
            if O::is_sentinel(&key[side]) {
                // Both candidates appear empty; force a refresh next time.
                self.use_count = [0, 0];
                return None;
            }
            if let Some(mut guard) = mq.pq(self.index[side]).try_lock() {
                if let Some(value) = guard.pop() {
                    drop(guard);
                    debug_assert!(self.use_count[0] > 0 && self.use_count[1] > 0);
                    self.use_count[0] -= 1;
                    self.use_count[1] -= 1;
                    return Some(value);
                }
            }
            // Lock failure or empty after locking: randomize the losing
            // side and re-sample its key. Every iteration either pops or
            // redraws, so the loop cannot livelock.
            self.index[side] = fast_range(self.rng.next_u64(), num_pqs);
            self.use_count[side] = mq.stickiness();
            key[side] = mq.pq(self.index[side]).concurrent_top_key();
        }
    }
}
