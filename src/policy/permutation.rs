//! Permutation policy: one global affine permutation shared by all
//! handles.
//!
//! Handle `id` owns the virtual slot ids `2*id` and `2*id + 1`. A single
//! atomic word encodes an affine permutation mapping slot ids to queue
//! indices; all handles observe the same permutation but draw from
//! disjoint virtual ranges, so their nominal queues never collide.
//!
//! # Encoding
//!
//! The low 32 bits of the word hold the multiplier `a` (forced odd, hence
//! coprime with the power-of-two queue count), the high 32 bits the offset
//! `b`. `index = (slot * a + b) & (num_pqs - 1)`.
//!
//! A handle whose use counter runs out proposes a fresh random word with a
//! relaxed CAS; win or lose, it adopts whatever the global word holds
//! afterwards. Relaxed suffices because the word only steers which queue a
//! handle tries to lock.

use std::sync::atomic::AtomicU64;

use crossbeam_utils::CachePadded;
use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::key::{KeyBits, KeyOrder, Keyed};
use crate::multiqueue::MultiQueue;
use crate::ordering::SLOT_ORD;
use crate::policy::{Stick, fast_range};
use crate::tracing_helpers::trace_log;

/// Mask extracting the multiplier from a permutation word.
const MULTIPLIER_MASK: u64 = 0xffff_ffff;

/// The shared permutation word.
///
/// Starts as the identity permutation (`a = 1`, `b = 0`).
#[derive(Debug)]
pub struct GlobalPermutation {
    word: CachePadded<AtomicU64>,
}

/// Map a virtual slot id to a queue index under the permutation `word`.
///
/// `mask` must be the queue count minus one, with the count a power of
/// two; the odd multiplier then makes the map a bijection on `0..=mask`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn affine_index(word: u64, slot: usize, mask: usize) -> usize {
    let a = (word & MULTIPLIER_MASK) as usize;
    let b = (word >> 32) as usize;
    debug_assert!(a & 1 == 1, "permutation multiplier must be odd");
    slot.wrapping_mul(a).wrapping_add(b) & mask
}

/// Sticky policy driven by the global affine permutation.
#[derive(Debug)]
pub struct Permutation {
    rng: Xoshiro256StarStar,
    /// Virtual slot ids owned by this handle.
    slot: [usize; 2],
    /// Last observed global permutation word.
    cached: u64,
    use_count: u32,
    push_side: usize,
    /// Fallback queue per side, adopted when the nominal queue was
    /// contended but a substitute delivered.
    backup: [usize; 2],
}

impl Permutation {
    /// Propose a fresh permutation; adopt the global winner either way.
    fn update_permutation(&mut self, shared: &GlobalPermutation) {
        let proposed = self.rng.next_u64() | 1;
        match shared
            .word
            .compare_exchange(self.cached, proposed, SLOT_ORD, SLOT_ORD)
        {
            Ok(_) => {
                trace_log!(word = proposed, "permutation advanced");
                self.cached = proposed;
            }
            Err(current) => self.cached = current,
        }
    }

    fn refresh(&mut self, shared: &GlobalPermutation, stickiness: u32) {
        if self.use_count == 0 {
            self.update_permutation(shared);
        } else {
            let current = shared.word.load(SLOT_ORD);
            if current == self.cached {
                return;
            }
            self.cached = current;
        }
        self.use_count = stickiness;
    }
}

impl Stick for Permutation {
    type Shared = GlobalPermutation;

    fn new_shared(_num_pqs: usize) -> Self::Shared {
        GlobalPermutation {
            word: CachePadded::new(AtomicU64::new(1)),
        }
    }

    fn attach(id: usize, seed: u64, num_pqs: usize, stickiness: u32, shared: &Self::Shared) -> Self {
        assert!(
            2 * id + 1 < num_pqs,
            "permutation policy requires two virtual slots per handle \
             (handle id {id}, {num_pqs} queues)"
        );
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let backup = [
            fast_range(rng.next_u64(), num_pqs),
            fast_range(rng.next_u64(), num_pqs),
        ];
        Self {
            rng,
            slot: [2 * id, 2 * id + 1],
            cached: shared.word.load(SLOT_ORD),
            use_count: stickiness,
            push_side: 0,
            backup,
        }
    }

    fn push<V, O>(&mut self, mq: &MultiQueue<V, O, Self>, value: V)
    where
        V: Keyed,
        V::Key: KeyBits,
        O: KeyOrder<V::Key>,
    {
        self.refresh(mq.shared(), mq.stickiness());
        let mask = mq.num_pqs() - 1;
        let mut index = affine_index(self.cached, self.slot[self.push_side], mask);
        let mut guard = loop {
            if let Some(guard) = mq.pq(index).try_lock() {
                break guard;
            }
            // Contended: fall back to a random queue without touching the
            // global permutation.
            index = fast_range(self.rng.next_u64(), mq.num_pqs());
            std::hint::spin_loop();
        };
        guard.push(value);
        drop(guard);
        self.use_count -= 1;
        self.push_side = 1 - self.push_side;
    }

    fn try_pop<V, O>(&mut self, mq: &MultiQueue<V, O, Self>) -> Option<V>
    where
        V: Keyed,
        V::Key: KeyBits,
        O: KeyOrder<V::Key>,
    {
        self.refresh(mq.shared(), mq.stickiness());
        let num_pqs = mq.num_pqs();
        let mask = num_pqs - 1;
        let order = mq.order();
        let mut index = [
            affine_index(self.cached, self.slot[0], mask),
            affine_index(self.cached, self.slot[1], mask),
        ];
        let mut key = [
            mq.pq(index[0]).concurrent_top_key(),
            mq.pq(index[1]).concurrent_top_key(),
        ];
        loop {
            let side = usize::from(order.better(&key[1], &key[0]));
            if O::is_sentinel(&key[side]) {
                self.use_count = 0;
                return None;
            }
            if let Some(mut guard) = mq.pq(index[side]).try_lock() {
                if let Some(value) = guard.pop() {
                    drop(guard);
                    if index[side] != affine_index(self.cached, self.slot[side], mask) {
                        // A substitute queue delivered; remember it.
                        self.backup[side] = index[side];
                    }
                    self.use_count -= 1;
                    return Some(value);
                }
            }
            // Switch to the side's backup queue; once the backup has been
            // tried too, draw fresh candidates.
            if index[side] == self.backup[side] {
                index[side] = fast_range(self.rng.next_u64(), num_pqs);
            } else {
                index[side] = self.backup[side];
                self.backup[side] = fast_range(self.rng.next_u64(), num_pqs);
            }
            key[side] = mq.pq(index[side]).concurrent_top_key();
        }
    }
}
