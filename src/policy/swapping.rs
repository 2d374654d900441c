//! Swapping policy: sticky assignments held in a shared permutation table.
//!
//! Instead of bare indices, each handle owns two *slots* in a table that
//! maps slots to queue indices. A refresh swaps the handle's slot value
//! with a uniformly random foreign slot's value, so the table stays a
//! permutation and every queue keeps exactly one owner slot. This keeps a
//! handle's nominal partners permanently well-distributed over the array.
//!
//! # Swap protocol
//!
//! A slot in transit holds the *transit marker* (the queue count, one past
//! any real index):
//!
//! 1. CAS the own slot from its known value to the marker. Failure means a
//!    foreign swap already replaced the value; adopt it and stop.
//! 2. CAS a random live target slot from its observed value to the own
//!    value (retrying target selection while the target is in transit).
//! 3. Store the target's old value into the own slot.
//!
//! Slot CAS uses relaxed ordering throughout: slot values only steer which
//! queue a handle tries to lock, and queue mutations are ordered by the
//! queue's own lock. ABA on a slot is benign for the same reason.

use std::sync::atomic::AtomicUsize;

use crossbeam_utils::CachePadded;
use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::key::{KeyBits, KeyOrder, Keyed};
use crate::multiqueue::MultiQueue;
use crate::ordering::SLOT_ORD;
use crate::policy::{Stick, fast_range};
use crate::tracing_helpers::trace_log;

/// The shared slot-to-queue permutation table.
///
/// One padded atomic per queue, identity-initialized. At any quiescent
/// point the slot values are a permutation of `0..num_pqs`.
#[derive(Debug)]
pub struct SwapTable {
    slots: Box<[CachePadded<AtomicUsize>]>,
}

impl SwapTable {
    fn new(num_pqs: usize) -> Self {
        Self {
            slots: (0..num_pqs)
                .map(|i| CachePadded::new(AtomicUsize::new(i)))
                .collect(),
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.slots.len()
    }

    /// The transit marker: one past any real queue index.
    #[inline]
    fn transit(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn slot(&self, index: usize) -> &AtomicUsize {
        &self.slots[index]
    }

    /// Snapshot of all slot values. Only meaningful at quiescence, where
    /// no slot holds the transit marker.
    #[must_use]
    pub fn assignments(&self) -> Vec<usize> {
        self.slots.iter().map(|slot| slot.load(SLOT_ORD)).collect()
    }
}

/// Sticky policy whose assignments migrate through [`SwapTable`] swaps.
#[derive(Debug)]
pub struct Swapping {
    rng: Xoshiro256StarStar,
    /// First of the two consecutive slots owned by this handle.
    slot_base: usize,
    index: [usize; 2],
    use_count: [u32; 2],
    push_side: usize,
}

impl Swapping {
    /// Draw random slots until one is not in transit; return it with its
    /// current assignment.
    fn random_live_slot(&mut self, table: &SwapTable) -> (usize, usize) {
        loop {
            let slot = fast_range(self.rng.next_u64(), table.len());
            let assigned = table.slot(slot).load(SLOT_ORD);
            if assigned != table.transit() {
                return (slot, assigned);
            }
        }
    }

    /// Swap the own slot's value with a uniformly random foreign slot.
    fn swap_assignment(&mut self, side: usize, table: &SwapTable) {
        let own = table.slot(self.slot_base + side);
        match own.compare_exchange(self.index[side], table.transit(), SLOT_ORD, SLOT_ORD) {
            Err(current) => {
                // A foreign swap targeted this slot since we last read it;
                // its new value is as random as a swap of our own.
                debug_assert_ne!(current, table.transit());
                self.index[side] = current;
            }
            Ok(_) => {
                let assigned = loop {
                    let slot = fast_range(self.rng.next_u64(), table.len());
                    let assigned = table.slot(slot).load(SLOT_ORD);
                    if assigned == table.transit() {
                        continue;
                    }
                    if table
                        .slot(slot)
                        .compare_exchange(assigned, self.index[side], SLOT_ORD, SLOT_ORD)
                        .is_ok()
                    {
                        break assigned;
                    }
                };
                trace_log!(side, old = self.index[side], new = assigned, "slot swap");
                own.store(assigned, SLOT_ORD);
                self.index[side] = assigned;
            }
        }
    }

    /// After an opportunistic lock on a foreign slot's queue, try to trade
    /// assignments so the warm queue becomes the sticky one.
    ///
    /// Returns whether the side now has a fresh assignment.
    fn try_adopt(
        &mut self,
        side: usize,
        target_slot: usize,
        target_assigned: usize,
        table: &SwapTable,
    ) -> bool {
        let own = table.slot(self.slot_base + side);
        match own.compare_exchange(self.index[side], table.transit(), SLOT_ORD, SLOT_ORD) {
            Err(current) => {
                debug_assert_ne!(current, table.transit());
                self.index[side] = current;
                true
            }
            Ok(_) => {
                if table
                    .slot(target_slot)
                    .compare_exchange(target_assigned, self.index[side], SLOT_ORD, SLOT_ORD)
                    .is_ok()
                {
                    own.store(target_assigned, SLOT_ORD);
                    self.index[side] = target_assigned;
                    true
                } else {
                    // Target moved on; roll the own slot back.
                    own.store(self.index[side], SLOT_ORD);
                    false
                }
            }
        }
    }

    fn refresh(&mut self, side: usize, table: &SwapTable, stickiness: u32) {
        if self.use_count[side] == 0 {
            self.swap_assignment(side, table);
            self.use_count[side] = stickiness;
        } else {
            // Pick up a foreign swap that moved our slot.
            let current = table.slot(self.slot_base + side).load(SLOT_ORD);
            if current != self.index[side] {
                self.index[side] = current;
                self.use_count[side] = stickiness;
            }
        }
    }
}

impl Stick for Swapping {
    type Shared = SwapTable;

    fn new_shared(num_pqs: usize) -> Self::Shared {
        SwapTable::new(num_pqs)
    }

    fn attach(id: usize, seed: u64, num_pqs: usize, stickiness: u32, shared: &Self::Shared) -> Self {
        let slot_base = 2 * id;
        assert!(
            slot_base + 1 < num_pqs,
            "swapping policy requires two permutation slots per handle \
             (handle id {id}, {num_pqs} queues)"
        );
        Self {
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            slot_base,
            index: [
                shared.slot(slot_base).load(SLOT_ORD),
                shared.slot(slot_base + 1).load(SLOT_ORD),
            ],
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
        let table = mq.shared();
        let side = self.push_side;
        self.refresh(side, table, mq.stickiness());

        let mut lock_slot = self.slot_base + side;
        let mut lock_index = self.index[side];
        let mut guard = loop {
            if let Some(guard) = mq.pq(lock_index).try_lock() {
                break guard;
            }
            // Fall back to a random queue, reached through its slot so
            // transit markers are skipped.
            let (slot, assigned) = self.random_live_slot(table);
            lock_slot = slot;
            lock_index = assigned;
            std::hint::spin_loop();
        };
        guard.push(value);
        drop(guard);

        if lock_slot != self.slot_base + side && self.try_adopt(side, lock_slot, lock_index, table)
        {
            self.use_count[side] = mq.stickiness();
        }
        self.use_count[side] -= 1;
        self.push_side = 1 - side;
    }

    fn try_pop<V, O>(&mut self, mq: &MultiQueue<V, O, Self>) -> Option<V>
    where
        V: Keyed,
        V::Key: KeyBits,
        O: KeyOrder<V::Key>,
    {
        let table = mq.shared();
        let stickiness = mq.stickiness();
        self.refresh(0, table, stickiness);
        self.refresh(1, table, stickiness);

        let order = mq.order();
        let mut slot = [self.slot_base, self.slot_base + 1];
        let mut index = self.index;
        let mut key = [
            mq.pq(index[0]).concurrent_top_key(),
            mq.pq(index[1]).concurrent_top_key(),
        ];
        loop {
            let side = usize::from(order.better(&key[1], &key[0]));
            if O::is_sentinel(&key[side]) {
                self.use_count = [0, 0];
                return None;
            }
            if let Some(mut guard) = mq.pq(index[side]).try_lock() {
                if let Some(value) = guard.pop() {
                    drop(guard);
                    if slot[side] != self.slot_base + side
                        && self.try_adopt(side, slot[side], index[side], table)
                    {
                        self.use_count[side] = stickiness;
                    }
                    self.use_count[0] -= 1;
                    self.use_count[1] -= 1;
                    return Some(value);
                }
            }
            let (s, assigned) = self.random_live_slot(table);
            slot[side] = s;
            index[side] = assigned;
            key[side] = mq.pq(index[side]).concurrent_top_key();
        }
    }
}
