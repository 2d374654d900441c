//! The MultiQueue: construction, handle vending, and the per-thread
//! handle facade.
//!
//! A [`MultiQueue`] owns a power-of-two array of [`GuardedPq`]s and the
//! policy's shared state. All operations go through a [`Handle`], one per
//! thread, which borrows the queue for its entire lifetime; the borrow
//! makes "a handle must not outlive its queue" a compile-time rule.

use std::cell::Cell;
use std::marker::PhantomData;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::guarded::GuardedPq;
use crate::key::{KeyBits, KeyOrder, Keyed};
use crate::policy::{Random, Stick};
use crate::tracing_helpers::debug_log;

/// Construction parameters.
///
/// `c` over-provisions the queue array relative to the thread count;
/// `stickiness` is the number of operations a handle performs on one queue
/// before its policy refreshes the choice.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Over-provisioning factor: the array holds the next power of two of
    /// `num_threads * c` queues.
    pub c: usize,
    /// Operations per side before a forced refresh.
    pub stickiness: u32,
    /// Master RNG seed; per-handle RNGs derive from it.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            c: 4,
            stickiness: 8,
            seed: 1,
        }
    }
}

/// Serialized state for handle vending.
#[derive(Debug)]
struct Vendor {
    rng: Xoshiro256StarStar,
    next_id: usize,
}

/// A concurrent relaxed priority queue over an array of guarded sequential
/// queues.
///
/// `V` is the stored value, `O` the key order (defaults to [`Min`]:
/// smallest key pops first), `P` the stick policy (defaults to
/// [`Random`]).
///
/// A successful pop returns the better top of two sampled queues at some
/// instant during the call, not necessarily the global best.
///
/// [`Min`]: crate::key::Min
#[derive(Debug)]
pub struct MultiQueue<V, O = crate::key::Min, P = Random>
where
    P: Stick,
{
    pqs: Box<[CachePadded<GuardedPq<V, O>>]>,
    order: O,
    stickiness: u32,
    shared: P::Shared,
    vend: Mutex<Vendor>,
}

impl<V, O, P> MultiQueue<V, O, P>
where
    V: Keyed,
    V::Key: KeyBits,
    O: KeyOrder<V::Key>,
    P: Stick,
{
    /// Create a queue for `num_threads` concurrent handles with default
    /// configuration.
    ///
    /// # Panics
    /// Panics if `num_threads` is zero.
    #[must_use]
    pub fn new(num_threads: usize) -> Self
    where
        O: Default,
    {
        Self::with_config(num_threads, Config::default())
    }

    /// Create a queue with an explicit [`Config`].
    ///
    /// # Panics
    /// Panics if `num_threads`, `config.c`, or `config.stickiness` is zero.
    #[must_use]
    pub fn with_config(num_threads: usize, config: Config) -> Self
    where
        O: Default,
    {
        Self::with_order(num_threads, config, O::default())
    }

    /// Create a queue with an explicit key order.
    ///
    /// # Panics
    /// Panics if `num_threads`, `config.c`, or `config.stickiness` is zero.
    #[must_use]
    pub fn with_order(num_threads: usize, config: Config, order: O) -> Self {
        assert!(num_threads > 0, "at least one thread must be declared");
        assert!(config.c > 0, "over-provisioning factor must be positive");
        assert!(config.stickiness > 0, "stickiness must be positive");

        let num_pqs = (num_threads * config.c).next_power_of_two();
        debug_log!(num_threads, num_pqs, stickiness = config.stickiness, "constructed");
        Self {
            pqs: (0..num_pqs)
                .map(|_| CachePadded::new(GuardedPq::new(order.clone())))
                .collect(),
            order,
            stickiness: config.stickiness,
            shared: P::new_shared(num_pqs),
            vend: Mutex::new(Vendor {
                rng: Xoshiro256StarStar::seed_from_u64(config.seed),
                next_id: 0,
            }),
        }
    }

    /// Obtain a handle for the calling thread.
    ///
    /// Thread-safe; each call yields a fresh handle id and RNG seed. Use
    /// exactly one live handle per thread.
    ///
    /// # Panics
    /// Stateful policies panic when more handles are vended than the queue
    /// array has slot pairs for.
    pub fn get_handle(&self) -> Handle<'_, V, O, P> {
        let (id, seed) = {
            let mut vendor = self.vend.lock();
            let id = vendor.next_id;
            vendor.next_id += 1;
            (id, vendor.rng.next_u64())
        };
        Handle {
            mq: self,
            policy: P::attach(id, seed, self.num_pqs(), self.stickiness, &self.shared),
            _not_shared: PhantomData,
        }
    }

    /// Number of underlying queues.
    #[inline]
    #[must_use]
    pub fn num_pqs(&self) -> usize {
        self.pqs.len()
    }

    /// Lock-free emptiness check of a single underlying queue.
    ///
    /// # Panics
    /// Panics if `pos` is out of bounds.
    #[must_use]
    pub fn pq_is_empty(&self, pos: usize) -> bool {
        self.pqs[pos].concurrent_empty()
    }

    #[inline]
    pub(crate) fn pq(&self, index: usize) -> &GuardedPq<V, O> {
        &self.pqs[index]
    }

    #[inline]
    pub(crate) fn order(&self) -> &O {
        &self.order
    }

    #[inline]
    pub(crate) fn stickiness(&self) -> u32 {
        self.stickiness
    }

    #[inline]
    pub(crate) fn shared(&self) -> &P::Shared {
        &self.shared
    }
}

impl<V, O> MultiQueue<V, O, crate::policy::Swapping>
where
    V: Keyed,
    V::Key: KeyBits,
    O: KeyOrder<V::Key>,
{
    /// Snapshot of the swapping policy's slot-to-queue assignments.
    ///
    /// At quiescence the result is a permutation of `0..num_pqs`.
    #[must_use]
    pub fn slot_assignments(&self) -> Vec<usize> {
        self.shared.assignments()
    }
}

/// A thread-owned facade over a [`MultiQueue`].
///
/// Move-only and not shareable between threads; every operation is local
/// to the handle's policy state and the queues it touches.
#[derive(Debug)]
pub struct Handle<'a, V, O, P>
where
    P: Stick,
{
    mq: &'a MultiQueue<V, O, P>,
    policy: P,
    /// `Send` but `!Sync`: a handle may move to another thread, never be
    /// shared by two.
    _not_shared: PhantomData<Cell<()>>,
}

impl<V, O, P> Handle<'_, V, O, P>
where
    V: Keyed,
    V::Key: KeyBits,
    O: KeyOrder<V::Key>,
    P: Stick,
{
    /// Push `value` into a policy-chosen queue.
    ///
    /// Never fails; may spin briefly under contention. The sentinel key is
    /// reserved and must not be pushed.
    pub fn push(&mut self, value: V) {
        debug_assert!(
            !O::is_sentinel(&value.key()),
            "the sentinel key is reserved for empty queues"
        );
        self.policy.push(self.mq, value);
    }

    /// Pop from the better of two policy-chosen queues.
    ///
    /// Returns `None` when the structure appears empty to the policy; this
    /// may be spurious under contention, so callers draining the queue
    /// should retry or fall back to [`Handle::scan`].
    pub fn try_pop(&mut self) -> Option<V> {
        self.policy.try_pop(self.mq)
    }

    /// Walk the whole array and pop from the first non-empty queue whose
    /// lock can be taken.
    ///
    /// A drain primitive for termination phases: at quiescence, `None`
    /// means the structure is truly empty.
    pub fn scan(&mut self) -> Option<V> {
        for pq in self.mq.pqs.iter() {
            let Some(mut guard) = pq.try_lock() else {
                continue;
            };
            if let Some(value) = guard.pop() {
                return Some(value);
            }
        }
        None
    }

    /// Number of underlying queues.
    #[inline]
    #[must_use]
    pub fn num_pqs(&self) -> usize {
        self.mq.num_pqs()
    }
}
