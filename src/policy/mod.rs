//! Stick policies: per-handle queue selection state machines.
//!
//! Every handle owns a policy value that decides which queue receives the
//! next push and which two queues are compared for the next pop. Stateful
//! policies "stick" to their chosen queues for a configured number of
//! operations before refreshing the choice, trading sampling freshness for
//! reduced bookkeeping.
//!
//! # Variants
//!
//! - [`Uniform`]: no state; fresh uniform draws on every operation.
//! - [`Random`]: two sticky indices refreshed by rejection sampling.
//! - [`Swapping`]: sticky indices held in a shared permutation table; a
//!   refresh swaps slot values with a random foreign slot, so every queue
//!   keeps exactly one owner slot.
//! - [`Permutation`]: a single global affine permutation maps per-handle
//!   slot ids to queue indices; refreshes propose a new permutation to all
//!   handles at once.
//!
//! # Common contract
//!
//! Pop compares the cached top keys of two candidates and locks the better
//! one (sentinel loses every comparison; on a tie the first candidate
//! wins). A pop returns `None` only when the policy's candidates report
//! apparent emptiness, which callers may treat as a hint, not a guarantee.

mod permutation;
mod random;
mod swapping;
mod uniform;

pub use permutation::{GlobalPermutation, Permutation, affine_index};
pub use random::Random;
pub use swapping::{SwapTable, Swapping};
pub use uniform::Uniform;

use crate::key::{KeyBits, KeyOrder, Keyed};
use crate::multiqueue::MultiQueue;

/// A per-handle queue selection policy.
///
/// `Shared` is the policy's cross-handle state, owned by the
/// [`MultiQueue`]; the policy value itself is thread-local handle state.
pub trait Stick: Sized + Send {
    /// Cross-handle state stored in the parent queue.
    type Shared: Send + Sync + std::fmt::Debug;

    /// Build the shared state for an array of `num_pqs` queues.
    fn new_shared(num_pqs: usize) -> Self::Shared;

    /// Build the thread-local state for the handle with the given id.
    fn attach(
        id: usize,
        seed: u64,
        num_pqs: usize,
        stickiness: u32,
        shared: &Self::Shared,
    ) -> Self;

    /// Push `value` into a policy-chosen queue. Never fails; may retry
    /// other queues under contention.
    fn push<V, O>(&mut self, mq: &MultiQueue<V, O, Self>, value: V)
    where
        V: Keyed,
        V::Key: KeyBits,
        O: KeyOrder<V::Key>;

    /// Pop from the better of two policy-chosen queues.
    ///
    /// Returns `None` when the candidates report apparent emptiness; this
    /// may be spurious under contention.
    fn try_pop<V, O>(&mut self, mq: &MultiQueue<V, O, Self>) -> Option<V>
    where
        V: Keyed,
        V::Key: KeyBits,
        O: KeyOrder<V::Key>;
}

/// Reduce a full-width random word to `0..n` without division.
///
/// Multiplicative range reduction: the high 64 bits of `word * n`. Unbiased
/// enough for queue selection and valid for any `n`, not just powers of
/// two.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn fast_range(word: u64, n: usize) -> usize {
    ((u128::from(word) * n as u128) >> 64) as usize
}
