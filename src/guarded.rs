//! Guarded priority queue: a sequential queue behind a spinlock with a
//! lock-free cached top key.
//!
//! [`GuardedPq`] wraps a [`BufferedPq`] with a try-lock and an atomic copy
//! of the current top key. Threads choosing between candidate queues read
//! the cached key without taking the lock; only the thread that wins the
//! lock touches the queue itself.
//!
//! # Concurrency Model
//!
//! 1. Readers: call [`GuardedPq::concurrent_top_key`] at any time. The
//!    result was the queue's true top key at some recent point; it is the
//!    sentinel iff the queue was empty at that point.
//! 2. Writers: call [`GuardedPq::try_lock`] to get a [`PqGuard`], mutate
//!    through it, let the guard drop.
//!
//! # Type-State Pattern
//!
//! [`PqGuard`] provides compile-time verification that the lock is held:
//! the mutating operations exist only on the guard. On drop the guard
//! recomputes the cached top key, publishes it with release ordering, and
//! releases the lock (panic-safe).
//!
//! # Invariants
//!
//! - When no thread holds the lock, the cached key is the sentinel iff the
//!   queue is empty, and otherwise equals the key of the true top element.
//! - The cached key is written only while the lock is held, with release
//!   ordering, before the lock release; outside readers use acquire.
//! - While the lock is held the queue may be mutated freely; the cached key
//!   may lag until the guard drops.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64};

use crate::buffered::BufferedPq;
use crate::key::{KeyBits, KeyOrder, Keyed};
use crate::ordering::{LOCK_ACQUIRE, LOCK_FAILURE, RELAXED, TOP_KEY_READ, TOP_KEY_WRITE, UNLOCK};

/// A sequential priority queue fronted by a spinlock and an atomic top-key
/// cache.
///
/// Padded to its own cache line by the owning array, so concurrent
/// operations on distinct queues never false-share.
#[derive(Debug)]
pub struct GuardedPq<V, O> {
    lock: AtomicBool,
    /// Bit pattern of the current top key; sentinel bits when empty.
    top_key: AtomicU64,
    pq: UnsafeCell<BufferedPq<V, O>>,
}

// SAFETY: the inner queue is only reached through a `PqGuard`, and guard
// creation is serialized by the `lock` CAS.
unsafe impl<V: Send, O: Send> Sync for GuardedPq<V, O> {}

impl<V, O> GuardedPq<V, O>
where
    V: Keyed,
    V::Key: KeyBits,
    O: KeyOrder<V::Key>,
{
    /// Create an empty guarded queue.
    pub fn new(order: O) -> Self {
        Self {
            lock: AtomicBool::new(false),
            top_key: AtomicU64::new(O::sentinel().to_bits()),
            pq: UnsafeCell::new(BufferedPq::new(order)),
        }
    }

    /// Attempt to acquire the lock without blocking.
    ///
    /// Returns `Some(guard)` on success. Fails transiently under
    /// contention; the caller's policy decides whether to retry here or
    /// move to another queue.
    #[must_use]
    pub fn try_lock(&self) -> Option<PqGuard<'_, V, O>> {
        if self
            .lock
            .compare_exchange(false, true, LOCK_ACQUIRE, LOCK_FAILURE)
            .is_err()
        {
            return None;
        }
        Some(PqGuard {
            inner: self,
            _marker: PhantomData,
        })
    }

    /// Lock-free read of the cached top key.
    ///
    /// Returns the sentinel when the queue appears empty. The value may be
    /// stale, but it was the queue's true top key at some recent point.
    #[inline]
    #[must_use]
    pub fn concurrent_top_key(&self) -> V::Key {
        V::Key::from_bits(self.top_key.load(TOP_KEY_READ))
    }

    /// Lock-free emptiness check, equivalent to comparing
    /// [`GuardedPq::concurrent_top_key`] against the sentinel.
    #[inline]
    #[must_use]
    pub fn concurrent_empty(&self) -> bool {
        O::is_sentinel(&self.concurrent_top_key())
    }

    /// Whether some thread currently holds the lock.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.load(RELAXED)
    }
}

/// Proof that a [`GuardedPq`]'s lock is held.
///
/// Cannot be constructed except by [`GuardedPq::try_lock`]. All mutating
/// queue operations live here. Dropping the guard republishes the cached
/// top key and releases the lock, even during unwinding.
///
/// # Thread Safety
///
/// Guards are `!Send` and `!Sync` via `PhantomData<*mut ()>`; a lock
/// acquired on one thread is always released on that thread.
#[derive(Debug)]
#[must_use = "dropping the guard immediately releases the lock"]
pub struct PqGuard<'a, V, O>
where
    V: Keyed,
    V::Key: KeyBits,
    O: KeyOrder<V::Key>,
{
    inner: &'a GuardedPq<V, O>,
    _marker: PhantomData<*mut ()>,
}

impl<V, O> PqGuard<'_, V, O>
where
    V: Keyed,
    V::Key: KeyBits,
    O: KeyOrder<V::Key>,
{
    #[inline]
    fn pq(&mut self) -> &mut BufferedPq<V, O> {
        // SAFETY: the guard proves exclusive ownership of the lock, and it
        // is neither Send, Sync, nor cloneable, so this is the only live
        // mutable path to the queue.
        unsafe { &mut *self.inner.pq.get() }
    }

    #[inline]
    fn pq_ref(&self) -> &BufferedPq<V, O> {
        // SAFETY: as above; shared access through the unique guard.
        unsafe { &*self.inner.pq.get() }
    }

    /// Insert `value` into the locked queue.
    #[inline]
    pub fn push(&mut self, value: V) {
        self.pq().push(value);
    }

    /// Remove and return the top element of the locked queue.
    #[inline]
    pub fn pop(&mut self) -> Option<V> {
        self.pq().pop()
    }

    /// The element that pops next, if any.
    #[inline]
    #[must_use]
    pub fn top(&self) -> Option<&V> {
        self.pq_ref().top()
    }

    /// Whether the locked queue holds no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pq_ref().is_empty()
    }

    /// Number of elements in the locked queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pq_ref().len()
    }
}

impl<V, O> Drop for PqGuard<'_, V, O>
where
    V: Keyed,
    V::Key: KeyBits,
    O: KeyOrder<V::Key>,
{
    fn drop(&mut self) {
        // Republish the top key before the lock release so that the next
        // acquire-load outside the lock observes a value consistent with
        // the queue state we leave behind.
        let key = self.pq_ref().top().map_or_else(O::sentinel, Keyed::key);
        self.inner.top_key.store(key.to_bits(), TOP_KEY_WRITE);
        self.inner.lock.store(false, UNLOCK);
    }
}
