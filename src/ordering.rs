//! Standard memory orderings for concurrent queue access.
//!
//! These constants ensure consistent ordering usage across the codebase
//! and make the intent clear at each access point.

use std::sync::atomic::Ordering;

/// Ordering for reading the cached top key outside the lock.
/// Pairs with the holder's Release store before unlock.
pub const TOP_KEY_READ: Ordering = Ordering::Acquire;

/// Ordering for writing the cached top key while the lock is held.
/// Pairs with readers' Acquire loads.
pub const TOP_KEY_WRITE: Ordering = Ordering::Release;

/// Ordering for a successful `try_lock` CAS.
/// Makes the previous holder's writes visible.
pub const LOCK_ACQUIRE: Ordering = Ordering::Acquire;

/// Ordering for a failed `try_lock` CAS.
/// The observed value is discarded.
pub const LOCK_FAILURE: Ordering = Ordering::Relaxed;

/// Ordering for releasing the lock.
/// Publishes all writes made while the lock was held.
pub const UNLOCK: Ordering = Ordering::Release;

/// Ordering for permutation slots and the global permutation word.
/// Relaxed is sufficient: slot values only steer which queue a handle
/// attempts to lock; the queue's own lock orders any mutation.
pub const SLOT_ORD: Ordering = Ordering::Relaxed;

/// Ordering for advisory loads whose result carries no data dependency,
/// such as observing whether a lock happens to be held.
pub const RELAXED: Ordering = Ordering::Relaxed;
