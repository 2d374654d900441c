//! # MultiQueue
//!
//! A concurrent relaxed priority queue built from an array of sequential
//! priority queues, each fronted by a spinlock and a lock-free cached top
//! key.
//!
//! The structure trades strict priority order for contention reduction:
//! a successful pop returns an element whose key is, with high probability,
//! among the globally smallest, but not necessarily the globally smallest.
//!
//! ## Design
//!
//! - Every queue pairs a buffered d-ary heap with an atomic "top key" that
//!   can be inspected without taking the lock.
//! - Each thread obtains a [`Handle`] that picks one queue for a push and
//!   compares two candidate queues for a pop, locking the better one.
//! - Pluggable "stick policies" decide how long a handle stays with its
//!   chosen queues before refreshing the choice.
//!
//! ## Concurrency Model
//!
//! Queue contents are only mutated under the per-queue lock. The cached top
//! key is written with release ordering before the lock is released and read
//! with acquire ordering outside the lock, so an unlocked queue always
//! advertises a key that was its true top at some recent point.

pub mod buffered;
pub mod guarded;
pub mod heap;
pub mod key;
pub mod multiqueue;
pub mod ordering;
pub mod policy;

pub(crate) mod tracing_helpers;

#[cfg(all(test, loom))]
mod loom_tests;

pub use buffered::BufferedPq;
pub use guarded::{GuardedPq, PqGuard};
pub use key::{KeyBits, KeyOrder, Keyed, Max, Min};
pub use multiqueue::{Config, Handle, MultiQueue};
pub use policy::{Permutation, Random, Stick, Swapping, Uniform};
