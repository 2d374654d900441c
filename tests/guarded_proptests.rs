//! Property-based tests for the sequential queue stack and the guarded
//! wrapper.
//!
//! These tests verify invariants that should hold for all inputs:
//! the buffered queue agrees with a reference heap, and the guarded
//! queue's cached top key always matches its true state at quiescence.

#![allow(clippy::pedantic)]

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use multiqueue::buffered::BufferedPq;
use multiqueue::guarded::GuardedPq;
use multiqueue::heap::Heap;
use multiqueue::key::{KeyOrder, Min};
use proptest::prelude::*;

// ============================================================================
//  Strategies
// ============================================================================

/// A push of an arbitrary non-sentinel key, or a pop.
#[derive(Clone, Copy, Debug)]
enum Op {
    Push(u64),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..u64::MAX).prop_map(Op::Push),
        2 => Just(Op::Pop),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(op_strategy(), 0..400)
}

/// Small key domain to force duplicates and buffer churn.
fn clustered_ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            3 => (0..16u64).prop_map(Op::Push),
            2 => Just(Op::Pop),
        ],
        0..400,
    )
}

// ============================================================================
//  Heap vs reference model
// ============================================================================

proptest! {
    /// The d-ary heap pops the same key sequence as std's binary heap.
    #[test]
    fn heap_matches_reference(ops in ops_strategy()) {
        let mut heap = Heap::new(Min);
        let mut model: BinaryHeap<Reverse<u64>> = BinaryHeap::new();

        for op in ops {
            match op {
                Op::Push(key) => {
                    heap.push(key);
                    model.push(Reverse(key));
                }
                Op::Pop => {
                    prop_assert_eq!(heap.pop(), model.pop().map(|Reverse(k)| k));
                }
            }
            prop_assert_eq!(heap.len(), model.len());
            prop_assert_eq!(heap.top().copied(), model.peek().map(|&Reverse(k)| k));
        }
    }
}

// ============================================================================
//  BufferedPq vs reference model
// ============================================================================

proptest! {
    /// The buffered queue is a strict priority queue: same pop sequence as
    /// the reference heap, regardless of how the buffers cut the data.
    #[test]
    fn buffered_matches_reference(ops in ops_strategy()) {
        let mut pq = BufferedPq::new(Min);
        let mut model: BinaryHeap<Reverse<u64>> = BinaryHeap::new();

        for op in ops {
            match op {
                Op::Push(key) => {
                    pq.push(key);
                    model.push(Reverse(key));
                }
                Op::Pop => {
                    prop_assert_eq!(pq.pop(), model.pop().map(|Reverse(k)| k));
                }
            }
            prop_assert_eq!(pq.len(), model.len());
            prop_assert_eq!(pq.is_empty(), model.is_empty());
            prop_assert_eq!(pq.top().copied(), model.peek().map(|&Reverse(k)| k));
        }
    }

    /// Same with heavy duplication, exercising the tie paths between the
    /// deletion buffer, insertion buffer, and heap.
    #[test]
    fn buffered_matches_reference_with_duplicates(ops in clustered_ops_strategy()) {
        let mut pq = BufferedPq::new(Min);
        let mut model: BinaryHeap<Reverse<u64>> = BinaryHeap::new();

        for op in ops {
            match op {
                Op::Push(key) => {
                    pq.push(key);
                    model.push(Reverse(key));
                }
                Op::Pop => {
                    prop_assert_eq!(pq.pop(), model.pop().map(|Reverse(k)| k));
                }
            }
        }
        // Drain both completely.
        while let Some(expected) = model.pop() {
            prop_assert_eq!(pq.pop(), Some(expected.0));
        }
        prop_assert_eq!(pq.pop(), None);
    }
}

// ============================================================================
//  Guarded queue: cached top key invariant
// ============================================================================

proptest! {
    /// At every quiescent point the cached key is the sentinel iff the
    /// queue is empty, and otherwise equals the true top key.
    #[test]
    fn cached_top_key_matches_state(ops in ops_strategy()) {
        let guarded: GuardedPq<u64, Min> = GuardedPq::new(Min);
        let mut model: BinaryHeap<Reverse<u64>> = BinaryHeap::new();

        for op in ops {
            {
                let mut guard = guarded.try_lock().expect("uncontended lock");
                match op {
                    Op::Push(key) => {
                        guard.push(key);
                        model.push(Reverse(key));
                    }
                    Op::Pop => {
                        prop_assert_eq!(guard.pop(), model.pop().map(|Reverse(k)| k));
                    }
                }
            }
            // Guard dropped: the cache must be consistent again.
            let cached = guarded.concurrent_top_key();
            match model.peek() {
                None => {
                    prop_assert_eq!(cached, <Min as KeyOrder<u64>>::sentinel());
                    prop_assert!(guarded.concurrent_empty());
                }
                Some(&Reverse(top)) => {
                    prop_assert_eq!(cached, top);
                    prop_assert!(!guarded.concurrent_empty());
                }
            }
        }
    }
}
