//! Common test utilities.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ... test code with tracing::info!, tracing::debug!, etc.
//! }
//! ```
//!
//! Set `RUST_LOG` to adjust filtering, e.g.
//! `RUST_LOG=multiqueue=trace cargo test --features tracing`.

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .with_test_writer()
            .try_init();
    });
}

/// Pop until both the policy and a full scan report emptiness.
///
/// `try_pop` alone may spuriously report emptiness while elements remain
/// in unsampled queues; at quiescence the scan fallback makes the drain
/// complete.
pub fn drain<V, O, P>(handle: &mut multiqueue::Handle<'_, V, O, P>) -> Vec<V>
where
    V: multiqueue::Keyed,
    V::Key: multiqueue::KeyBits,
    O: multiqueue::KeyOrder<V::Key>,
    P: multiqueue::Stick,
{
    let mut out = Vec::new();
    loop {
        if let Some(value) = handle.try_pop() {
            out.push(value);
        } else if let Some(value) = handle.scan() {
            out.push(value);
        } else {
            break;
        }
    }
    out
}
