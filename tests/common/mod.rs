//! Common test utilities with tracing setup.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ... test code ...
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Filter directives (e.g., `tagtree=debug,tagtree::tree=trace`)
//! - `TAGTREE_LOG_CONSOLE`: Set to "0" to disable console output

#![allow(dead_code)]

use std::env;
use std::sync::Once;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use tagtree::{Key, TagTree};

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(setup_tracing);
}

fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{default_level}")))
}

fn setup_tracing() {
    let console_enabled = !env::var("TAGTREE_LOG_CONSOLE").is_ok_and(|v| v == "0");

    let console_layer = console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_target(true)
            .with_line_number(true)
            .compact()
    });

    Registry::default()
        .with(make_filter(Level::INFO))
        .with(console_layer)
        .init();
}

/// Assert the tree satisfies every structural invariant, with a readable
/// failure message.
#[track_caller]
pub fn assert_balanced<V>(tree: &TagTree<V>) {
    if let Err(violation) = tree.check_invariants() {
        panic!("tree invariant violated: {violation}");
    }
}

/// Collect every key via a full iterate, in visit order.
pub fn collect_keys<V>(tree: &TagTree<V>) -> Vec<Key> {
    let mut keys = Vec::new();
    tree.iterate(|key, _| {
        keys.push(key.clone());
        true
    });
    keys
}

/// Count entries via a full iterate.
pub fn count_entries<V>(tree: &TagTree<V>) -> usize {
    let mut count = 0;
    tree.iterate(|_, _| {
        count += 1;
        true
    });
    count
}
