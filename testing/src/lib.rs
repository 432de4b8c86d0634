//! # Viewstate Testing
//!
//! Testing utilities and helpers for viewstate containers and transitions.
//!
//! This crate provides:
//! - [`TransitionTest`]: Given-When-Then assertions for transitions, run
//!   either as a pure fold or through a live reducer
//! - Stream helpers that wait for emissions with a timeout instead of hanging
//! - proptest strategies for effect sequences
//! - Scope and tracing setup for async tests
//!
//! ## Example
//!
//! ```
//! use viewstate_testing::{expect_next, expect_silent, test_scope};
//! use viewstate_runtime::{getter, StateContainer};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let scope = test_scope();
//! let container = StateContainer::new(&scope, (0_u8, 0_u8)).unwrap();
//! let mut first = container.observe_selected(getter(|pair: &(u8, u8)| pair.0));
//!
//! assert_eq!(expect_next(&mut first).await, 0);
//!
//! container.mutate(|pair| (pair.0, 9));
//! expect_silent(&mut first).await;
//! # }
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use viewstate_runtime::StateScope;


/// Timed assertions over observable streams
pub mod streams;

/// Property-based testing utilities
///
/// Strategies for generating effect sequences to replay through a reducer.
pub mod properties {
    use proptest::prelude::*;
    use std::fmt::Debug;

    /// A sequence of up to `max_len` effects drawn from `effect`
    pub fn effect_sequence<E, S>(effect: S, max_len: usize) -> impl Strategy<Value = Vec<E>>
    where
        E: Debug,
        S: Strategy<Value = E>,
    {
        prop::collection::vec(effect, 0..=max_len)
    }

    /// Integer deltas small enough that a few hundred of them never overflow `i64`
    pub fn deltas(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
        effect_sequence(-1_000_i64..1_000, max_len)
    }
}

pub use streams::{collect_n, expect_end, expect_next, expect_silent, next_within};
pub use transition_test::TransitionTest;

/// Create a scope on the current tokio runtime
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
#[must_use]
#[allow(clippy::expect_used)] // Test helper
pub fn test_scope() -> StateScope {
    StateScope::new().expect("test_scope() must be called inside a tokio runtime")
}

/// Install a tracing subscriber that writes through the test harness
///
/// Honors `RUST_LOG` and defaults to debug output for the container runtime.
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "viewstate_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
