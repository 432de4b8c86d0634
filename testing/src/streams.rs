//! Stream assertions that fail instead of hanging.
//!
//! Observers of a container only end on teardown, so a test awaiting an
//! emission that never comes would block forever. These helpers bound every
//! wait.

#![allow(clippy::panic)] // Test assertions

use futures::{Stream, StreamExt};
use std::fmt::Debug;
use std::time::Duration;

/// How long [`expect_next`] and [`expect_end`] wait
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// How long [`expect_silent`] listens before concluding nothing was emitted
pub const SILENCE_WINDOW: Duration = Duration::from_millis(50);

/// Wait up to `timeout` for the next item
///
/// Returns `None` on timeout, `Some(None)` if the stream ended.
pub async fn next_within<S>(stream: &mut S, timeout: Duration) -> Option<Option<S::Item>>
where
    S: Stream + Unpin,
{
    tokio::time::timeout(timeout, stream.next()).await.ok()
}

/// The next item
///
/// # Panics
///
/// Panics if the stream ends or stays silent for [`DEFAULT_TIMEOUT`].
pub async fn expect_next<S>(stream: &mut S) -> S::Item
where
    S: Stream + Unpin,
{
    match next_within(stream, DEFAULT_TIMEOUT).await {
        Some(Some(item)) => item,
        Some(None) => panic!("Expected an emission, but the stream ended"),
        None => panic!("Expected an emission within {DEFAULT_TIMEOUT:?}"),
    }
}

/// The next `n` items, in order
///
/// # Panics
///
/// Panics if any of them is not emitted in time.
pub async fn collect_n<S>(stream: &mut S, n: usize) -> Vec<S::Item>
where
    S: Stream + Unpin,
{
    let mut items = Vec::with_capacity(n);
    for _ in 0..n {
        items.push(expect_next(stream).await);
    }
    items
}

/// Assert nothing is emitted for [`SILENCE_WINDOW`]
///
/// # Panics
///
/// Panics on an emission, and on the stream ending.
pub async fn expect_silent<S>(stream: &mut S)
where
    S: Stream + Unpin,
    S::Item: Debug,
{
    match next_within(stream, SILENCE_WINDOW).await {
        None => {},
        Some(Some(item)) => panic!("Expected no emission, got {item:?}"),
        Some(None) => panic!("Expected a silent stream, but it ended"),
    }
}

/// Assert the stream ends without emitting anything else
///
/// # Panics
///
/// Panics on an emission, or if the stream is still open after [`DEFAULT_TIMEOUT`].
pub async fn expect_end<S>(stream: &mut S)
where
    S: Stream + Unpin,
    S::Item: Debug,
{
    match next_within(stream, DEFAULT_TIMEOUT).await {
        Some(None) => {},
        Some(Some(item)) => panic!("Expected the stream to end, got {item:?}"),
        None => panic!("Expected the stream to end within {DEFAULT_TIMEOUT:?}"),
    }
}
