//! Observable streams over a container's committed values.
//!
//! Two operators cover every derived view:
//!
//! - [`StateStream`]: the primary stream, one item per committed value
//! - [`Selected`]: map through a [`Getter`] and drop consecutive duplicates
//!
//! Joins of several selectors are a [`Selected`] over a
//! [`Joined`](crate::selection::Joined) getter and hold one subscription like
//! any other view. Both are plain [`futures::Stream`]s and `Unpin`, so they can be
//! polled with `StreamExt::next` directly or handed to any sink.

use crate::metrics::{ContainerMetrics, Suppression};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::sync::mpsc;
use viewstate_core::Getter;

/// The primary stream of a container: every committed value, in commit order
///
/// Created by [`StateContainer::observe`](crate::StateContainer::observe).
/// The first item is the value current at subscription time. The stream ends
/// when the container is closed, after yielding what was already committed.
#[derive(Debug)]
pub struct StateStream<T> {
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> StateStream<T> {
    pub(crate) const fn new(receiver: mpsc::UnboundedReceiver<T>) -> Self {
        Self { receiver }
    }

    /// Drain everything buffered and return the newest value, without waiting
    ///
    /// For sinks that only render the latest state: intermediate values are
    /// skipped. Returns `None` when nothing is buffered.
    pub fn latest(&mut self) -> Option<T> {
        let mut latest = None;
        while let Ok(value) = self.receiver.try_recv() {
            latest = Some(value);
        }
        latest
    }
}

impl<T> Stream for StateStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_recv(cx)
    }
}

/// A projection of a container's state with consecutive duplicates removed
///
/// Created by [`StateContainer::observe_selected`](crate::StateContainer::observe_selected).
/// Equality is `PartialEq` on the projected value.
pub struct Selected<T, G>
where
    G: Getter<T>,
{
    source: StateStream<T>,
    selector: G,
    last: Option<G::Output>,
}

impl<T, G> Selected<T, G>
where
    G: Getter<T>,
{
    pub(crate) const fn new(source: StateStream<T>, selector: G) -> Self {
        Self {
            source,
            selector,
            last: None,
        }
    }
}

// No field is structurally pinned
impl<T, G> Unpin for Selected<T, G> where G: Getter<T> {}

impl<T, G> Stream for Selected<T, G>
where
    G: Getter<T>,
    G::Output: PartialEq + Clone,
{
    type Item = G::Output;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(state) = ready!(Pin::new(&mut this.source).poll_next(cx)) else {
                return Poll::Ready(None);
            };

            let projected = this.selector.get(&state);
            if this.last.as_ref() == Some(&projected) {
                ContainerMetrics::record_suppressed(Suppression::Selector);
                continue;
            }

            this.last = Some(projected.clone());
            return Poll::Ready(Some(projected));
        }
    }
}

impl<T, G> std::fmt::Debug for Selected<T, G>
where
    G: Getter<T>,
    G::Output: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selected")
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}
