//! Joins of several selectors over one container.
//!
//! A tuple of 2 to 5 [`Getter`]s is a [`Selection`]. Observing it takes a
//! single subscription to the container and applies every getter to each
//! committed value, so the joined tuples follow commit order exactly. A tuple
//! is emitted when any position differs from the previous tuple.
//!
//! ```no_run
//! use futures::StreamExt;
//! use viewstate_runtime::{getter, StateContainer, StateScope};
//!
//! #[derive(Clone)]
//! struct Player {
//!     name: String,
//!     score: u32,
//!     lives: u8,
//! }
//!
//! # async fn example() -> Result<(), viewstate_runtime::StateError> {
//! let scope = StateScope::new()?;
//! let player = StateContainer::new(&scope, Player { name: "ada".into(), score: 0, lives: 3 })?;
//!
//! let mut hud = player.observe_joined((
//!     getter(|p: &Player| p.score),
//!     getter(|p: &Player| p.lives),
//! ));
//! assert_eq!(hud.next().await, Some((0, 3)));
//! # Ok(())
//! # }
//! ```

use viewstate_core::Getter;

/// A tuple of 2 to 5 getters observed jointly
pub trait Selection<T> {
    /// The tuple of projected values
    type Output: PartialEq + Clone;

    /// Apply every getter to the same state, in position order
    fn project(&self, state: &T) -> Self::Output;
}

macro_rules! impl_selection {
    ($($G:ident $idx:tt),+) => {
        impl<T, $($G),+> Selection<T> for ($($G,)+)
        where
            $($G: Getter<T>, $G::Output: PartialEq + Clone,)+
        {
            type Output = ($($G::Output,)+);

            fn project(&self, state: &T) -> Self::Output {
                ($(self.$idx.get(state),)+)
            }
        }
    };
}

impl_selection!(G1 0, G2 1);
impl_selection!(G1 0, G2 1, G3 2);
impl_selection!(G1 0, G2 1, G3 2, G4 3);
impl_selection!(G1 0, G2 1, G3 2, G4 3, G5 4);

/// A [`Selection`] used as one getter producing the whole tuple
///
/// Tuples compare position by position, so de-duplicating the joined value
/// drops exactly the commits where no position changed.
#[derive(Debug, Clone, Copy)]
pub struct Joined<S> {
    selection: S,
}

impl<S> Joined<S> {
    pub(crate) const fn new(selection: S) -> Self {
        Self { selection }
    }
}

impl<T, S> Getter<T> for Joined<S>
where
    S: Selection<T>,
{
    type Output = S::Output;

    fn get(&self, state: &T) -> Self::Output {
        self.selection.project(state)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::container::StateContainer;
    use crate::scope::StateScope;
    use futures::{FutureExt, StreamExt};
    use viewstate_core::getter;

    #[derive(Debug, Clone, PartialEq)]
    struct Wide {
        a: u8,
        b: u8,
        c: u8,
        d: u8,
        e: u8,
    }

    fn wide() -> Wide {
        Wide {
            a: 1,
            b: 2,
            c: 3,
            d: 4,
            e: 5,
        }
    }

    fn wide_container(scope: &StateScope) -> StateContainer<Wide> {
        StateContainer::new(scope, wide()).unwrap()
    }

    #[test]
    fn test_project_applies_getters_in_position_order() {
        let selection = (
            getter(|w: &Wide| w.e),
            getter(|w: &Wide| w.a),
            getter(|w: &Wide| w.c),
        );

        assert_eq!(selection.project(&wide()), (5, 1, 3));
        assert_eq!(Joined::new(selection).get(&wide()), (5, 1, 3));
    }

    #[tokio::test]
    async fn test_three_selectors() {
        let scope = StateScope::new().unwrap();
        let container = wide_container(&scope);
        let mut joined = container.observe_selected3(
            getter(|w: &Wide| w.a),
            getter(|w: &Wide| w.b),
            getter(|w: &Wide| w.c),
        );

        assert_eq!(joined.next().await, Some((1, 2, 3)));

        container.mutate(|w| Wide { c: 30, ..w.clone() });
        assert_eq!(joined.next().await, Some((1, 2, 30)));
    }

    #[tokio::test]
    async fn test_four_selectors() {
        let scope = StateScope::new().unwrap();
        let container = wide_container(&scope);
        let mut joined = container.observe_selected4(
            getter(|w: &Wide| w.a),
            getter(|w: &Wide| w.b),
            getter(|w: &Wide| w.c),
            getter(|w: &Wide| w.d),
        );

        assert_eq!(joined.next().await, Some((1, 2, 3, 4)));

        container.mutate(|w| Wide { a: 10, ..w.clone() });
        assert_eq!(joined.next().await, Some((10, 2, 3, 4)));
    }

    #[tokio::test]
    async fn test_five_selectors() {
        let scope = StateScope::new().unwrap();
        let container = wide_container(&scope);
        let mut joined = container.observe_selected5(
            getter(|w: &Wide| w.a),
            getter(|w: &Wide| w.b),
            getter(|w: &Wide| w.c),
            getter(|w: &Wide| w.d),
            getter(|w: &Wide| w.e),
        );

        assert_eq!(joined.next().await, Some((1, 2, 3, 4, 5)));

        container.mutate(|w| Wide { e: 50, ..w.clone() });
        assert_eq!(joined.next().await, Some((1, 2, 3, 4, 50)));
    }

    #[tokio::test]
    async fn test_unrelated_change_is_silent() {
        let scope = StateScope::new().unwrap();
        let container = wide_container(&scope);
        let mut joined = container.observe_joined((
            getter(|w: &Wide| w.a),
            getter(|w: &Wide| w.b),
        ));
        assert_eq!(joined.next().await, Some((1, 2)));

        container.mutate(|w| Wide { e: 0, ..w.clone() });
        container.settled().await.unwrap();

        assert!(joined.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_buffered_commits_keep_commit_order() {
        let scope = StateScope::new().unwrap();
        let container = wide_container(&scope);
        let mut joined = container.observe_joined((
            getter(|w: &Wide| w.a),
            getter(|w: &Wide| w.b),
        ));

        container.mutate(|w| Wide { a: 10, ..w.clone() });
        container.mutate(|w| Wide { b: 20, ..w.clone() });
        container.mutate(|w| Wide { a: 30, ..w.clone() });
        container.mutate(|w| Wide { e: 0, ..w.clone() });
        container.mutate(|w| Wide { b: 40, ..w.clone() });
        container.settled().await.unwrap();

        let mut seen = Vec::new();
        while let Some(Some(tuple)) = joined.next().now_or_never() {
            seen.push(tuple);
        }
        assert_eq!(seen, vec![(1, 2), (10, 2), (10, 20), (30, 20), (30, 40)]);
    }

    #[tokio::test]
    async fn test_composed_getters_in_selection() {
        let scope = StateScope::new().unwrap();
        let container = wide_container(&scope);
        let mut joined = container.observe_joined((
            getter(|w: &Wide| w.a).map(|a| a * 2),
            getter(|w: &Wide| (w.b, w.c)).then(getter(|bc: &(u8, u8)| bc.0 + bc.1)),
        ));

        assert_eq!(joined.next().await, Some((2, 5)));
    }

    #[tokio::test]
    async fn test_join_holds_a_single_subscription() {
        let scope = StateScope::new().unwrap();
        let container = wide_container(&scope);
        let joined = container.observe_selected5(
            getter(|w: &Wide| w.a),
            getter(|w: &Wide| w.b),
            getter(|w: &Wide| w.c),
            getter(|w: &Wide| w.d),
            getter(|w: &Wide| w.e),
        );
        assert_eq!(container.subscriber_count(), 1);

        drop(joined);
        assert_eq!(container.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_joined_stream_ends_on_teardown() {
        let scope = StateScope::new().unwrap();
        let container = wide_container(&scope);
        let mut joined = container.observe_joined((
            getter(|w: &Wide| w.a),
            getter(|w: &Wide| w.b),
        ));
        assert_eq!(joined.next().await, Some((1, 2)));

        scope.cancel();
        assert_eq!(joined.next().await, None);
    }
}
